pub mod backward;
pub mod cloud_search;
pub mod domains;
pub mod forward;
pub mod null;
pub mod optimal_accuracy;
pub mod posterior;
pub mod structs;
pub mod traceback;

pub use backward::{backward_bounded, backward_bounded_in_range};
pub use cloud_search::{
    cloud_score, cloud_search_backward, cloud_search_forward, CloudSearchScores,
};
pub use domains::{decode_domains, DomainParams, DomainRange};
pub use forward::{forward_bounded, forward_bounded_in_range};
pub use null::{null1_score, null2_score, NULL2_OMEGA};
pub use optimal_accuracy::{optimal_accuracy_bounded, optimal_accuracy_bounded_in_range};
pub use posterior::{posterior_bounded, posterior_bounded_in_range};
pub use traceback::{traceback_bounded, traceback_bounded_in_range};
