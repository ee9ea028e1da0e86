pub mod alignment;
pub mod dp_matrix;
pub mod hmm;
pub mod profile;
pub mod sequence;
pub mod trace;

pub use alignment::{Alignment, ScoreParams};
pub use dp_matrix::{DpMatrix, DpMatrixFlat};
pub use profile::Profile;
pub use sequence::Sequence;
pub use trace::Trace;
