use serde::{Deserialize, Serialize};

/// A prefilter hit that anchors the cloud search.
///
/// Coordinates are 1-indexed and inclusive, target rows by profile columns.
/// The score and E-value are the prefilter's own, used only for the
/// Viterbi-stage threshold.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Seed {
    pub target_name: String,
    pub target_start: usize,
    pub target_end: usize,
    pub profile_start: usize,
    pub profile_end: usize,
    #[serde(default)]
    pub score_bits: f32,
    #[serde(default = "default_seed_evalue")]
    pub evalue: f64,
}

fn default_seed_evalue() -> f64 {
    f64::MAX
}
