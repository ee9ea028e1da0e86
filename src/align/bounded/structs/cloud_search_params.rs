/// Pruning parameters for the cloud search sweeps.
#[derive(Debug, Clone)]
pub struct CloudSearchParams {
    /// X-drop below the current antidiagonal maximum that prunes a cell
    pub alpha: f32,
    /// X-drop below the global maximum that terminates the whole sweep
    pub beta: f32,
    /// Number of antidiagonals past the seed before pruning starts
    pub gamma: usize,
    /// Hard cap on total cloud cells per sweep
    pub max_cells: usize,
}

impl Default for CloudSearchParams {
    fn default() -> Self {
        CloudSearchParams {
            alpha: 12.0,
            beta: 20.0,
            gamma: 5,
            max_cells: usize::MAX,
        }
    }
}
