/// Three rotating antidiagonal planes of M/I/D values for the cloud sweeps.
///
/// A cell (i, j) on antidiagonal d = i + j lives in plane `d % 3` at
/// position `k = i`; the recurrences only ever look back to planes
/// `(d - 1) % 3` and `(d - 2) % 3`.
#[derive(Default, Clone, Debug)]
pub struct CloudMatrixLinear {
    pub target_length: usize,
    data: Vec<f32>,
}

const PLANE_COUNT: usize = 3;

impl CloudMatrixLinear {
    pub fn new(target_length: usize) -> Self {
        let mut matrix = CloudMatrixLinear::default();
        matrix.reuse(target_length);
        matrix
    }

    pub fn reuse(&mut self, target_length: usize) {
        self.target_length = target_length;
        self.data.clear();
        self.data
            .resize(PLANE_COUNT * 3 * (target_length + 1), -f32::INFINITY);
    }

    #[inline]
    fn idx(&self, plane: usize, state: usize, k: usize) -> usize {
        (plane * 3 + state) * (self.target_length + 1) + k
    }

    #[inline]
    pub fn get_match(&self, plane: usize, k: usize) -> f32 {
        self.data[self.idx(plane, 0, k)]
    }

    #[inline]
    pub fn set_match(&mut self, plane: usize, k: usize, value: f32) {
        let idx = self.idx(plane, 0, k);
        self.data[idx] = value;
    }

    #[inline]
    pub fn get_insert(&self, plane: usize, k: usize) -> f32 {
        self.data[self.idx(plane, 1, k)]
    }

    #[inline]
    pub fn set_insert(&mut self, plane: usize, k: usize, value: f32) {
        let idx = self.idx(plane, 1, k);
        self.data[idx] = value;
    }

    #[inline]
    pub fn get_delete(&self, plane: usize, k: usize) -> f32 {
        self.data[self.idx(plane, 2, k)]
    }

    #[inline]
    pub fn set_delete(&mut self, plane: usize, k: usize, value: f32) {
        let idx = self.idx(plane, 2, k);
        self.data[idx] = value;
    }

    /// The largest of the three state values at one cell.
    #[inline]
    pub fn cell_max(&self, plane: usize, k: usize) -> f32 {
        self.get_match(plane, k)
            .max(self.get_insert(plane, k))
            .max(self.get_delete(plane, k))
    }

    /// Scrub a cell range of one plane back to negative infinity.
    pub fn scrub(&mut self, plane: usize, lb: usize, rb: usize) {
        for k in lb..rb {
            self.set_match(plane, k, -f32::INFINITY);
            self.set_insert(plane, k, -f32::INFINITY);
            self.set_delete(plane, k, -f32::INFINITY);
        }
    }
}
