use crate::align::bounded::structs::RowBounds;
use crate::structs::dp_matrix::{DpMatrix, SPECIAL_STATE_COUNT};

/// One physical run of cells in a row: columns [lb, rb) stored at `offset`.
#[derive(Debug, Clone, Copy, Default)]
struct Block {
    lb: usize,
    rb: usize,
    offset: usize,
}

/// Cloud-shaped storage for one M/I/D triple per cell.
///
/// Each row materializes its own bounds plus the bounds of the two
/// neighboring rows, all widened one column to either side, so every cell a
/// recurrence can read physically exists and starts at negative infinity.
/// Reads outside physical storage also produce negative infinity; writes
/// outside the named bounds are an invariant violation.
#[derive(Default, Clone, Debug)]
pub struct DpMatrixSparse {
    pub target_length: usize,
    pub profile_length: usize,
    blocks: Vec<Block>,
    /// `blocks[block_start[r]..block_start[r + 1]]` are row r's blocks
    block_start: Vec<usize>,
    core: Vec<f32>,
    specials: Vec<f32>,
}

impl DpMatrixSparse {
    pub fn new(target_length: usize, profile_length: usize, row_bounds: &RowBounds) -> Self {
        let mut matrix = DpMatrixSparse::default();
        matrix.reuse(target_length, profile_length, row_bounds);
        matrix
    }

    /// Re-shape for new bounds, keeping allocations where capacity allows.
    pub fn reuse(&mut self, target_length: usize, profile_length: usize, row_bounds: &RowBounds) {
        self.target_length = target_length;
        self.profile_length = profile_length;

        self.blocks.clear();
        self.block_start.clear();
        self.block_start.resize(target_length + 2, 0);

        let mut offset = 0usize;
        for target_idx in 0..=target_length {
            self.block_start[target_idx] = self.blocks.len();

            // padding: this row, widened, unioned with both neighbor rows
            let mut intervals: Vec<(usize, usize)> = vec![];
            let last_bounded_row = (target_idx + 1)
                .min(target_length)
                .min(row_bounds.target_length);
            for neighbor in target_idx.saturating_sub(1)..=last_bounded_row {
                for bound in row_bounds.row(neighbor) {
                    let lb = bound.lb.saturating_sub(1);
                    let rb = (bound.rb + 1).min(profile_length + 2);
                    intervals.push((lb, rb));
                }
            }
            intervals.sort_unstable();

            for (lb, rb) in intervals {
                let row_has_blocks = self.blocks.len() > self.block_start[target_idx];
                if row_has_blocks {
                    let last = self.blocks.last_mut().unwrap();
                    if lb <= last.rb {
                        // the last block is always the top of the offset
                        // counter, so extending it stays contiguous
                        if rb > last.rb {
                            offset += rb - last.rb;
                            last.rb = rb;
                        }
                        continue;
                    }
                }
                self.blocks.push(Block { lb, rb, offset });
                offset += rb - lb;
            }
        }
        self.block_start[target_length + 1] = self.blocks.len();

        self.core.clear();
        self.core.resize(3 * offset, -f32::INFINITY);
        self.specials.clear();
        self.specials
            .resize(SPECIAL_STATE_COUNT * (target_length + 1), -f32::INFINITY);
    }

    /// Overwrite this matrix's values with another of identical shape.
    pub fn copy_from(&mut self, other: &DpMatrixSparse) {
        debug_assert_eq!(self.core.len(), other.core.len());
        debug_assert_eq!(self.specials.len(), other.specials.len());
        self.core.copy_from_slice(&other.core);
        self.specials.copy_from_slice(&other.specials);
    }

    /// Reset all stored values without re-shaping.
    pub fn fill_neg_infinity(&mut self) {
        self.core.fill(-f32::INFINITY);
        self.specials.fill(-f32::INFINITY);
    }

    #[inline]
    fn cell_offset(&self, target_idx: usize, profile_idx: usize) -> Option<usize> {
        if target_idx > self.target_length {
            return None;
        }
        let row = &self.blocks[self.block_start[target_idx]..self.block_start[target_idx + 1]];
        for block in row {
            if profile_idx < block.rb {
                if profile_idx >= block.lb {
                    return Some(block.offset + (profile_idx - block.lb));
                }
                return None;
            }
        }
        None
    }

    #[inline]
    fn get(&self, state: usize, target_idx: usize, profile_idx: usize) -> f32 {
        match self.cell_offset(target_idx, profile_idx) {
            Some(offset) => self.core[offset * 3 + state],
            None => -f32::INFINITY,
        }
    }

    #[inline]
    fn set(&mut self, state: usize, target_idx: usize, profile_idx: usize, value: f32) {
        match self.cell_offset(target_idx, profile_idx) {
            Some(offset) => self.core[offset * 3 + state] = value,
            None => debug_assert!(false, "write outside sparse bounds: ({target_idx}, {profile_idx})"),
        }
    }
}

impl DpMatrix for DpMatrixSparse {
    #[inline]
    fn target_length(&self) -> usize {
        self.target_length
    }

    #[inline]
    fn profile_length(&self) -> usize {
        self.profile_length
    }

    #[inline]
    fn get_match(&self, target_idx: usize, profile_idx: usize) -> f32 {
        self.get(0, target_idx, profile_idx)
    }

    #[inline]
    fn set_match(&mut self, target_idx: usize, profile_idx: usize, value: f32) {
        self.set(0, target_idx, profile_idx, value);
    }

    #[inline]
    fn get_insert(&self, target_idx: usize, profile_idx: usize) -> f32 {
        self.get(1, target_idx, profile_idx)
    }

    #[inline]
    fn set_insert(&mut self, target_idx: usize, profile_idx: usize, value: f32) {
        self.set(1, target_idx, profile_idx, value);
    }

    #[inline]
    fn get_delete(&self, target_idx: usize, profile_idx: usize) -> f32 {
        self.get(2, target_idx, profile_idx)
    }

    #[inline]
    fn set_delete(&mut self, target_idx: usize, profile_idx: usize, value: f32) {
        self.set(2, target_idx, profile_idx, value);
    }

    #[inline]
    fn get_special(&self, state_idx: usize, target_idx: usize) -> f32 {
        self.specials[state_idx * (self.target_length + 1) + target_idx]
    }

    #[inline]
    fn set_special(&mut self, state_idx: usize, target_idx: usize, value: f32) {
        self.specials[state_idx * (self.target_length + 1) + target_idx] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::bounded::structs::{CloudBound, CloudBoundGroup};
    use crate::structs::dp_matrix::SPECIAL_E;

    fn small_row_bounds() -> RowBounds {
        // rows 1..=3 over a 4-column profile
        let mut group = CloudBoundGroup::new(3, 4);
        group.push(CloudBound::new(3, 1, 3)); // cells (1,2) (2,1)
        group.push(CloudBound::new(4, 1, 4)); // cells (1,3) (2,2) (3,1)
        group.push(CloudBound::new(5, 2, 4)); // cells (2,3) (3,2)
        RowBounds::new(&group)
    }

    #[test]
    fn test_named_cells_read_back_their_writes() {
        let row_bounds = small_row_bounds();
        let mut matrix = DpMatrixSparse::new(3, 4, &row_bounds);

        for (idx, &(target_idx, profile_idx)) in row_bounds.cells().iter().enumerate() {
            matrix.set_match(target_idx, profile_idx, idx as f32);
        }
        for (idx, &(target_idx, profile_idx)) in row_bounds.cells().iter().enumerate() {
            assert_eq!(matrix.get_match(target_idx, profile_idx), idx as f32);
        }
    }

    #[test]
    fn test_absent_cells_read_negative_infinity() {
        let row_bounds = small_row_bounds();
        let matrix = DpMatrixSparse::new(3, 4, &row_bounds);

        assert_eq!(matrix.get_match(3, 4), -f32::INFINITY);
        assert_eq!(matrix.get_insert(1, 1), -f32::INFINITY);
        assert_eq!(matrix.get_delete(0, 4), -f32::INFINITY);
    }

    #[test]
    fn test_padding_cells_exist_and_start_at_negative_infinity() {
        let row_bounds = small_row_bounds();
        let matrix = DpMatrixSparse::new(3, 4, &row_bounds);

        // (1, 1) pads the left edge of row 1's first cell, (2, 1) sits in
        // the row above row 3's cells
        for &(target_idx, profile_idx) in &[(1, 1), (2, 1), (0, 1), (0, 2)] {
            assert!(matrix.cell_offset(target_idx, profile_idx).is_some());
            assert_eq!(matrix.get_match(target_idx, profile_idx), -f32::INFINITY);
        }
    }

    #[test]
    fn test_specials_are_dense() {
        let row_bounds = small_row_bounds();
        let mut matrix = DpMatrixSparse::new(3, 4, &row_bounds);
        for target_idx in 0..=3 {
            matrix.set_special(SPECIAL_E, target_idx, target_idx as f32);
        }
        for target_idx in 0..=3 {
            assert_eq!(matrix.get_special(SPECIAL_E, target_idx), target_idx as f32);
        }
    }

    #[test]
    fn test_copy_from_matches_shape() {
        let row_bounds = small_row_bounds();
        let mut source = DpMatrixSparse::new(3, 4, &row_bounds);
        let mut matrix = DpMatrixSparse::new(3, 4, &row_bounds);

        source.set_match(2, 2, 7.0);
        source.set_special(SPECIAL_E, 1, 3.0);
        matrix.copy_from(&source);

        assert_eq!(matrix.get_match(2, 2), 7.0);
        assert_eq!(matrix.get_special(SPECIAL_E, 1), 3.0);
    }
}
