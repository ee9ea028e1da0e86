use crate::align::bounded::structs::{CloudBound, CloudBoundGroup};

/// The row-oriented cloud index used by every sparse DP kernel.
///
/// Bounds are sorted ascending by row, then by left bound, and never overlap
/// within a row; `row_start` maps a row to its slice of `bounds` in O(1).
/// Column bounds satisfy `1 <= lb < rb <= T + 1`.
#[derive(Default, Clone, Debug)]
pub struct RowBounds {
    pub target_length: usize,
    pub profile_length: usize,
    /// First row with any cloud cell
    pub target_start: usize,
    /// Last row with any cloud cell
    pub target_end: usize,
    pub num_cells: usize,
    bounds: Vec<CloudBound>,
    /// `bounds[row_start[r]..row_start[r + 1]]` are row r's bounds
    row_start: Vec<usize>,
}

impl RowBounds {
    /// Reorient a unioned antidiagonal cloud into row form.
    ///
    /// Cells are emitted row by row while walking the antidiagonal bounds in
    /// ascending order; for a fixed row the emitted columns are strictly
    /// increasing, so interval coalescing only ever has to look at the tail
    /// of each row's builder and the whole pass is linear in cell count.
    pub fn new(antidiagonal_bounds: &CloudBoundGroup) -> Self {
        let target_length = antidiagonal_bounds.target_length;
        let profile_length = antidiagonal_bounds.profile_length;

        let mut rows: Vec<Vec<(usize, usize)>> = vec![vec![]; target_length + 1];

        for bound in &antidiagonal_bounds.bounds {
            for k in bound.lb..bound.rb {
                let target_idx = k;
                if target_idx < 1 || target_idx > target_length || bound.id < k {
                    continue;
                }
                let profile_idx = bound.id - k;
                if profile_idx < 1 || profile_idx > profile_length {
                    continue;
                }

                let row = &mut rows[target_idx];
                match row.last_mut() {
                    Some(last) if last.1 == profile_idx => last.1 += 1,
                    _ => row.push((profile_idx, profile_idx + 1)),
                }
            }
        }

        Self::from_rows(target_length, profile_length, rows)
    }

    /// A cloud covering the entire (Q, T) lattice.
    pub fn full(target_length: usize, profile_length: usize) -> Self {
        let mut rows: Vec<Vec<(usize, usize)>> = vec![vec![]; target_length + 1];
        for row in rows.iter_mut().skip(1) {
            row.push((1, profile_length + 1));
        }
        Self::from_rows(target_length, profile_length, rows)
    }

    fn from_rows(
        target_length: usize,
        profile_length: usize,
        rows: Vec<Vec<(usize, usize)>>,
    ) -> Self {
        let mut bounds = vec![];
        let mut row_start = vec![0usize; target_length + 2];
        let mut num_cells = 0;
        let mut target_start = 0;
        let mut target_end = 0;

        for (target_idx, row) in rows.iter().enumerate() {
            row_start[target_idx] = bounds.len();
            for &(lb, rb) in row {
                debug_assert!(1 <= lb && lb < rb && rb <= profile_length + 1);
                num_cells += rb - lb;
                bounds.push(CloudBound::new(target_idx, lb, rb));
            }
            if !row.is_empty() {
                if target_start == 0 {
                    target_start = target_idx;
                }
                target_end = target_idx;
            }
        }
        row_start[target_length + 1] = bounds.len();

        RowBounds {
            target_length,
            profile_length,
            target_start,
            target_end,
            num_cells,
            bounds,
            row_start,
        }
    }

    #[inline]
    pub fn row(&self, target_idx: usize) -> &[CloudBound] {
        &self.bounds[self.row_start[target_idx]..self.row_start[target_idx + 1]]
    }

    pub fn valid(&self) -> bool {
        self.num_cells > 0 && self.target_start >= 1
    }

    /// Every cell named by the bounds, as (target_idx, profile_idx) pairs.
    pub fn cells(&self) -> Vec<(usize, usize)> {
        let mut cells = vec![];
        for bound in &self.bounds {
            for profile_idx in bound.lb..bound.rb {
                cells.push((bound.id, profile_idx));
            }
        }
        cells
    }

    /// Convert back to antidiagonal orientation.
    pub fn to_antidiagonal(&self) -> CloudBoundGroup {
        let antidiagonal_count = self.target_length + self.profile_length + 1;
        let mut diagonals: Vec<Vec<(usize, usize)>> = vec![vec![]; antidiagonal_count];

        for target_idx in 1..=self.target_length {
            for bound in self.row(target_idx) {
                for profile_idx in bound.lb..bound.rb {
                    let diagonal = &mut diagonals[target_idx + profile_idx];
                    match diagonal.last_mut() {
                        Some(last) if last.1 == target_idx => last.1 += 1,
                        _ => diagonal.push((target_idx, target_idx + 1)),
                    }
                }
            }
        }

        let mut group = CloudBoundGroup::new(self.target_length, self.profile_length);
        for (id, diagonal) in diagonals.iter().enumerate() {
            for &(lb, rb) in diagonal {
                group.push(CloudBound::new(id, lb, rb));
            }
        }
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn antidiagonal_group(bounds: &[(usize, usize, usize)]) -> CloudBoundGroup {
        let mut group = CloudBoundGroup::new(12, 12);
        for &(id, lb, rb) in bounds {
            group.push(CloudBound::new(id, lb, rb));
        }
        group
    }

    #[test]
    fn test_reorientation_preserves_cell_count() {
        let group = antidiagonal_group(&[(4, 1, 4), (5, 1, 5), (6, 2, 5), (7, 3, 4)]);
        let row_bounds = RowBounds::new(&group);

        assert_eq!(row_bounds.num_cells, group.cell_count());
    }

    #[test]
    fn test_reorientation_preserves_cell_set() {
        let group = antidiagonal_group(&[(4, 1, 4), (5, 1, 5), (6, 2, 5), (7, 3, 4)]);
        let row_bounds = RowBounds::new(&group);

        let antidiagonal_cells: BTreeSet<(usize, usize)> = group.cells().into_iter().collect();
        let row_cells: BTreeSet<(usize, usize)> = row_bounds.cells().into_iter().collect();
        assert_eq!(antidiagonal_cells, row_cells);
    }

    #[test]
    fn test_round_trip_through_antidiagonal_form() {
        let group = antidiagonal_group(&[(4, 1, 4), (6, 2, 5), (7, 3, 4), (9, 4, 5)]);
        let row_bounds = RowBounds::new(&group);
        let round_tripped = RowBounds::new(&row_bounds.to_antidiagonal());

        let before: BTreeSet<(usize, usize)> = row_bounds.cells().into_iter().collect();
        let after: BTreeSet<(usize, usize)> = round_tripped.cells().into_iter().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_rows_are_sorted_and_disjoint() {
        let group = antidiagonal_group(&[(4, 1, 4), (5, 1, 5), (8, 2, 7), (10, 4, 6)]);
        let row_bounds = RowBounds::new(&group);

        for target_idx in 1..=row_bounds.target_length {
            let row = row_bounds.row(target_idx);
            for pair in row.windows(2) {
                assert!(pair[0].rb <= pair[1].lb);
                assert!(pair[0].lb < pair[1].lb);
            }
        }
    }

    #[test]
    fn test_single_cell_lattice() {
        let mut group = CloudBoundGroup::new(1, 1);
        group.push(CloudBound::new(2, 1, 2));
        let row_bounds = RowBounds::new(&group);

        assert_eq!(row_bounds.num_cells, 1);
        assert_eq!(row_bounds.row(1), &[CloudBound::new(1, 1, 2)]);
        assert_eq!(row_bounds.target_start, 1);
        assert_eq!(row_bounds.target_end, 1);
    }

    #[test]
    fn test_full_covers_everything() {
        let row_bounds = RowBounds::full(3, 5);
        assert_eq!(row_bounds.num_cells, 15);
        assert!(row_bounds.valid());
        assert_eq!(row_bounds.row(2), &[CloudBound::new(2, 1, 6)]);
    }
}
