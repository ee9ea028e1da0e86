use crate::align::bounded::structs::RowBounds;
use crate::log_sum::{log_sum, log_sum3};
use crate::structs::dp_matrix::{
    DpMatrix, SPECIAL_B, SPECIAL_C, SPECIAL_E, SPECIAL_J, SPECIAL_N,
};
use crate::structs::{Profile, Sequence};

/// Bounded Backward over the whole target.
///
/// Returns the backward score in nats: N at the top row. Over the same
/// cloud this must agree with the forward score to numerical tolerance.
pub fn backward_bounded(
    profile: &Profile,
    target: &Sequence,
    dp_matrix: &mut impl DpMatrix,
    row_bounds: &RowBounds,
) -> f32 {
    backward_bounded_in_range(profile, target, dp_matrix, row_bounds, 1, target.length)
}

/// Bounded Backward restricted to target rows [range_start, range_end].
pub fn backward_bounded_in_range(
    profile: &Profile,
    target: &Sequence,
    dp_matrix: &mut impl DpMatrix,
    row_bounds: &RowBounds,
    range_start: usize,
    range_end: usize,
) -> f32 {
    let profile_length = profile.length;

    let n_loop = profile.special_transition_score(Profile::SPECIAL_N, Profile::SPECIAL_LOOP);
    let n_move = profile.special_transition_score(Profile::SPECIAL_N, Profile::SPECIAL_MOVE);
    let e_loop = profile.special_transition_score(Profile::SPECIAL_E, Profile::SPECIAL_LOOP);
    let e_move = profile.special_transition_score(Profile::SPECIAL_E, Profile::SPECIAL_MOVE);
    let c_loop = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_LOOP);
    let c_move = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_MOVE);
    let j_loop = profile.special_transition_score(Profile::SPECIAL_J, Profile::SPECIAL_LOOP);
    let j_move = profile.special_transition_score(Profile::SPECIAL_J, Profile::SPECIAL_MOVE);

    // bottom row: the path must still pass through C and out
    let bottom_row = range_end;
    dp_matrix.set_special(SPECIAL_J, bottom_row, -f32::INFINITY);
    dp_matrix.set_special(SPECIAL_B, bottom_row, -f32::INFINITY);
    dp_matrix.set_special(SPECIAL_N, bottom_row, -f32::INFINITY);
    dp_matrix.set_special(SPECIAL_C, bottom_row, c_move);
    let bottom_end = c_move + e_move;
    dp_matrix.set_special(SPECIAL_E, bottom_row, bottom_end);

    for bound in row_bounds.row(bottom_row) {
        let lb = bound.lb.max(1);
        let rb = bound.rb.min(profile_length + 1);
        for profile_idx in (lb..rb).rev() {
            // transitions out of node T are impossible, so the last column
            // reduces to the E exit on its own
            let match_value = log_sum(
                bottom_end,
                dp_matrix.get_delete(bottom_row, profile_idx + 1)
                    + profile.transition_score(Profile::MATCH_TO_DELETE, profile_idx),
            );
            dp_matrix.set_match(bottom_row, profile_idx, match_value);

            let delete_value = log_sum(
                bottom_end,
                dp_matrix.get_delete(bottom_row, profile_idx + 1)
                    + profile.transition_score(Profile::DELETE_TO_DELETE, profile_idx),
            );
            dp_matrix.set_delete(bottom_row, profile_idx, delete_value);

            dp_matrix.set_insert(bottom_row, profile_idx, -f32::INFINITY);
        }
    }

    for target_idx in (range_start..range_end).rev() {
        let next_row = target_idx + 1;
        let next_residue = target.digital(next_row);

        // B for this row accumulates over every cloud cell of the next row
        let mut begin_value = -f32::INFINITY;
        for bound in row_bounds.row(next_row) {
            let lb = bound.lb.max(1);
            let rb = bound.rb.min(profile_length + 1);
            for profile_idx in (lb..rb).rev() {
                begin_value = log_sum(
                    begin_value,
                    dp_matrix.get_match(next_row, profile_idx)
                        + profile.begin_to_match_score(profile_idx)
                        + profile.match_score(profile_idx, next_residue),
                );
            }
        }
        dp_matrix.set_special(SPECIAL_B, target_idx, begin_value);

        let j_value = log_sum(
            dp_matrix.get_special(SPECIAL_J, next_row) + j_loop,
            begin_value + j_move,
        );
        dp_matrix.set_special(SPECIAL_J, target_idx, j_value);

        let c_value = dp_matrix.get_special(SPECIAL_C, next_row) + c_loop;
        dp_matrix.set_special(SPECIAL_C, target_idx, c_value);

        let end_value = log_sum(j_value + e_loop, c_value + e_move);
        dp_matrix.set_special(SPECIAL_E, target_idx, end_value);

        let n_value = log_sum(
            dp_matrix.get_special(SPECIAL_N, next_row) + n_loop,
            begin_value + n_move,
        );
        dp_matrix.set_special(SPECIAL_N, target_idx, n_value);

        for bound in row_bounds.row(target_idx) {
            let lb = bound.lb.max(1);
            let rb = bound.rb.min(profile_length + 1);
            for profile_idx in (lb..rb).rev() {
                // suffix terms that need the next row's residue
                let next_match = if profile_idx < profile_length {
                    dp_matrix.get_match(next_row, profile_idx + 1)
                        + profile.match_score(profile_idx + 1, next_residue)
                } else {
                    -f32::INFINITY
                };
                let next_insert = dp_matrix.get_insert(next_row, profile_idx)
                    + profile.insert_score(profile_idx, next_residue);
                let next_delete = dp_matrix.get_delete(target_idx, profile_idx + 1);

                let match_value = log_sum(
                    log_sum(
                        next_match
                            + profile.transition_score(Profile::MATCH_TO_MATCH, profile_idx),
                        next_insert
                            + profile.transition_score(Profile::MATCH_TO_INSERT, profile_idx),
                    ),
                    log_sum(
                        next_delete
                            + profile.transition_score(Profile::MATCH_TO_DELETE, profile_idx),
                        end_value,
                    ),
                );
                dp_matrix.set_match(target_idx, profile_idx, match_value);

                let insert_value = log_sum(
                    next_match + profile.transition_score(Profile::INSERT_TO_MATCH, profile_idx),
                    next_insert + profile.transition_score(Profile::INSERT_TO_INSERT, profile_idx),
                );
                dp_matrix.set_insert(target_idx, profile_idx, insert_value);

                let delete_value = log_sum3(
                    next_match + profile.transition_score(Profile::DELETE_TO_MATCH, profile_idx),
                    next_delete + profile.transition_score(Profile::DELETE_TO_DELETE, profile_idx),
                    end_value,
                );
                dp_matrix.set_delete(target_idx, profile_idx, delete_value);
            }
        }
    }

    // virtual top row: only N and B are reachable
    let top_row = range_start - 1;
    let first_residue = target.digital(range_start);

    let mut begin_value = -f32::INFINITY;
    for bound in row_bounds.row(range_start) {
        let lb = bound.lb.max(1);
        let rb = bound.rb.min(profile_length + 1);
        for profile_idx in (lb..rb).rev() {
            begin_value = log_sum(
                begin_value,
                dp_matrix.get_match(range_start, profile_idx)
                    + profile.begin_to_match_score(profile_idx)
                    + profile.match_score(profile_idx, first_residue),
            );
        }
    }
    dp_matrix.set_special(SPECIAL_B, top_row, begin_value);
    dp_matrix.set_special(SPECIAL_J, top_row, -f32::INFINITY);
    dp_matrix.set_special(SPECIAL_C, top_row, -f32::INFINITY);
    dp_matrix.set_special(SPECIAL_E, top_row, -f32::INFINITY);

    let n_value = log_sum(
        dp_matrix.get_special(SPECIAL_N, range_start) + n_loop,
        begin_value + n_move,
    );
    dp_matrix.set_special(SPECIAL_N, top_row, n_value);

    n_value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::bounded::forward::{forward_bounded, forward_bounded_in_range};
    use crate::structs::DpMatrixFlat;
    use crate::test_utils::{random_profile, random_sequence, rng};

    #[test]
    fn test_forward_and_backward_agree_on_the_full_lattice() {
        let mut rng = rng(7);
        for (target_length, profile_length) in [(25usize, 10usize), (40, 30), (60, 15)] {
            let mut profile = random_profile(profile_length, &mut rng);
            let target = random_sequence(target_length, &mut rng);
            profile.configure_for_target_length(target.length);

            let row_bounds = RowBounds::full(target.length, profile.length);
            let mut forward_matrix = DpMatrixFlat::new(target.length, profile.length);
            let mut backward_matrix = DpMatrixFlat::new(target.length, profile.length);

            let forward_score =
                forward_bounded(&profile, &target, &mut forward_matrix, &row_bounds);
            let backward_score =
                backward_bounded(&profile, &target, &mut backward_matrix, &row_bounds);

            assert!(
                (forward_score - backward_score).abs() < 1e-3,
                "forward {forward_score} vs backward {backward_score}"
            );
        }
    }

    #[test]
    fn test_single_cell_lattice_score() {
        let mut rng = rng(11);
        let mut profile = random_profile(1, &mut rng);
        let target = random_sequence(1, &mut rng);
        profile.configure_for_target_length(1);

        let row_bounds = RowBounds::full(1, 1);
        let mut matrix = DpMatrixFlat::new(1, 1);
        let forward_score = forward_bounded(&profile, &target, &mut matrix, &row_bounds);

        let n_move = profile.special_transition_score(Profile::SPECIAL_N, Profile::SPECIAL_MOVE);
        let e_move = profile.special_transition_score(Profile::SPECIAL_E, Profile::SPECIAL_MOVE);
        let c_move = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_MOVE);
        let cell_score = n_move
            + profile.begin_to_match_score(1)
            + profile.match_score(1, target.digital(1));
        let expected = cell_score + e_move + c_move;

        assert!((forward_score - expected).abs() < 1e-4);
    }

    #[test]
    fn test_restricted_range_matches_full_run_on_a_shorter_target() {
        let mut rng = rng(13);
        let mut profile = random_profile(12, &mut rng);
        let target = random_sequence(30, &mut rng);
        profile.configure_for_target_length(target.length);

        // restricting to [a, b] must equal running on the sliced target
        // with the same outer-state configuration
        let (range_start, range_end) = (8usize, 19usize);
        let row_bounds = RowBounds::full(target.length, profile.length);
        let mut matrix = DpMatrixFlat::new(target.length, profile.length);
        let restricted_score = forward_bounded_in_range(
            &profile,
            &target,
            &mut matrix,
            &row_bounds,
            range_start,
            range_end,
        );

        let slice_codes: Vec<u8> = (range_start..=range_end)
            .map(|idx| target.digital(idx))
            .collect();
        let sliced_target = crate::structs::Sequence::from_digital(&slice_codes).unwrap();
        let sliced_bounds = RowBounds::full(sliced_target.length, profile.length);
        let mut sliced_matrix = DpMatrixFlat::new(sliced_target.length, profile.length);
        let sliced_score = forward_bounded(
            &profile,
            &sliced_target,
            &mut sliced_matrix,
            &sliced_bounds,
        );

        assert!((restricted_score - sliced_score).abs() < 1e-3);
    }
}
