use crate::align::bounded::structs::RowBounds;
use crate::log_sum::{log_sum, log_sum3};
use crate::structs::dp_matrix::{
    DpMatrix, SPECIAL_B, SPECIAL_C, SPECIAL_E, SPECIAL_J, SPECIAL_N,
};
use crate::structs::{Profile, Sequence};

/// Bounded Forward over the whole target.
///
/// Returns the forward score in nats: C(Q) plus the C move transition.
pub fn forward_bounded(
    profile: &Profile,
    target: &Sequence,
    dp_matrix: &mut impl DpMatrix,
    row_bounds: &RowBounds,
) -> f32 {
    forward_bounded_in_range(profile, target, dp_matrix, row_bounds, 1, target.length)
}

/// Bounded Forward restricted to target rows [range_start, range_end].
///
/// The row before the range plays the Plan-7 top row: the path starts in N
/// there with probability one. Cells outside the row bounds read negative
/// infinity, so absent predecessors drop out of the log-sums naturally.
pub fn forward_bounded_in_range(
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

    let top_row = range_start - 1;
    dp_matrix.set_special(SPECIAL_N, top_row, 0.0);
    dp_matrix.set_special(SPECIAL_B, top_row, n_move);
    dp_matrix.set_special(SPECIAL_E, top_row, -f32::INFINITY);
    dp_matrix.set_special(SPECIAL_J, top_row, -f32::INFINITY);
    dp_matrix.set_special(SPECIAL_C, top_row, -f32::INFINITY);

    for target_idx in range_start..=range_end {
        let residue = target.digital(target_idx);
        let previous_row = target_idx - 1;
        let begin_value = dp_matrix.get_special(SPECIAL_B, previous_row);

        let mut end_accumulator = -f32::INFINITY;

        for bound in row_bounds.row(target_idx) {
            let lb = bound.lb.max(1);
            let touches_right_edge = bound.rb > profile_length;
            let rb = bound.rb.min(profile_length);

            for profile_idx in lb..rb {
                let match_value = log_sum(
                    log_sum(
                        dp_matrix.get_match(previous_row, profile_idx - 1)
                            + profile.transition_score(Profile::MATCH_TO_MATCH, profile_idx - 1),
                        dp_matrix.get_insert(previous_row, profile_idx - 1)
                            + profile.transition_score(Profile::INSERT_TO_MATCH, profile_idx - 1),
                    ),
                    log_sum(
                        dp_matrix.get_delete(previous_row, profile_idx - 1)
                            + profile.transition_score(Profile::DELETE_TO_MATCH, profile_idx - 1),
                        begin_value + profile.begin_to_match_score(profile_idx),
                    ),
                ) + profile.match_score(profile_idx, residue);
                dp_matrix.set_match(target_idx, profile_idx, match_value);

                let insert_value = log_sum(
                    dp_matrix.get_match(previous_row, profile_idx)
                        + profile.transition_score(Profile::MATCH_TO_INSERT, profile_idx),
                    dp_matrix.get_insert(previous_row, profile_idx)
                        + profile.transition_score(Profile::INSERT_TO_INSERT, profile_idx),
                ) + profile.insert_score(profile_idx, residue);
                dp_matrix.set_insert(target_idx, profile_idx, insert_value);

                let delete_value = log_sum(
                    dp_matrix.get_match(target_idx, profile_idx - 1)
                        + profile.transition_score(Profile::MATCH_TO_DELETE, profile_idx - 1),
                    dp_matrix.get_delete(target_idx, profile_idx - 1)
                        + profile.transition_score(Profile::DELETE_TO_DELETE, profile_idx - 1),
                );
                dp_matrix.set_delete(target_idx, profile_idx, delete_value);

                // local exit: E collects M and D at every column
                end_accumulator = log_sum3(end_accumulator, match_value, delete_value);
            }

            // unrolled final column: insert state T does not exist and E
            // absorbs the last match and delete directly
            if touches_right_edge {
                let profile_idx = profile_length;

                let match_value = log_sum(
                    log_sum(
                        dp_matrix.get_match(previous_row, profile_idx - 1)
                            + profile.transition_score(Profile::MATCH_TO_MATCH, profile_idx - 1),
                        dp_matrix.get_insert(previous_row, profile_idx - 1)
                            + profile.transition_score(Profile::INSERT_TO_MATCH, profile_idx - 1),
                    ),
                    log_sum(
                        dp_matrix.get_delete(previous_row, profile_idx - 1)
                            + profile.transition_score(Profile::DELETE_TO_MATCH, profile_idx - 1),
                        begin_value + profile.begin_to_match_score(profile_idx),
                    ),
                ) + profile.match_score(profile_idx, residue);
                dp_matrix.set_match(target_idx, profile_idx, match_value);

                dp_matrix.set_insert(target_idx, profile_idx, -f32::INFINITY);

                let delete_value = log_sum(
                    dp_matrix.get_match(target_idx, profile_idx - 1)
                        + profile.transition_score(Profile::MATCH_TO_DELETE, profile_idx - 1),
                    dp_matrix.get_delete(target_idx, profile_idx - 1)
                        + profile.transition_score(Profile::DELETE_TO_DELETE, profile_idx - 1),
                );
                dp_matrix.set_delete(target_idx, profile_idx, delete_value);

                end_accumulator = log_sum3(end_accumulator, match_value, delete_value);
            }
        }

        let previous_j = dp_matrix.get_special(SPECIAL_J, previous_row);
        let previous_c = dp_matrix.get_special(SPECIAL_C, previous_row);
        let previous_n = dp_matrix.get_special(SPECIAL_N, previous_row);

        dp_matrix.set_special(SPECIAL_E, target_idx, end_accumulator);
        let j_value = log_sum(previous_j + j_loop, end_accumulator + e_loop);
        dp_matrix.set_special(SPECIAL_J, target_idx, j_value);
        let c_value = log_sum(previous_c + c_loop, end_accumulator + e_move);
        dp_matrix.set_special(SPECIAL_C, target_idx, c_value);
        let n_value = previous_n + n_loop;
        dp_matrix.set_special(SPECIAL_N, target_idx, n_value);
        let b_value = log_sum(n_value + n_move, j_value + j_move);
        dp_matrix.set_special(SPECIAL_B, target_idx, b_value);
    }

    dp_matrix.get_special(SPECIAL_C, range_end) + c_move
}
