use crate::align::bounded::structs::RowBounds;
use crate::structs::dp_matrix::{
    DpMatrix, SPECIAL_B, SPECIAL_C, SPECIAL_E, SPECIAL_J, SPECIAL_N,
};
use crate::structs::Profile;

/// A predecessor is admissible only where the profile transition exists.
#[inline]
fn gated(transition_score: f32, value: f32) -> f32 {
    if transition_score == -f32::INFINITY {
        -f32::INFINITY
    } else {
        value
    }
}

/// Optimal accuracy DP over the cloud.
///
/// Same topology as Viterbi, but accumulating posterior mass instead of
/// multiplying probabilities: the terminal value is the expected number of
/// correctly aligned residues of the best path. The output matrix's prior
/// contents are never read, which is what makes recycling the Forward
/// matrix's storage safe.
pub fn optimal_accuracy_bounded(
    profile: &Profile,
    posterior_matrix: &impl DpMatrix,
    optimal_matrix: &mut impl DpMatrix,
    row_bounds: &RowBounds,
) -> f32 {
    optimal_accuracy_bounded_in_range(
        profile,
        posterior_matrix,
        optimal_matrix,
        row_bounds,
        1,
        posterior_matrix.target_length(),
    )
}

pub fn optimal_accuracy_bounded_in_range(
    profile: &Profile,
    posterior_matrix: &impl DpMatrix,
    optimal_matrix: &mut impl DpMatrix,
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
    let j_loop = profile.special_transition_score(Profile::SPECIAL_J, Profile::SPECIAL_LOOP);
    let j_move = profile.special_transition_score(Profile::SPECIAL_J, Profile::SPECIAL_MOVE);

    let top_row = range_start - 1;
    optimal_matrix.set_special(SPECIAL_N, top_row, 0.0);
    optimal_matrix.set_special(SPECIAL_B, top_row, gated(n_move, 0.0));
    optimal_matrix.set_special(SPECIAL_E, top_row, -f32::INFINITY);
    optimal_matrix.set_special(SPECIAL_J, top_row, -f32::INFINITY);
    optimal_matrix.set_special(SPECIAL_C, top_row, -f32::INFINITY);

    for target_idx in range_start..=range_end {
        let previous_row = target_idx - 1;
        let begin_value = optimal_matrix.get_special(SPECIAL_B, previous_row);

        let mut end_accumulator = -f32::INFINITY;

        for bound in row_bounds.row(target_idx) {
            let lb = bound.lb.max(1);
            let rb = bound.rb.min(profile_length + 1);
            for profile_idx in lb..rb {
                let match_value = gated(
                    profile.transition_score(Profile::MATCH_TO_MATCH, profile_idx - 1),
                    optimal_matrix.get_match(previous_row, profile_idx - 1),
                )
                .max(gated(
                    profile.transition_score(Profile::INSERT_TO_MATCH, profile_idx - 1),
                    optimal_matrix.get_insert(previous_row, profile_idx - 1),
                ))
                .max(gated(
                    profile.transition_score(Profile::DELETE_TO_MATCH, profile_idx - 1),
                    optimal_matrix.get_delete(previous_row, profile_idx - 1),
                ))
                .max(gated(profile.begin_to_match_score(profile_idx), begin_value))
                    + posterior_matrix.get_match(target_idx, profile_idx);
                optimal_matrix.set_match(target_idx, profile_idx, match_value);

                let insert_value = if profile_idx < profile_length {
                    gated(
                        profile.transition_score(Profile::MATCH_TO_INSERT, profile_idx),
                        optimal_matrix.get_match(previous_row, profile_idx),
                    )
                    .max(gated(
                        profile.transition_score(Profile::INSERT_TO_INSERT, profile_idx),
                        optimal_matrix.get_insert(previous_row, profile_idx),
                    )) + posterior_matrix.get_insert(target_idx, profile_idx)
                } else {
                    -f32::INFINITY
                };
                optimal_matrix.set_insert(target_idx, profile_idx, insert_value);

                // deletes emit nothing and add no posterior mass
                let delete_value = gated(
                    profile.transition_score(Profile::MATCH_TO_DELETE, profile_idx - 1),
                    optimal_matrix.get_match(target_idx, profile_idx - 1),
                )
                .max(gated(
                    profile.transition_score(Profile::DELETE_TO_DELETE, profile_idx - 1),
                    optimal_matrix.get_delete(target_idx, profile_idx - 1),
                ));
                optimal_matrix.set_delete(target_idx, profile_idx, delete_value);

                end_accumulator = end_accumulator.max(match_value).max(delete_value);
            }
        }

        optimal_matrix.set_special(SPECIAL_E, target_idx, end_accumulator);

        let j_value = gated(
            j_loop,
            optimal_matrix.get_special(SPECIAL_J, previous_row)
                + posterior_matrix.get_special(SPECIAL_J, target_idx),
        )
        .max(gated(e_loop, end_accumulator));
        optimal_matrix.set_special(SPECIAL_J, target_idx, j_value);

        let c_value = gated(
            c_loop,
            optimal_matrix.get_special(SPECIAL_C, previous_row)
                + posterior_matrix.get_special(SPECIAL_C, target_idx),
        )
        .max(gated(e_move, end_accumulator));
        optimal_matrix.set_special(SPECIAL_C, target_idx, c_value);

        let n_value = gated(
            n_loop,
            optimal_matrix.get_special(SPECIAL_N, previous_row)
                + posterior_matrix.get_special(SPECIAL_N, target_idx),
        );
        optimal_matrix.set_special(SPECIAL_N, target_idx, n_value);

        let b_value = gated(n_move, n_value).max(gated(j_move, j_value));
        optimal_matrix.set_special(SPECIAL_B, target_idx, b_value);
    }

    optimal_matrix.get_special(SPECIAL_C, range_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::bounded::backward::backward_bounded;
    use crate::align::bounded::forward::forward_bounded;
    use crate::align::bounded::posterior::posterior_bounded;
    use crate::structs::DpMatrixFlat;
    use crate::test_utils::{random_profile, random_sequence, rng};

    #[test]
    fn test_expected_accuracy_is_bounded_by_target_length() {
        let mut rng = rng(43);
        let mut profile = random_profile(15, &mut rng);
        let target = random_sequence(25, &mut rng);
        profile.configure_for_target_length(target.length);

        let row_bounds = RowBounds::full(target.length, profile.length);
        let mut forward_matrix = DpMatrixFlat::new(target.length, profile.length);
        let mut posterior_matrix = DpMatrixFlat::new(target.length, profile.length);
        let mut optimal_matrix = DpMatrixFlat::new(target.length, profile.length);

        forward_bounded(&profile, &target, &mut forward_matrix, &row_bounds);
        backward_bounded(&profile, &target, &mut posterior_matrix, &row_bounds);
        posterior_bounded(&profile, &forward_matrix, &mut posterior_matrix, &row_bounds);
        let accuracy = optimal_accuracy_bounded(
            &profile,
            &posterior_matrix,
            &mut optimal_matrix,
            &row_bounds,
        );

        // the best path cannot claim more posterior mass than one unit
        // per target row
        assert!(accuracy.is_finite());
        assert!(accuracy > 0.0);
        assert!(accuracy <= target.length as f32 + 1e-3);
    }
}
