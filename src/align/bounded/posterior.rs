use crate::align::bounded::structs::RowBounds;
use crate::structs::dp_matrix::{
    DpMatrix, SPECIAL_B, SPECIAL_C, SPECIAL_E, SPECIAL_J, SPECIAL_N,
};
use crate::structs::Profile;

/// Posterior decoding over the cloud.
///
/// `posterior_matrix` must hold Backward values on entry and is overwritten
/// in place with probability-space posteriors; each value is read before its
/// cell is written, which is what makes recycling the Backward matrix safe.
/// Delete states emit nothing and decode to zero. Special rows N/J/C hold
/// the probability that the state emitted the row's residue.
pub fn posterior_bounded(
    profile: &Profile,
    forward_matrix: &impl DpMatrix,
    posterior_matrix: &mut impl DpMatrix,
    row_bounds: &RowBounds,
) -> f32 {
    posterior_bounded_in_range(
        profile,
        forward_matrix,
        posterior_matrix,
        row_bounds,
        1,
        forward_matrix.target_length(),
    )
}

/// Posterior decoding restricted to target rows [range_start, range_end].
///
/// Returns the forward score the posteriors were normalized with.
pub fn posterior_bounded_in_range(
    profile: &Profile,
    forward_matrix: &impl DpMatrix,
    posterior_matrix: &mut impl DpMatrix,
    row_bounds: &RowBounds,
    range_start: usize,
    range_end: usize,
) -> f32 {
    let profile_length = profile.length;

    let n_loop = profile.special_transition_score(Profile::SPECIAL_N, Profile::SPECIAL_LOOP);
    let c_loop = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_LOOP);
    let c_move = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_MOVE);
    let j_loop = profile.special_transition_score(Profile::SPECIAL_J, Profile::SPECIAL_LOOP);

    let forward_score = forward_matrix.get_special(SPECIAL_C, range_end) + c_move;

    let top_row = range_start - 1;
    for state_idx in [SPECIAL_N, SPECIAL_J, SPECIAL_B, SPECIAL_E, SPECIAL_C] {
        posterior_matrix.set_special(state_idx, top_row, 0.0);
    }

    for target_idx in range_start..=range_end {
        let previous_row = target_idx - 1;

        // probability that each outer state emitted this row's residue
        let n_emit = (forward_matrix.get_special(SPECIAL_N, previous_row)
            + n_loop
            + posterior_matrix.get_special(SPECIAL_N, target_idx)
            - forward_score)
            .exp();
        let j_emit = (forward_matrix.get_special(SPECIAL_J, previous_row)
            + j_loop
            + posterior_matrix.get_special(SPECIAL_J, target_idx)
            - forward_score)
            .exp();
        let c_emit = (forward_matrix.get_special(SPECIAL_C, previous_row)
            + c_loop
            + posterior_matrix.get_special(SPECIAL_C, target_idx)
            - forward_score)
            .exp();

        posterior_matrix.set_special(SPECIAL_N, target_idx, n_emit);
        posterior_matrix.set_special(SPECIAL_J, target_idx, j_emit);
        posterior_matrix.set_special(SPECIAL_C, target_idx, c_emit);
        posterior_matrix.set_special(SPECIAL_B, target_idx, 0.0);
        posterior_matrix.set_special(SPECIAL_E, target_idx, 0.0);

        for bound in row_bounds.row(target_idx) {
            let lb = bound.lb.max(1);
            let rb = bound.rb.min(profile_length + 1);
            for profile_idx in lb..rb {
                let match_posterior = (forward_matrix.get_match(target_idx, profile_idx)
                    + posterior_matrix.get_match(target_idx, profile_idx)
                    - forward_score)
                    .exp();
                posterior_matrix.set_match(target_idx, profile_idx, match_posterior);

                let insert_posterior = (forward_matrix.get_insert(target_idx, profile_idx)
                    + posterior_matrix.get_insert(target_idx, profile_idx)
                    - forward_score)
                    .exp();
                posterior_matrix.set_insert(target_idx, profile_idx, insert_posterior);

                posterior_matrix.set_delete(target_idx, profile_idx, 0.0);
            }
        }
    }

    forward_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::bounded::backward::backward_bounded;
    use crate::align::bounded::forward::forward_bounded;
    use crate::structs::{DpMatrixFlat, Sequence};
    use crate::test_utils::{random_profile, random_sequence, rng};

    fn decode_full(
        target: &Sequence,
        profile: &Profile,
    ) -> (DpMatrixFlat, DpMatrixFlat, RowBounds) {
        let row_bounds = RowBounds::full(target.length, profile.length);
        let mut forward_matrix = DpMatrixFlat::new(target.length, profile.length);
        let mut posterior_matrix = DpMatrixFlat::new(target.length, profile.length);

        forward_bounded(profile, target, &mut forward_matrix, &row_bounds);
        backward_bounded(profile, target, &mut posterior_matrix, &row_bounds);
        posterior_bounded(profile, &forward_matrix, &mut posterior_matrix, &row_bounds);

        (forward_matrix, posterior_matrix, row_bounds)
    }

    #[test]
    fn test_posterior_rows_sum_to_one() {
        let mut rng = rng(23);
        let mut profile = random_profile(20, &mut rng);
        let target = random_sequence(35, &mut rng);
        profile.configure_for_target_length(target.length);

        let (_, posterior_matrix, _) = decode_full(&target, &profile);

        for target_idx in 1..=target.length {
            let mut mass = posterior_matrix.get_special(SPECIAL_N, target_idx)
                + posterior_matrix.get_special(SPECIAL_J, target_idx)
                + posterior_matrix.get_special(SPECIAL_C, target_idx);
            for profile_idx in 1..=profile.length {
                mass += posterior_matrix.get_match(target_idx, profile_idx);
                mass += posterior_matrix.get_insert(target_idx, profile_idx);
            }
            assert!(
                (mass - 1.0).abs() < 1e-3,
                "row {target_idx} posterior mass {mass}"
            );
        }
    }

    #[test]
    fn test_delete_cells_decode_to_zero() {
        let mut rng = rng(29);
        let mut profile = random_profile(10, &mut rng);
        let target = random_sequence(15, &mut rng);
        profile.configure_for_target_length(target.length);

        let (_, posterior_matrix, _) = decode_full(&target, &profile);

        for target_idx in 1..=target.length {
            for profile_idx in 1..=profile.length {
                assert_eq!(posterior_matrix.get_delete(target_idx, profile_idx), 0.0);
            }
        }
    }
}
