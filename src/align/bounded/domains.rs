use crate::structs::dp_matrix::{DpMatrix, SPECIAL_C, SPECIAL_J, SPECIAL_N};
use crate::structs::Profile;

/// An inclusive target-coordinate range believed to hold one alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainRange {
    pub start: usize,
    pub end: usize,
}

impl DomainRange {
    pub fn residue_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Thresholds for the region-finding walk.
#[derive(Debug, Clone, Copy)]
pub struct DomainParams {
    /// Posterior mass that opens a region
    pub rt1: f32,
    /// Mass below which an open region closes
    pub rt2: f32,
    /// Minimum peak mass for a region to be kept
    pub rt3: f32,
}

impl Default for DomainParams {
    fn default() -> Self {
        DomainParams {
            rt1: 0.25,
            rt2: 0.10,
            rt3: 0.20,
        }
    }
}

/// Find domain ranges from the forward and backward special-state rows.
///
/// `inside(q)` is the posterior probability that row q sits inside an
/// alignment, one minus the probability that N, J, or C emitted it. A
/// region opens where `inside` reaches rt1, stays open while it holds rt2,
/// and survives only if its peak reaches rt3.
pub fn decode_domains(
    profile: &Profile,
    forward_matrix: &impl DpMatrix,
    backward_matrix: &impl DpMatrix,
    params: &DomainParams,
) -> Vec<DomainRange> {
    let target_length = forward_matrix.target_length();

    let n_loop = profile.special_transition_score(Profile::SPECIAL_N, Profile::SPECIAL_LOOP);
    let c_loop = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_LOOP);
    let c_move = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_MOVE);
    let j_loop = profile.special_transition_score(Profile::SPECIAL_J, Profile::SPECIAL_LOOP);

    let forward_score = forward_matrix.get_special(SPECIAL_C, target_length) + c_move;

    let mut domains = vec![];
    let mut open: Option<(usize, f32)> = None;

    for target_idx in 1..=target_length {
        let previous_row = target_idx - 1;

        let n_emit = (forward_matrix.get_special(SPECIAL_N, previous_row)
            + n_loop
            + backward_matrix.get_special(SPECIAL_N, target_idx)
            - forward_score)
            .exp();
        let j_emit = (forward_matrix.get_special(SPECIAL_J, previous_row)
            + j_loop
            + backward_matrix.get_special(SPECIAL_J, target_idx)
            - forward_score)
            .exp();
        let c_emit = (forward_matrix.get_special(SPECIAL_C, previous_row)
            + c_loop
            + backward_matrix.get_special(SPECIAL_C, target_idx)
            - forward_score)
            .exp();

        let inside = (1.0 - (n_emit + j_emit + c_emit)).clamp(0.0, 1.0);

        match open {
            None => {
                if inside >= params.rt1 {
                    open = Some((target_idx, inside));
                }
            }
            Some((start, peak)) => {
                if inside < params.rt2 {
                    if peak >= params.rt3 {
                        domains.push(DomainRange {
                            start,
                            end: target_idx - 1,
                        });
                    }
                    open = None;
                } else {
                    open = Some((start, peak.max(inside)));
                }
            }
        }
    }

    if let Some((start, peak)) = open {
        if peak >= params.rt3 {
            domains.push(DomainRange {
                start,
                end: target_length,
            });
        }
    }

    domains
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::bounded::backward::backward_bounded;
    use crate::align::bounded::forward::forward_bounded;
    use crate::align::bounded::structs::RowBounds;
    use crate::structs::DpMatrixFlat;
    use crate::test_utils::{random_profile, random_sequence, rng};

    #[test]
    fn test_decode_domains_is_idempotent() {
        let mut rng = rng(31);
        let mut profile = random_profile(20, &mut rng);
        let target = random_sequence(40, &mut rng);
        profile.configure_for_target_length(target.length);

        let row_bounds = RowBounds::full(target.length, profile.length);
        let mut forward_matrix = DpMatrixFlat::new(target.length, profile.length);
        let mut backward_matrix = DpMatrixFlat::new(target.length, profile.length);
        forward_bounded(&profile, &target, &mut forward_matrix, &row_bounds);
        backward_bounded(&profile, &target, &mut backward_matrix, &row_bounds);

        let params = DomainParams::default();
        let first = decode_domains(&profile, &forward_matrix, &backward_matrix, &params);
        let second = decode_domains(&profile, &forward_matrix, &backward_matrix, &params);
        assert_eq!(first, second);
    }

    #[test]
    fn test_domain_ranges_are_ordered_and_disjoint() {
        let mut rng = rng(37);
        let mut profile = random_profile(25, &mut rng);
        let target = random_sequence(60, &mut rng);
        profile.configure_for_target_length(target.length);

        let row_bounds = RowBounds::full(target.length, profile.length);
        let mut forward_matrix = DpMatrixFlat::new(target.length, profile.length);
        let mut backward_matrix = DpMatrixFlat::new(target.length, profile.length);
        forward_bounded(&profile, &target, &mut forward_matrix, &row_bounds);
        backward_bounded(&profile, &target, &mut backward_matrix, &row_bounds);

        let domains = decode_domains(
            &profile,
            &forward_matrix,
            &backward_matrix,
            &DomainParams::default(),
        );
        for domain in &domains {
            assert!(domain.start >= 1 && domain.end <= target.length);
            assert!(domain.start <= domain.end);
        }
        for pair in domains.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
    }
}
