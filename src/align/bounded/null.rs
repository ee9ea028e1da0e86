use crate::align::bounded::structs::RowBounds;
use crate::structs::dp_matrix::{DpMatrix, SPECIAL_C, SPECIAL_J, SPECIAL_N};
use crate::structs::profile::AMINO_BACKGROUND_FREQUENCIES;
use crate::structs::sequence::{AMINO_ALPHABET_SIZE, AMINO_B, AMINO_X, AMINO_Z};
use crate::structs::{Profile, Sequence};

/// Prior probability that a hit carries composition bias at all.
pub const NULL2_OMEGA: f32 = 1.0 / 256.0;

/// The length null: every residue emitted by the background loop.
pub fn null1_score(target_length: usize) -> f32 {
    let length = target_length as f32;
    let p1 = length / (length + 1.0);
    length * p1.ln() + (1.0 - p1).ln()
}

/// Composition bias for one domain range, in nats.
///
/// Builds the expected emission odds over the domain's posterior mass, then
/// scores each observed residue under that expectation. The caller folds the
/// result into the bias prior with `log_sum(0, ln(omega) + sum_of_biases)`.
pub fn null2_score(
    posterior_matrix: &impl DpMatrix,
    profile: &Profile,
    target: &Sequence,
    row_bounds: &RowBounds,
    range_start: usize,
    range_end: usize,
) -> f32 {
    let profile_length = profile.length;

    let mut expected_odds = [0.0f32; AMINO_ALPHABET_SIZE];
    let mut posterior_mass = 0.0f32;

    for target_idx in range_start..=range_end {
        // N/J/C emissions carry odds of exactly one
        let special_mass = posterior_matrix.get_special(SPECIAL_N, target_idx)
            + posterior_matrix.get_special(SPECIAL_J, target_idx)
            + posterior_matrix.get_special(SPECIAL_C, target_idx);
        for odds in expected_odds.iter_mut() {
            *odds += special_mass;
        }
        posterior_mass += special_mass;

        for bound in row_bounds.row(target_idx) {
            let lb = bound.lb.max(1);
            let rb = bound.rb.min(profile_length + 1);
            for profile_idx in lb..rb {
                let match_posterior = posterior_matrix.get_match(target_idx, profile_idx);
                let insert_posterior = posterior_matrix.get_insert(target_idx, profile_idx);

                for (residue, odds) in expected_odds.iter_mut().enumerate() {
                    *odds += match_posterior
                        * profile.match_score(profile_idx, residue as u8).exp()
                        + insert_posterior
                            * profile.insert_score(profile_idx, residue as u8).exp();
                }
                posterior_mass += match_posterior + insert_posterior;
            }
        }
    }

    if posterior_mass <= 0.0 {
        return 0.0;
    }
    for odds in expected_odds.iter_mut() {
        *odds /= posterior_mass;
    }

    let mut score = 0.0f32;
    for target_idx in range_start..=range_end {
        score += residue_odds(&expected_odds, target.digital(target_idx)).ln();
    }
    score
}

/// Expected odds for one residue, marginalizing ambiguity codes over the
/// background.
fn residue_odds(expected_odds: &[f32; AMINO_ALPHABET_SIZE], residue: u8) -> f32 {
    let weighted = |residues: &[usize]| {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for &residue in residues {
            numerator += AMINO_BACKGROUND_FREQUENCIES[residue] * expected_odds[residue];
            denominator += AMINO_BACKGROUND_FREQUENCIES[residue];
        }
        numerator / denominator
    };

    match residue {
        AMINO_X => weighted(&(0..AMINO_ALPHABET_SIZE).collect::<Vec<_>>()),
        AMINO_B => weighted(&[2, 11]),
        AMINO_Z => weighted(&[3, 13]),
        _ => expected_odds[residue as usize],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::DpMatrixFlat;
    use crate::test_utils::{random_profile, random_sequence, rng};

    #[test]
    fn test_null1_score_formula() {
        let score = null1_score(100);
        let expected = 100.0 * (100.0f32 / 101.0).ln() + (1.0f32 / 101.0).ln();
        assert!((score - expected).abs() < 1e-5);
    }

    #[test]
    fn test_null2_is_zero_without_alignment_mass() {
        let mut rng = rng(41);
        let profile = random_profile(8, &mut rng);
        let target = random_sequence(12, &mut rng);
        let row_bounds = RowBounds::full(target.length, profile.length);

        // all posterior mass on the outer states: expected odds are flat
        let mut posterior_matrix = DpMatrixFlat::new(target.length, profile.length);
        for target_idx in 0..=target.length {
            posterior_matrix.set_special(SPECIAL_N, target_idx, 1.0);
            posterior_matrix.set_special(SPECIAL_J, target_idx, 0.0);
            posterior_matrix.set_special(SPECIAL_C, target_idx, 0.0);
        }
        for target_idx in 1..=target.length {
            for profile_idx in 1..=profile.length {
                posterior_matrix.set_match(target_idx, profile_idx, 0.0);
                posterior_matrix.set_insert(target_idx, profile_idx, 0.0);
            }
        }

        let score = null2_score(
            &posterior_matrix,
            &profile,
            &target,
            &row_bounds,
            1,
            target.length,
        );
        assert!(score.abs() < 1e-5);
    }
}
