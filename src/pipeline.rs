use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::mem;

use crate::align::bounded::structs::{
    CloudBoundGroup, CloudMatrixLinear, DpMatrixSparse, RowBounds, Seed,
};
use crate::align::bounded::{
    backward_bounded, backward_bounded_in_range, cloud_score, cloud_search_backward,
    cloud_search_forward, decode_domains, forward_bounded, forward_bounded_in_range, null1_score,
    null2_score, optimal_accuracy_bounded, optimal_accuracy_bounded_in_range, posterior_bounded,
    posterior_bounded_in_range, traceback_bounded, traceback_bounded_in_range, DomainRange,
};
use crate::args::{Args, EvalueThresholds};
use crate::log_sum::log_sum;
use crate::output::output_domain_table::write_domain_table_output;
use crate::output::output_tabular::write_tabular_output;
use crate::output::path_buf_ext::PathBufExt;
use crate::stats::{exponential_survival, gumbel_survival, nats_to_bits, pval_to_eval};
use crate::structs::hmm::parse_hmms_from_p7hmm_file;
use crate::structs::{Alignment, Profile, ScoreParams, Sequence, Trace};

use anyhow::Context;
use log::{debug, warn};
use thiserror::Error;

pub type SeedMap = HashMap<String, Vec<Seed>>;

/// Forward and backward must agree over one cloud; a larger gap marks the
/// pair's result numerically unreliable.
const FORWARD_BACKWARD_TOLERANCE: f32 = 1e-2;

#[derive(Error, Debug)]
#[error(
    "seed (target {target_start}..{target_end}, profile {profile_start}..{profile_end}) \
     lies outside the {target_length} x {profile_length} lattice"
)]
pub struct SeedOutOfBoundsError {
    pub target_start: usize,
    pub target_end: usize,
    pub profile_start: usize,
    pub profile_end: usize,
    pub target_length: usize,
    pub profile_length: usize,
}

/// Outcome of each stage's threshold test.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdFlags {
    pub passed_viterbi: bool,
    pub passed_cloud: bool,
    pub passed_forward: bool,
    pub passed_report: bool,
}

/// Scores and alignment for one decoded domain.
#[derive(Debug, Clone)]
pub struct DomainScores {
    pub range: DomainRange,
    pub forward_score_nats: f32,
    pub null2_score_nats: f32,
    pub optimal_accuracy: f32,
    pub alignment: Alignment,
}

/// Everything one (profile, target, seed) invocation produces.
#[derive(Debug, Clone, Default)]
pub struct PairResult {
    pub profile_name: String,
    pub target_name: String,
    pub viterbi_evalue: f64,
    pub cloud_score_nats: f32,
    pub cloud_evalue: f64,
    pub forward_score_nats: f32,
    pub backward_score_nats: f32,
    pub null1_score_nats: f32,
    pub null2_score_nats: f32,
    pub score_bits: f32,
    pub pvalue: f64,
    pub evalue: f64,
    pub optimal_accuracy: f32,
    pub cloud_cells: usize,
    pub total_cells: usize,
    pub domains: Vec<DomainScores>,
    pub alignment: Option<Alignment>,
    pub flags: ThresholdFlags,
    /// Forward/backward disagreed beyond tolerance
    pub numerically_unreliable: bool,
    /// Pruning consumed the cloud before any usable bounds survived
    pub cloud_exhausted: bool,
    /// A sweep stopped at the hard cell cap
    pub hit_cell_cap: bool,
}

/// Reusable working memory for the per-pair pipeline.
#[derive(Default)]
pub struct AlignmentStructs {
    cloud_matrix: CloudMatrixLinear,
    forward_bounds: CloudBoundGroup,
    backward_bounds: CloudBoundGroup,
    forward_matrix: DpMatrixSparse,
    backward_matrix: DpMatrixSparse,
    posterior_matrix: DpMatrixSparse,
    optimal_matrix: DpMatrixSparse,
}

fn forward_evalue(nats: f32, profile: &Profile, database_size: usize) -> f64 {
    let pvalue = exponential_survival(nats_to_bits(nats), profile.forward_lambda, profile.forward_tau);
    pval_to_eval(pvalue, database_size)
}

/// Run the full pruned pipeline for one (profile, target, seed) triple.
pub fn align_pair(
    profile: &mut Profile,
    target: &Sequence,
    seed: &Seed,
    dp: &mut AlignmentStructs,
    args: &Args,
    thresholds: &EvalueThresholds,
    target_count: usize,
) -> anyhow::Result<PairResult> {
    let target_length = target.length;
    let profile_length = profile.length;
    let database_size = args.database_size_or(target_count);

    if seed.target_start < 1
        || seed.target_start > seed.target_end
        || seed.target_end > target_length
        || seed.profile_start < 1
        || seed.profile_start > seed.profile_end
        || seed.profile_end > profile_length
    {
        return Err(SeedOutOfBoundsError {
            target_start: seed.target_start,
            target_end: seed.target_end,
            profile_start: seed.profile_start,
            profile_end: seed.profile_end,
            target_length,
            profile_length,
        }
        .into());
    }

    // stage one: the prefilter's hit stands in for Viterbi; when it only
    // reported a bit score, convert through the fitted Gumbel
    let viterbi_evalue = if seed.evalue < f64::MAX {
        seed.evalue
    } else {
        let pvalue = gumbel_survival(seed.score_bits, profile.viterbi_lambda, profile.viterbi_mu);
        pval_to_eval(pvalue, database_size)
    };

    let mut result = PairResult {
        profile_name: profile.name.clone(),
        target_name: target.name.clone(),
        viterbi_evalue,
        total_cells: (target_length + 1) * (profile_length + 1),
        ..PairResult::default()
    };

    result.flags.passed_viterbi =
        !args.viterbi_filter_enabled || viterbi_evalue < thresholds.viterbi;
    if !result.flags.passed_viterbi {
        return Ok(result);
    }

    profile.configure_for_target_length(target_length);

    // stage two: pruned cloud search from the seed
    dp.cloud_matrix.reuse(target_length);
    dp.forward_bounds.reuse(target_length, profile_length);
    dp.backward_bounds.reuse(target_length, profile_length);

    let forward_scores = cloud_search_forward(
        profile,
        target,
        seed,
        &mut dp.cloud_matrix,
        &args.cloud_params,
        &mut dp.forward_bounds,
    );
    dp.cloud_matrix.reuse(target_length);
    let backward_scores = cloud_search_backward(
        profile,
        target,
        seed,
        &mut dp.cloud_matrix,
        &args.cloud_params,
        &mut dp.backward_bounds,
    );

    result.hit_cell_cap = forward_scores.hit_cell_cap || backward_scores.hit_cell_cap;
    result.cloud_score_nats = cloud_score(&forward_scores, &backward_scores);
    result.cloud_evalue = forward_evalue(result.cloud_score_nats, profile, database_size);

    if !dp.forward_bounds.valid() || !dp.backward_bounds.valid() {
        result.cloud_exhausted = true;
        return Ok(result);
    }

    result.flags.passed_cloud =
        !args.cloud_filter_enabled || result.cloud_evalue < thresholds.cloud;
    if !result.flags.passed_cloud {
        return Ok(result);
    }

    CloudBoundGroup::join_bounds(&mut dp.forward_bounds, &dp.backward_bounds);
    let row_bounds = RowBounds::new(&dp.forward_bounds);
    if !row_bounds.valid() {
        result.cloud_exhausted = true;
        return Ok(result);
    }
    result.cloud_cells = row_bounds.num_cells;

    // stage three: bounded forward/backward over the cloud
    let mut forward_matrix = mem::take(&mut dp.forward_matrix);
    let mut backward_matrix = mem::take(&mut dp.backward_matrix);
    forward_matrix.reuse(target_length, profile_length, &row_bounds);
    backward_matrix.reuse(target_length, profile_length, &row_bounds);

    result.forward_score_nats = forward_bounded(profile, target, &mut forward_matrix, &row_bounds);
    result.backward_score_nats =
        backward_bounded(profile, target, &mut backward_matrix, &row_bounds);

    let score_gap = (result.forward_score_nats - result.backward_score_nats).abs();
    if score_gap > FORWARD_BACKWARD_TOLERANCE {
        warn!(
            "forward/backward disagree by {score_gap} nats for {} vs {}",
            profile.name, target.name
        );
        result.numerically_unreliable = true;
    }

    let forward_eval = forward_evalue(result.forward_score_nats, profile, database_size);
    result.flags.passed_forward =
        !args.forward_filter_enabled || forward_eval < thresholds.forward;
    if !result.flags.passed_forward {
        dp.forward_matrix = forward_matrix;
        dp.backward_matrix = backward_matrix;
        return Ok(result);
    }

    // stage four: domains are decoded from the special-state rows before
    // posterior decoding may recycle the backward matrix
    let domain_ranges = decode_domains(
        profile,
        &forward_matrix,
        &backward_matrix,
        &args.domain_params,
    );

    // posterior overwrites its input backward values in place; with
    // recycling the backward matrix itself moves into the posterior slot
    let mut posterior_matrix = if args.matrix_recycling {
        backward_matrix
    } else {
        let mut posterior_matrix = mem::take(&mut dp.posterior_matrix);
        posterior_matrix.reuse(target_length, profile_length, &row_bounds);
        posterior_matrix.copy_from(&backward_matrix);
        dp.backward_matrix = backward_matrix;
        posterior_matrix
    };
    posterior_bounded(profile, &forward_matrix, &mut posterior_matrix, &row_bounds);

    result.null1_score_nats = null1_score(target_length);
    let null2_raw = null2_score(
        &posterior_matrix,
        profile,
        target,
        &row_bounds,
        1,
        target_length,
    );
    result.null2_score_nats = log_sum(0.0, crate::align::bounded::NULL2_OMEGA.ln() + null2_raw);

    // optimal accuracy never reads its output matrix, so the forward
    // matrix's storage is free to take the optimal slot
    let mut optimal_matrix = if args.matrix_recycling {
        forward_matrix
    } else {
        let mut optimal_matrix = mem::take(&mut dp.optimal_matrix);
        optimal_matrix.reuse(target_length, profile_length, &row_bounds);
        dp.forward_matrix = forward_matrix;
        optimal_matrix
    };
    result.optimal_accuracy =
        optimal_accuracy_bounded(profile, &posterior_matrix, &mut optimal_matrix, &row_bounds);

    let score_params = ScoreParams {
        forward_score_nats: result.forward_score_nats,
        null_score_nats: result.null1_score_nats,
        bias_correction_score_nats: result.null2_score_nats,
        target_count: database_size,
    };

    let mut trace = Trace::new(target_length, profile_length);
    traceback_bounded(
        profile,
        &posterior_matrix,
        &optimal_matrix,
        &mut trace,
        target_length,
    );
    if !trace.steps.is_empty() {
        result.alignment = Some(Alignment::from_trace(&trace, profile, target, &score_params));
    }

    // stage five: per-domain rescoring, reusing the two live matrices as
    // scratch now that the full-cloud pass is finished
    let mut domain_forward_sum = 0.0f32;
    let mut domain_bias_sum = 0.0f32;
    let mut domain_residues = 0usize;

    for range in &domain_ranges {
        optimal_matrix.fill_neg_infinity();
        posterior_matrix.fill_neg_infinity();

        let domain_forward = forward_bounded_in_range(
            profile,
            target,
            &mut optimal_matrix,
            &row_bounds,
            range.start,
            range.end,
        );
        backward_bounded_in_range(
            profile,
            target,
            &mut posterior_matrix,
            &row_bounds,
            range.start,
            range.end,
        );
        posterior_bounded_in_range(
            profile,
            &optimal_matrix,
            &mut posterior_matrix,
            &row_bounds,
            range.start,
            range.end,
        );

        let domain_null2_raw = null2_score(
            &posterior_matrix,
            profile,
            target,
            &row_bounds,
            range.start,
            range.end,
        );
        let domain_null2 =
            log_sum(0.0, crate::align::bounded::NULL2_OMEGA.ln() + domain_null2_raw);

        let domain_accuracy = optimal_accuracy_bounded_in_range(
            profile,
            &posterior_matrix,
            &mut optimal_matrix,
            &row_bounds,
            range.start,
            range.end,
        );

        let mut domain_trace = Trace::new(target_length, profile_length);
        traceback_bounded_in_range(
            profile,
            &posterior_matrix,
            &optimal_matrix,
            &mut domain_trace,
            range.start,
            range.end,
        );
        if domain_trace.steps.is_empty() {
            continue;
        }

        let domain_score_params = ScoreParams {
            forward_score_nats: domain_forward,
            null_score_nats: result.null1_score_nats,
            bias_correction_score_nats: domain_null2,
            target_count: database_size,
        };
        let alignment = Alignment::from_trace(&domain_trace, profile, target, &domain_score_params);

        domain_forward_sum += domain_forward;
        domain_bias_sum += domain_null2_raw;
        domain_residues += range.residue_count();

        result.domains.push(DomainScores {
            range: *range,
            forward_score_nats: domain_forward,
            null2_score_nats: domain_null2,
            optimal_accuracy: domain_accuracy,
            alignment,
        });
    }

    // reconstructed whole-sequence score over the decoded domains; the
    // rows outside every domain ride the background loop
    if !result.domains.is_empty() {
        let folded_bias =
            log_sum(0.0, crate::align::bounded::NULL2_OMEGA.ln() + domain_bias_sum);
        let outside_rows = (target_length - domain_residues) as f32;
        let spacer = target_length as f32 / (target_length as f32 + 3.0);
        let reconstructed_nats = domain_forward_sum + outside_rows * spacer.ln();
        debug!(
            "reconstructed domain score: {:.3} bits",
            nats_to_bits(reconstructed_nats - (result.null1_score_nats + folded_bias))
        );
    }

    let corrected_nats =
        result.forward_score_nats - result.null1_score_nats - result.null2_score_nats;
    result.score_bits = nats_to_bits(corrected_nats);
    result.pvalue =
        exponential_survival(result.score_bits, profile.forward_lambda, profile.forward_tau);
    result.evalue = pval_to_eval(result.pvalue, database_size);
    result.flags.passed_report =
        !args.report_filter_enabled || result.evalue < thresholds.report;

    // hand the allocations back for the next pair
    if args.matrix_recycling {
        dp.forward_matrix = optimal_matrix;
        dp.backward_matrix = posterior_matrix;
    } else {
        dp.optimal_matrix = optimal_matrix;
        dp.posterior_matrix = posterior_matrix;
    }

    Ok(result)
}

/// Align every seeded (profile, target) pair and write the passing hits.
pub fn align(
    args: &Args,
    profiles: Option<Vec<Profile>>,
    seed_map: Option<SeedMap>,
) -> anyhow::Result<Vec<PairResult>> {
    let profiles = match profiles {
        // if the caller already has parsed profiles, use them
        Some(profiles) => profiles,
        None => {
            let hmms = parse_hmms_from_p7hmm_file(&args.paths.query)?;
            hmms.iter().map(Profile::new).collect()
        }
    };

    let seed_map: SeedMap = match seed_map {
        Some(seed_map) => seed_map,
        None => {
            let mut seeds_string = String::new();
            File::open(&args.paths.seeds)
                .context(format!(
                    "failed to open alignment seeds file: {}",
                    &args.paths.seeds.to_string_lossy(),
                ))?
                .read_to_string(&mut seeds_string)
                .context(format!(
                    "failed to read alignment seeds file: {}",
                    &args.paths.seeds.to_string_lossy(),
                ))?;
            serde_json::from_str(&seeds_string).context(format!(
                "failed to parse alignment seeds file: {}",
                &args.paths.seeds.to_string_lossy(),
            ))?
        }
    };

    let mut profile_map: HashMap<String, Profile> = HashMap::new();
    for profile in profiles {
        profile_map.insert(profile.name.clone(), profile);
    }

    let targets = Sequence::amino_from_fasta(&args.paths.target)?;
    let target_count = targets.len();
    let mut target_map: HashMap<String, Sequence> = HashMap::new();
    for target in targets {
        target_map.insert(target.name.clone(), target);
    }

    let thresholds = args.evalue_thresholds(target_count);
    let mut dp = AlignmentStructs::default();

    let mut results: Vec<PairResult> = vec![];

    let mut profile_names: Vec<&String> = seed_map.keys().collect();
    profile_names.sort();

    for profile_name in profile_names {
        let profile = match profile_map.get_mut(profile_name) {
            Some(profile) => profile,
            None => {
                warn!("no profile parsed for seed entry: {profile_name}");
                continue;
            }
        };
        let seeds = seed_map.get(profile_name).unwrap();

        for seed in seeds {
            let target = match target_map.get(&seed.target_name[..]) {
                Some(target) => target,
                None => {
                    warn!("no target sequence named: {}", seed.target_name);
                    continue;
                }
            };

            let result =
                align_pair(profile, target, seed, &mut dp, args, &thresholds, target_count)?;
            debug!(
                "{} vs {}: forward {:.3} nats, {} domains",
                result.profile_name,
                result.target_name,
                result.forward_score_nats,
                result.domains.len()
            );
            results.push(result);
        }
    }

    let mut alignments: Vec<Alignment> = vec![];
    for result in &results {
        if !result.flags.passed_report {
            continue;
        }
        if result.domains.is_empty() {
            alignments.extend(result.alignment.iter().cloned());
        } else {
            alignments.extend(result.domains.iter().map(|domain| domain.alignment.clone()));
        }
    }

    write_tabular_output(&alignments, &mut args.paths.results.open(true)?)?;

    if let Some(domain_table_path) = &args.paths.domain_table {
        write_domain_table_output(&results, &mut domain_table_path.open(true)?)?;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{random_profile, random_sequence, rng};

    fn relaxed_args() -> Args {
        Args {
            viterbi_filter_enabled: false,
            cloud_filter_enabled: false,
            forward_filter_enabled: false,
            report_filter_enabled: false,
            ..Args::default()
        }
    }

    fn planted_pair() -> (Profile, Sequence, Seed) {
        // plant the profile's consensus into the middle of a random
        // target so the pipeline has a real alignment to find
        let mut rng = rng(67);
        let profile = random_profile(30, &mut rng);
        let mut codes: Vec<u8> = vec![];
        let left_flank = random_sequence(40, &mut rng);
        codes.extend((1..=left_flank.length).map(|idx| left_flank.digital(idx)));
        for profile_idx in 1..=profile.length {
            let best = (0u8..20)
                .max_by(|a, b| {
                    profile
                        .match_score(profile_idx, *a)
                        .partial_cmp(&profile.match_score(profile_idx, *b))
                        .unwrap()
                })
                .unwrap();
            codes.push(best);
        }
        let right_flank = random_sequence(40, &mut rng);
        codes.extend((1..=right_flank.length).map(|idx| right_flank.digital(idx)));

        let mut target = Sequence::from_digital(&codes).unwrap();
        target.name = "planted".to_string();

        let seed = Seed {
            target_name: target.name.clone(),
            target_start: 41,
            target_end: 70,
            profile_start: 1,
            profile_end: 30,
            score_bits: 50.0,
            evalue: 1e-10,
        };
        (profile, target, seed)
    }

    #[test]
    fn test_align_pair_finds_the_planted_domain() {
        let (mut profile, target, seed) = planted_pair();
        let args = relaxed_args();
        let thresholds = args.evalue_thresholds(1);
        let mut dp = AlignmentStructs::default();

        let result =
            align_pair(&mut profile, &target, &seed, &mut dp, &args, &thresholds, 1).unwrap();

        assert!(!result.numerically_unreliable);
        assert!(result.forward_score_nats > 0.0);
        assert_eq!(result.domains.len(), 1);

        let domain = &result.domains[0];
        assert!(domain.range.start >= 30 && domain.range.start <= 50);
        assert!(domain.range.end >= 60 && domain.range.end <= 80);
        assert!(domain.alignment.score_bits > 0.0);
    }

    #[test]
    fn test_recycling_matches_separate_allocations() {
        let (mut profile, target, seed) = planted_pair();
        let thresholds = Args::default().evalue_thresholds(1);

        let mut recycled_args = relaxed_args();
        recycled_args.matrix_recycling = true;
        let mut separate_args = relaxed_args();
        separate_args.matrix_recycling = false;

        let mut dp = AlignmentStructs::default();
        let recycled = align_pair(
            &mut profile,
            &target,
            &seed,
            &mut dp,
            &recycled_args,
            &thresholds,
            1,
        )
        .unwrap();

        let mut dp = AlignmentStructs::default();
        let separate = align_pair(
            &mut profile,
            &target,
            &seed,
            &mut dp,
            &separate_args,
            &thresholds,
            1,
        )
        .unwrap();

        assert_eq!(recycled.forward_score_nats, separate.forward_score_nats);
        assert_eq!(recycled.score_bits, separate.score_bits);
        assert_eq!(recycled.domains.len(), separate.domains.len());
        for (a, b) in recycled.domains.iter().zip(separate.domains.iter()) {
            assert_eq!(a.range, b.range);
            assert_eq!(a.forward_score_nats, b.forward_score_nats);
            assert_eq!(a.alignment.cigar, b.alignment.cigar);
        }
    }

    #[test]
    fn test_seed_outside_lattice_is_fatal() {
        let (mut profile, target, mut seed) = planted_pair();
        seed.profile_end = profile.length + 5;

        let args = relaxed_args();
        let thresholds = args.evalue_thresholds(1);
        let mut dp = AlignmentStructs::default();

        let result = align_pair(&mut profile, &target, &seed, &mut dp, &args, &thresholds, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_viterbi_filter_short_circuits() {
        let (mut profile, target, mut seed) = planted_pair();
        seed.evalue = 1e6;

        let args = Args::default();
        let thresholds = args.evalue_thresholds(1);
        let mut dp = AlignmentStructs::default();

        let result =
            align_pair(&mut profile, &target, &seed, &mut dp, &args, &thresholds, 1).unwrap();
        assert!(!result.flags.passed_viterbi);
        assert_eq!(result.forward_score_nats, 0.0);
        assert!(result.domains.is_empty());
    }
}
