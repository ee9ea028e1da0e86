use crate::stats::{exponential_survival, nats_to_bits, pval_to_eval};
use crate::structs::trace::{Trace, TraceState};
use crate::structs::{Profile, Sequence};

/// Everything the score finalisation needs besides the trace itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoreParams {
    pub forward_score_nats: f32,
    pub null_score_nats: f32,
    pub bias_correction_score_nats: f32,
    pub target_count: usize,
}

impl ScoreParams {
    pub fn new(target_count: usize) -> Self {
        ScoreParams {
            forward_score_nats: 0.0,
            null_score_nats: 0.0,
            bias_correction_score_nats: 0.0,
            target_count,
        }
    }
}

/// A reportable alignment between a profile and a target sequence.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub profile_name: String,
    pub target_name: String,
    /// Inclusive target coordinates of the aligned region
    pub target_start: usize,
    pub target_end: usize,
    /// Inclusive profile coordinates of the aligned region
    pub profile_start: usize,
    pub profile_end: usize,
    /// Length of the aligned region, counting gapped columns
    pub length: usize,
    /// Bias-corrected bit score
    pub score_bits: f32,
    pub pvalue: f64,
    pub evalue: f64,
    /// Aligned profile consensus, with '.' at insert columns
    pub profile_string: String,
    /// Annotation line: the residue on agreement, '+' on a positive score
    pub middle_string: String,
    /// Aligned target residues, with '-' at delete columns
    pub target_string: String,
    pub cigar: String,
}

impl Alignment {
    /// Build an alignment from an optimal-accuracy trace.
    ///
    /// The trace's first core region supplies the aligned coordinates and
    /// strings; the score parameters supply the bias-corrected score that
    /// is converted through the profile's fitted forward distribution.
    pub fn from_trace(
        trace: &Trace,
        profile: &Profile,
        target: &Sequence,
        score_params: &ScoreParams,
    ) -> Self {
        let mut profile_string = String::new();
        let mut middle_string = String::new();
        let mut target_string = String::new();
        let mut cigar = String::new();

        let mut target_start = 0usize;
        let mut target_end = 0usize;
        let mut profile_start = 0usize;
        let mut profile_end = 0usize;
        let mut length = 0usize;

        let mut run_state: Option<(char, usize)> = None;
        let mut flush_run = |cigar: &mut String, run: Option<(char, usize)>| {
            if let Some((op, count)) = run {
                cigar.push_str(&count.to_string());
                cigar.push(op);
            }
        };

        for step in trace.steps.iter().filter(|step| step.state.is_core()) {
            if length == 0 {
                target_start = step.target_idx;
                profile_start = step.profile_idx;
            }
            length += 1;

            let op = match step.state {
                TraceState::M => {
                    let consensus = profile.consensus_sequence[step.profile_idx] as char;
                    let residue = target.utf8(step.target_idx) as char;
                    profile_string.push(consensus);
                    target_string.push(residue);
                    if consensus.to_ascii_uppercase() == residue.to_ascii_uppercase() {
                        middle_string.push(residue.to_ascii_lowercase());
                    } else if profile.match_score(step.profile_idx, target.digital(step.target_idx))
                        > 0.0
                    {
                        middle_string.push('+');
                    } else {
                        middle_string.push(' ');
                    }
                    target_end = step.target_idx;
                    profile_end = step.profile_idx;
                    'M'
                }
                TraceState::I => {
                    profile_string.push('.');
                    middle_string.push(' ');
                    target_string.push(target.utf8(step.target_idx) as char);
                    target_end = step.target_idx;
                    'I'
                }
                TraceState::D => {
                    profile_string.push(profile.consensus_sequence[step.profile_idx] as char);
                    middle_string.push(' ');
                    target_string.push('-');
                    profile_end = step.profile_idx;
                    'D'
                }
                _ => unreachable!(),
            };

            run_state = match run_state {
                Some((current, count)) if current == op => Some((current, count + 1)),
                other => {
                    flush_run(&mut cigar, other);
                    Some((op, 1))
                }
            };
        }
        flush_run(&mut cigar, run_state);

        let corrected_nats = score_params.forward_score_nats
            - score_params.null_score_nats
            - score_params.bias_correction_score_nats;
        let score_bits = nats_to_bits(corrected_nats);
        let pvalue =
            exponential_survival(score_bits, profile.forward_lambda, profile.forward_tau);
        let evalue = pval_to_eval(pvalue, score_params.target_count);

        Alignment {
            profile_name: profile.name.clone(),
            target_name: target.name.clone(),
            target_start,
            target_end,
            profile_start,
            profile_end,
            length,
            score_bits,
            pvalue,
            evalue,
            profile_string,
            middle_string,
            target_string,
            cigar,
        }
    }

    /// One line of tab-separated output.
    pub fn tab_string(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.2e}\t{}",
            self.profile_name,
            self.target_name,
            self.profile_start,
            self.profile_end,
            self.target_start,
            self.target_end,
            self.score_bits,
            self.evalue,
            self.cigar,
        )
    }
}
