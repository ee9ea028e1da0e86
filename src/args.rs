use std::path::PathBuf;

use crate::align::bounded::structs::CloudSearchParams;
use crate::align::bounded::DomainParams;
use crate::stats::pval_to_eval;

#[derive(Default, Debug, Clone)]
pub struct Paths {
    /// The query profile file provided at the command line
    pub query: PathBuf,
    /// The target sequence file provided at the command line
    pub target: PathBuf,
    /// The alignment seeds used for cloud search
    pub seeds: PathBuf,
    /// The path that results will be written to
    pub results: PathBuf,
    /// Optional per-domain table output
    pub domain_table: Option<PathBuf>,
}

/// The arguments that are passed throughout the pipeline
#[derive(Debug, Clone)]
pub struct Args {
    pub paths: Paths,
    pub cloud_params: CloudSearchParams,
    pub domain_params: DomainParams,
    /// P-value threshold on the prefilter's reported score
    pub threshold_viterbi: f64,
    /// P-value threshold on the composite cloud score
    pub threshold_cloud: f64,
    /// P-value threshold on the bounded forward score
    pub threshold_forward: f64,
    /// E-value threshold for reporting
    pub threshold_report: f64,
    pub viterbi_filter_enabled: bool,
    pub cloud_filter_enabled: bool,
    pub forward_filter_enabled: bool,
    pub report_filter_enabled: bool,
    /// Database size for E-values; defaults to the number of targets
    pub database_size: Option<usize>,
    /// Reuse the backward/forward matrices for posterior/optimal accuracy
    pub matrix_recycling: bool,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            paths: Paths::default(),
            cloud_params: CloudSearchParams::default(),
            domain_params: DomainParams::default(),
            threshold_viterbi: 1e-3,
            threshold_cloud: 1e-5,
            threshold_forward: 1e-5,
            threshold_report: 10.0,
            viterbi_filter_enabled: true,
            cloud_filter_enabled: true,
            forward_filter_enabled: true,
            report_filter_enabled: true,
            database_size: None,
            matrix_recycling: true,
        }
    }
}

/// The stage thresholds converted to E-values against one database size.
#[derive(Debug, Clone, Copy)]
pub struct EvalueThresholds {
    pub viterbi: f64,
    pub cloud: f64,
    pub forward: f64,
    pub report: f64,
}

impl Args {
    pub fn evalue_thresholds(&self, target_count: usize) -> EvalueThresholds {
        let database_size = self.database_size.unwrap_or(target_count);
        EvalueThresholds {
            viterbi: pval_to_eval(self.threshold_viterbi, database_size),
            cloud: pval_to_eval(self.threshold_cloud, database_size),
            forward: pval_to_eval(self.threshold_forward, database_size),
            // the report threshold is already an E-value
            report: self.threshold_report,
        }
    }

    pub fn database_size_or(&self, target_count: usize) -> usize {
        self.database_size.unwrap_or(target_count)
    }
}
