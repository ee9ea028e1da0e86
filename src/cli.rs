use std::path::PathBuf;

use crate::args::Args;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cloudseqs")]
#[command(
    about = "Seeded, pruned profile HMM search: adaptive-band forward/backward with posterior alignment"
)]
pub struct Cli {
    /// Query profile file
    #[arg(value_name = "QUERY.hmm")]
    query: String,
    /// Target file
    #[arg(value_name = "TARGET.fasta")]
    target: String,
    /// Alignment seeds from an upstream prefilter
    #[arg(value_name = "SEEDS.json")]
    seeds: String,
    /// Only report hits with an E-value below this value
    #[arg(short = 'E', default_value_t = 10.0)]
    evalue_cutoff: f64,
    /// Where to place the results
    #[arg(short, long, default_value = "results.tsv")]
    output_file: String,
    /// Also write a per-domain table to this path
    #[arg(long, value_name = "PATH")]
    domain_table: Option<String>,
    /// X-drop below the antidiagonal maximum that prunes a cell
    #[arg(long, default_value_t = 12.0)]
    alpha: f32,
    /// X-drop below the global maximum that ends a sweep
    #[arg(long, default_value_t = 20.0)]
    beta: f32,
    /// Number of antidiagonals computed before pruning starts
    #[arg(long, default_value_t = 5)]
    gamma: usize,
    /// Hard cap on cloud cells per sweep (0 leaves the sweep uncapped)
    #[arg(long, default_value_t = 0, value_name = "n")]
    max_cells: usize,
    /// Database size used for E-values (defaults to the number of targets)
    #[arg(short = 'Z', long, value_name = "n")]
    database_size: Option<usize>,
    /// Give posterior and optimal-accuracy their own matrices instead of
    /// recycling the forward/backward allocations
    #[arg(long)]
    no_matrix_recycling: bool,
}

impl Cli {
    pub fn args(self) -> anyhow::Result<Args> {
        let mut args = Args::default();

        args.paths.query = PathBuf::from(self.query);
        args.paths.target = PathBuf::from(self.target);
        args.paths.seeds = PathBuf::from(self.seeds);
        args.paths.results = PathBuf::from(self.output_file);
        args.paths.domain_table = self.domain_table.map(PathBuf::from);

        args.cloud_params.alpha = self.alpha;
        args.cloud_params.beta = self.beta;
        args.cloud_params.gamma = self.gamma;
        if self.max_cells > 0 {
            args.cloud_params.max_cells = self.max_cells;
        }

        args.threshold_report = self.evalue_cutoff;
        args.database_size = self.database_size;
        args.matrix_recycling = !self.no_matrix_recycling;

        Ok(args)
    }
}
