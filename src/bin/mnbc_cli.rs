use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use mnbc_rs::config::{DEFAULT_DELTA, DEFAULT_PENALTY};
use mnbc_rs::{build_database, classify_reads, BuildConfig, ClassifyConfig, MnbcError, ReadInput, TieBreak};

#[derive(Parser)]
#[command(name = "mnbc-rs")]
#[command(version)]
#[command(about = "Minimizer-based naive Bayes classifier for sequencing reads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one minimizer index per reference genome
    Build {
        /// K-mer length (1-32)
        #[arg(short)]
        k: usize,

        /// Number of worker threads
        #[arg(short = 'c', long = "threads", default_value = "1")]
        threads: usize,

        /// Directory of reference FASTA files, one genome per file
        #[arg(short = 'i', long = "input")]
        reference_dir: PathBuf,

        /// Existing directory the index files are written to
        #[arg(short = 'o', long = "output")]
        output_dir: PathBuf,

        /// Ignore records shorter than this many bases
        #[arg(short = 'f', long = "min-length", default_value = "0")]
        length_threshold: usize,

        /// Log of an interrupted run; reference files it lists as finished are skipped
        #[arg(short = 'b', long = "checkpoint")]
        checkpoint_log: Option<PathBuf>,

        /// Also append completion lines to this file
        #[arg(long)]
        progress_log: Option<PathBuf>,
    },

    /// Classify reads against a built database
    Classify {
        /// K-mer length the database was built with
        #[arg(short)]
        k: usize,

        /// Number of scoring threads
        #[arg(short = 'c', long = "threads", default_value = "1")]
        threads: usize,

        /// Directory of genome index files
        #[arg(short = 'd', long = "database")]
        database_dir: PathBuf,

        /// Tab-separated genome taxonomy table
        #[arg(short = 'm', long = "taxonomy")]
        taxonomy: PathBuf,

        /// Output TSV; an existing file from an interrupted run is resumed
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// 1 for single-end, 2 for paired-end reads
        #[arg(short = 't', long = "read-type", value_parser = clap::value_parser!(u8).range(1..=2))]
        read_type: u8,

        /// Read files (FASTA/FASTQ, optionally gzipped): one, or two mate files
        #[arg(required = true, num_args = 1..=2)]
        reads: Vec<PathBuf>,

        /// Score of a read minimizer missing from a genome
        #[arg(short = 'p', long = "penalty", default_value_t = DEFAULT_PENALTY, allow_hyphen_values = true)]
        penalty: f32,

        /// Score band of delta-voting
        #[arg(long, default_value_t = DEFAULT_DELTA)]
        delta: f32,

        /// How reads with tied best scores are resolved
        #[arg(long, value_enum, default_value = "lca")]
        tie_break: TiePolicy,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TiePolicy {
    /// Lowest common rank of the exact-max genomes
    Lca,
    /// Species vote among genomes within a chained score band
    DeltaVote,
}

impl From<TiePolicy> for TieBreak {
    fn from(p: TiePolicy) -> Self {
        match p {
            TiePolicy::Lca => TieBreak::Lca,
            TiePolicy::DeltaVote => TieBreak::DeltaVote,
        }
    }
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&format!("{{spinner:.{}}} {{msg}}", color))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(msg);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn run(cli: Cli) -> Result<(), MnbcError> {
    match cli.command {
        Commands::Build {
            k,
            threads,
            reference_dir,
            output_dir,
            length_threshold,
            checkpoint_log,
            progress_log,
        } => {
            let mut config = BuildConfig::new(k, threads, reference_dir, output_dir);
            config.length_threshold = length_threshold;
            config.checkpoint_log = checkpoint_log;
            config.progress_log = progress_log;

            let sp = spinner("blue", "Building genome indices...");
            let summary = build_database(&config);
            sp.finish_and_clear();
            let summary = summary?;
            println!(
                "Built {} genome indices ({} empty, {} skipped by checkpoint)",
                summary.finished, summary.empty, summary.skipped_by_checkpoint
            );
            if !summary.failed.is_empty() {
                println!("{} reference files failed:", summary.failed.len());
                for name in &summary.failed {
                    println!("  {}", name);
                }
            }
        }
        Commands::Classify {
            k,
            threads,
            database_dir,
            taxonomy,
            output,
            read_type,
            mut reads,
            penalty,
            delta,
            tie_break,
        } => {
            let input = match (read_type, reads.len()) {
                (1, 1) => ReadInput::Single(reads.remove(0)),
                (2, 2) => {
                    let r2 = reads.remove(1);
                    ReadInput::Paired(reads.remove(0), r2)
                }
                (t, n) => {
                    return Err(MnbcError::Config(format!(
                        "read type {} needs {} read file(s), got {}",
                        t, t, n
                    )))
                }
            };
            let mut config = ClassifyConfig::new(k, threads, database_dir, taxonomy, output, input);
            config.penalty = penalty;
            config.delta = delta;
            config.tie_break = tie_break.into();

            let sp = spinner("green", "Classifying reads...");
            let summary = classify_reads(&config);
            sp.finish_and_clear();
            let summary = summary?;
            println!(
                "Classified {} reads: {} resolved, {} unresolved, {} skipped ({} already finished)",
                summary.rows_written,
                summary.classified,
                summary.unresolved,
                summary.skipped,
                summary.previously_finished
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(1)
        }
    }
}
