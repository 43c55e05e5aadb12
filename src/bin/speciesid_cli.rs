use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;

use speciesid_rs::batch::{discover_samples, run_batch};
use speciesid_rs::classify::UnknownPolicy;
use speciesid_rs::logging::init_logger;
use speciesid_rs::search::Vsearch;
use speciesid_rs::taxdb::TaxonomyStrictness;
use speciesid_rs::PipelineConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UnknownArg {
    Bucket,
    Exclude,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrictnessArg {
    Strict,
    Lenient,
}

/// Build per-species relative-abundance tables for every sample directory.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// TOML configuration file; command-line flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory searched recursively for sample folders
    #[arg(value_name = "INPUT_ROOT")]
    input_root: Option<PathBuf>,

    /// Where group folders are created
    #[arg(short, long)]
    output_root: Option<PathBuf>,

    /// Taxonomy table (tab-delimited, header line first)
    #[arg(long)]
    taxonomy: Option<PathBuf>,

    /// Reference sequences (FASTA)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// FASTQ file name that marks a sample folder
    #[arg(long)]
    fastq_name: Option<String>,

    /// Minimum identity for a hit, as a fraction
    #[arg(long, value_name = "FLOAT")]
    identity: Option<f64>,

    /// Threads passed to vsearch
    #[arg(short, long)]
    threads: Option<usize>,

    /// vsearch executable
    #[arg(long)]
    vsearch: Option<PathBuf>,

    /// Taxonomy column holding the species name
    #[arg(long)]
    species_field: Option<String>,

    #[arg(long, value_enum)]
    unknown_policy: Option<UnknownArg>,

    #[arg(long, value_enum)]
    taxonomy_strictness: Option<StrictnessArg>,

    /// Treat an abundance sum away from 1 as an error
    #[arg(long)]
    strict_abundance: bool,

    /// Keep sample workspaces under this directory
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Also write classified_full*.tsv into each workspace
    #[arg(long)]
    keep_intermediates: bool,

    /// Samples processed at the same time
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Stop at the first failing sample
    #[arg(long)]
    fail_fast: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> speciesid_rs::Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(v) = self.input_root {
            cfg.input_root = v;
        }
        if let Some(v) = self.output_root {
            cfg.output_root = v;
        }
        if let Some(v) = self.taxonomy {
            cfg.taxonomy = v;
        }
        if let Some(v) = self.reference {
            cfg.reference = v;
        }
        if let Some(v) = self.fastq_name {
            cfg.fastq_name = v;
        }
        if let Some(v) = self.identity {
            cfg.identity_threshold = v;
        }
        if let Some(v) = self.threads {
            cfg.threads = v;
        }
        if let Some(v) = self.vsearch {
            cfg.vsearch = v;
        }
        if let Some(v) = self.species_field {
            cfg.species_field = v;
        }
        if let Some(v) = self.work_dir {
            cfg.work_dir = Some(v);
        }
        if let Some(v) = self.jobs {
            cfg.jobs = v;
        }
        if let Some(v) = self.unknown_policy {
            cfg.unknown_policy = match v {
                UnknownArg::Bucket => UnknownPolicy::Bucket,
                UnknownArg::Exclude => UnknownPolicy::Exclude,
            };
        }
        if let Some(v) = self.taxonomy_strictness {
            cfg.taxonomy_strictness = match v {
                StrictnessArg::Strict => TaxonomyStrictness::Strict,
                StrictnessArg::Lenient => TaxonomyStrictness::Lenient,
            };
        }
        cfg.strict_abundance |= self.strict_abundance;
        cfg.keep_intermediates |= self.keep_intermediates;
        cfg.fail_fast |= self.fail_fast;

        cfg.validate()?;
        Ok(cfg)
    }
}

fn spinner(color: &str, msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template(&format!("{{spinner:.{}}} {{msg}}", color))
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(msg.to_string());
    spinner
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config = match cli.into_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::from(2);
        }
    };

    // 1. Gather sample folders
    let gather = spinner(
        "blue",
        &format!(
            "Gathering '{}' files under {}...",
            config.fastq_name,
            config.input_root.display()
        ),
    );
    let samples = match discover_samples(&config.input_root, &config.fastq_name) {
        Ok(samples) => samples,
        Err(e) => {
            gather.abandon_with_message(format!("Sample discovery failed: {}", e));
            return ExitCode::FAILURE;
        }
    };
    gather.finish_with_message(format!("Found {} sample(s).", samples.len()));

    // 2. Process them
    let bar = ProgressBar::new(samples.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.green} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let searcher = Vsearch::new(&config.vsearch, config.threads);
    let report = run_batch(&config, samples, &searcher, &|outcome| {
        bar.set_message(outcome.sample.name.clone());
        bar.inc(1);
    });
    bar.finish_and_clear();

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // 3. Summary
    print!("{}", report.summary_text());
    let done = spinner("cyan", "");
    if report.is_success() {
        done.finish_with_message("All samples processed successfully!");
        ExitCode::SUCCESS
    } else {
        done.abandon_with_message(format!("{} sample(s) failed.", report.failed()));
        ExitCode::FAILURE
    }
}
