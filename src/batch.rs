//src/batch.rs

use ahash::AHashMap;
use rayon::prelude::*;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify_sample;
use crate::config::PipelineConfig;
use crate::error::{Result, SpeciesIdError};
use crate::fastq::fastq_to_fasta;
use crate::output::{validate_sample_name, OutputRouter, RoutedOutput};
use crate::search::SimilaritySearch;
use crate::taxdb::TaxonomyIndex;
use crate::types::Sample;
use crate::workspace::Workspace;

/// What one successfully processed sample produced.
#[derive(Debug, Clone)]
pub struct SampleSummary {
    pub reads: usize,
    pub hits: usize,
    pub unknown_hits: usize,
    pub species: usize,
    pub abundance_sum: f64,
    /// `sample_path` lives in the sample workspace; `group_path` is the durable copy.
    pub routed: RoutedOutput,
}

#[derive(Debug)]
pub struct SampleOutcome {
    pub sample: Sample,
    pub result: Result<SampleSummary>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SampleOutcome>,
    /// Samples never started because an earlier one failed under `fail_fast`.
    pub skipped: Vec<Sample>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped.is_empty()
    }

    /// One line per sample, then a totals line.
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            let _ = match &outcome.result {
                Ok(s) => writeln!(
                    out,
                    "OK\t{}\treads={}\thits={}\tunknown={}\tspecies={}\tsum={:.10}\t{}",
                    outcome.sample.name,
                    s.reads,
                    s.hits,
                    s.unknown_hits,
                    s.species,
                    s.abundance_sum,
                    s.routed.group_path.display()
                ),
                Err(e) => writeln!(out, "FAILED\t{}\t{}", outcome.sample.name, e),
            };
        }
        for sample in &self.skipped {
            let _ = writeln!(out, "SKIPPED\t{}", sample.name);
        }
        let _ = writeln!(
            out,
            "{} succeeded, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped.len()
        );
        out
    }
}

/// Find every directory under `root` holding a file called `fastq_name`.
/// The sample is named after that directory. Results are sorted by path.
pub fn discover_samples<P: AsRef<Path>>(root: P, fastq_name: &str) -> Result<Vec<Sample>> {
    let root = root.as_ref();
    let mut samples = Vec::new();
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let candidate = dir.join(fastq_name);
        if candidate.is_file() {
            // "." and friends have no file name of their own
            let resolved = fs::canonicalize(&dir).map_err(|e| SpeciesIdError::io(&dir, e))?;
            let name = resolved
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            log::info!("Found {} in folder: {}", fastq_name, name);
            samples.push(Sample {
                name,
                fastq: candidate,
            });
        }

        let entries = fs::read_dir(&dir).map_err(|e| SpeciesIdError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SpeciesIdError::io(&dir, e))?;
            // file_type does not follow symlinks, so link cycles are never walked
            let is_dir = entry
                .file_type()
                .map(|t| t.is_dir())
                .map_err(|e| SpeciesIdError::io(entry.path(), e))?;
            if is_dir {
                stack.push(entry.path());
            }
        }
    }

    samples.sort_by(|a, b| a.fastq.cmp(&b.fastq));
    Ok(samples)
}

/// Run one sample end to end: convert, search, classify, route.
pub fn process_sample(
    sample: &Sample,
    config: &PipelineConfig,
    searcher: &dyn SimilaritySearch,
    router: &OutputRouter,
) -> Result<SampleSummary> {
    validate_sample_name(&sample.name)?;

    let index = TaxonomyIndex::load(&config.taxonomy, config.taxonomy_strictness)?;

    let workspace = Workspace::create(config.work_dir.as_deref(), &sample.name)?;
    log::info!("{}: using workspace {}", sample.name, workspace.path().display());

    let fasta = workspace.join("sorted.fasta");
    let reads = fastq_to_fasta(&sample.fastq, &fasta)?;

    let hits = searcher.search(
        &fasta,
        &config.reference,
        config.identity_threshold,
        workspace.path(),
    )?;
    if hits.is_empty() {
        log::warn!("{}: no reads matched the reference", sample.name);
    }

    let results = classify_sample(&hits, &index, config)?;

    if config.keep_intermediates {
        for (name, text) in [
            ("classified_full.tsv", results.get_classified_table()),
            ("classified_full_with_abundance.tsv", results.get_annotated_table()),
        ] {
            let path = workspace.join(name);
            fs::write(&path, text).map_err(|e| SpeciesIdError::io(&path, e))?;
        }
    }

    let routed = router.route(&sample.name, workspace.path(), &results.get_species_table())?;

    Ok(SampleSummary {
        reads,
        hits: hits.len(),
        unknown_hits: results.join_stats.unknown,
        species: results.species_rows.len(),
        abundance_sum: results.species_abundance_sum(),
        routed,
    })
}

/// Pairs each sample with the FASTQ of an earlier sample of the same name, if any.
/// Only the first sample to claim a name gets its workspace and output file.
fn claim_names(samples: Vec<Sample>) -> Vec<(Sample, Option<PathBuf>)> {
    let mut first_seen: AHashMap<String, PathBuf> = AHashMap::new();
    samples
        .into_iter()
        .map(|sample| {
            let taken = match first_seen.get(&sample.name) {
                Some(first) => Some(first.clone()),
                None => {
                    first_seen.insert(sample.name.clone(), sample.fastq.clone());
                    None
                }
            };
            (sample, taken)
        })
        .collect()
}

/// Process every sample and collect a per-sample outcome.
///
/// Failures are isolated unless `fail_fast` is set, in which case the batch
/// runs sequentially and stops at the first failure. A sample whose name was
/// already claimed fails with `DuplicateSample` and is never run. `on_done` is
/// called as each sample finishes, possibly from a worker thread.
pub fn run_batch(
    config: &PipelineConfig,
    samples: Vec<Sample>,
    searcher: &dyn SimilaritySearch,
    on_done: &(dyn Fn(&SampleOutcome) + Sync),
) -> Result<BatchReport> {
    config.validate()?;
    let router = OutputRouter::new(&config.output_root);
    let work = claim_names(samples);

    let run_one = |(sample, taken): (Sample, Option<PathBuf>)| {
        let result = match taken {
            Some(first) => Err(SpeciesIdError::DuplicateSample {
                name: sample.name.clone(),
                first,
            }),
            None => process_sample(&sample, config, searcher, &router),
        };
        if let Err(e) = &result {
            log::error!("{}: {}", sample.name, e);
        }
        let outcome = SampleOutcome { sample, result };
        on_done(&outcome);
        outcome
    };

    let mut report = BatchReport::default();

    if config.jobs > 1 && !config.fail_fast {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs)
            .build()
            .map_err(|e| SpeciesIdError::Config(format!("cannot build thread pool: {e}")))?;
        report.outcomes = pool.install(|| work.into_par_iter().map(run_one).collect());
    } else {
        let mut pending = work.into_iter();
        for item in pending.by_ref() {
            let outcome = run_one(item);
            let failed = outcome.result.is_err();
            report.outcomes.push(outcome);
            if failed && config.fail_fast {
                break;
            }
        }
        report.skipped = pending.map(|(sample, _)| sample).collect();
    }

    log::info!(
        "Batch finished: {} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped.len()
    );
    Ok(report)
}
