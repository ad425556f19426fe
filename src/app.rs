use std::time::Duration;

use serde::Serialize;

use crate::classify::{classify, mismatch_warning};
use crate::domain::{Outcome, SpeciesRequest};
use crate::entrez::{SequenceDatabase, fetch_best_record};
use crate::error::PhyloError;
use crate::query::build_query;
use crate::report::{PersistedPaths, ReportWriter, RunReport};

/// Everything one run needs besides the remote client: the ordered species
/// list and the shared gene/length/template parameters.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub species: Vec<String>,
    pub gene_name: String,
    pub min_length: u64,
    pub max_length: u64,
    pub template: Option<String>,
    pub template_values: Vec<String>,
}

/// The three independent run policies.
///
/// `skip_errors` carries two effects under the one flag: it downgrades fetch
/// errors from fatal to not-found, and it suppresses the corpus placeholder
/// block for every not-found species. Existing callers depend on the
/// persisted-output shape, so the coupling stays.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub verbose: bool,
    pub skip_errors: bool,
    pub skip_warnings: bool,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub gene: String,
    pub total_species: usize,
    pub found: Vec<FoundEntry>,
    pub unfound: Vec<String>,
    pub warnings: Vec<String>,
    pub output_fasta: String,
    pub used_species: Option<String>,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoundEntry {
    pub species: String,
    pub record_id: String,
}

#[derive(Clone)]
pub struct App<D: SequenceDatabase> {
    db: D,
    writer: ReportWriter,
}

impl<D: SequenceDatabase> App<D> {
    pub fn new(db: D, writer: ReportWriter) -> Self {
        Self { db, writer }
    }

    /// Drives one run: species are processed strictly one at a time, in
    /// input-list order, each through query construction, fetch and
    /// classification, into the accumulating [`RunReport`], which is
    /// persisted once after the loop. A template error always aborts; a
    /// fetch error aborts unless `skip_errors`, in which case the species
    /// joins the not-found path. An aborted run persists nothing.
    pub fn run(
        &self,
        request: &RunRequest,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, PhyloError> {
        let mut report = RunReport::default();
        let total = request.species.len();

        for (index, species_name) in request.species.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!("[{}/{}] {}", index + 1, total, species_name),
                elapsed: None,
            });

            let species_request = SpeciesRequest {
                species_name: species_name.clone(),
                gene_name: request.gene_name.clone(),
                min_length: request.min_length,
                max_length: request.max_length,
            };
            let query = build_query(
                &species_request,
                request.template.as_deref(),
                &request.template_values,
            )?;

            let outcome = match fetch_best_record(&self.db, &query) {
                Ok(record) => classify(species_name, record),
                Err(err) if options.skip_errors => {
                    tracing::warn!(species = %species_name, "absorbed fetch error: {err}");
                    Outcome::FetchError {
                        species: species_name.clone(),
                        message: err.to_string(),
                    }
                }
                Err(err) => return Err(err),
            };

            Self::accumulate(outcome, &request.gene_name, options, &mut report, sink);
        }

        let paths = self.writer.persist(&report, options)?;
        Ok(summarize(request, report, paths))
    }

    fn accumulate(
        outcome: Outcome,
        gene_name: &str,
        options: RunOptions,
        report: &mut RunReport,
        sink: &dyn ProgressSink,
    ) {
        match outcome {
            Outcome::Found {
                species,
                record_id,
                fasta_text,
                name_match,
            } => {
                if options.verbose {
                    sink.event(ProgressEvent {
                        message: format!(
                            "For {species} {gene_name}, found {record_id} with length {}.",
                            fasta_text.len()
                        ),
                        elapsed: None,
                    });
                }
                report.corpus.push(fasta_text);
                report.found.push((species.clone(), record_id));
                report.used_species.push(species.clone());
                if !name_match && !options.skip_warnings {
                    let warning = mismatch_warning(&species);
                    sink.event(ProgressEvent {
                        message: warning.clone(),
                        elapsed: None,
                    });
                    report.warnings.push(warning);
                }
            }
            Outcome::NotFound { species } => {
                report.unfound.push(species.clone());
                if !options.skip_errors {
                    report
                        .corpus
                        .push(format!(">{species} {gene_name} not found.\n\n"));
                }
            }
            // Only reachable once skip_errors has absorbed the failure, so
            // the species is recorded unfound with no placeholder block.
            Outcome::FetchError { species, .. } => {
                report.unfound.push(species);
            }
        }
    }
}

fn summarize(request: &RunRequest, report: RunReport, paths: PersistedPaths) -> RunSummary {
    RunSummary {
        gene: request.gene_name.clone(),
        total_species: request.species.len(),
        found: report
            .found
            .iter()
            .map(|(species, record_id)| FoundEntry {
                species: species.clone(),
                record_id: record_id.clone(),
            })
            .collect(),
        unfound: report.unfound.clone(),
        warnings: report.warnings.clone(),
        output_fasta: paths.output_fasta.to_string(),
        used_species: paths.used_species.map(|path| path.to_string()),
        completed_at: chrono::Utc::now().to_rfc3339(),
    }
}
