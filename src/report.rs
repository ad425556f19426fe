use std::fmt::Write as _;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::app::{RunOptions, RunSummary};
use crate::error::PhyloError;

pub const OUTPUT_FASTA: &str = "output.fasta";
pub const USED_SPECIES: &str = "used_species.txt";

/// In-memory aggregate of all per-species outcomes for one run. Owned
/// exclusively by the orchestrator, mutated throughout the loop, persisted
/// once at the end and never read back. All five sequences keep input-list
/// order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub found: Vec<(String, String)>,
    pub unfound: Vec<String>,
    pub warnings: Vec<String>,
    pub corpus: Vec<String>,
    pub used_species: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PersistedPaths {
    pub output_fasta: Utf8PathBuf,
    pub used_species: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    out_dir: Utf8PathBuf,
}

impl ReportWriter {
    pub fn new(out_dir: Utf8PathBuf) -> Self {
        Self { out_dir }
    }

    pub fn output_fasta_path(&self) -> Utf8PathBuf {
        self.out_dir.join(OUTPUT_FASTA)
    }

    pub fn used_species_path(&self) -> Utf8PathBuf {
        self.out_dir.join(USED_SPECIES)
    }

    /// Writes the corpus to `output.fasta` (fixed name, overwrites any prior
    /// run) and, when `skip_errors` or `skip_warnings` was enabled, the
    /// `used_species.txt` companion listing one species per line in first
    /// emission order. Each artifact is assembled fully in memory and
    /// written atomically.
    pub fn persist(
        &self,
        report: &RunReport,
        options: RunOptions,
    ) -> Result<PersistedPaths, PhyloError> {
        fs::create_dir_all(self.out_dir.as_std_path())
            .map_err(|err| PhyloError::Filesystem(err.to_string()))?;

        let corpus = report.corpus.concat();
        let output_fasta = self.output_fasta_path();
        write_bytes_atomic(&output_fasta, corpus.as_bytes())?;

        let used_species = if options.skip_errors || options.skip_warnings {
            let mut lines = String::new();
            for species in &report.used_species {
                lines.push_str(species);
                lines.push('\n');
            }
            let path = self.used_species_path();
            write_bytes_atomic(&path, lines.as_bytes())?;
            Some(path)
        } else {
            None
        };

        Ok(PersistedPaths {
            output_fasta,
            used_species,
        })
    }
}

/// Human-readable run summary: the found and unfound species lists followed
/// by the aggregate warning text, when any warnings were recorded.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let found = summary
        .found
        .iter()
        .map(|entry| format!("(\"{}\", \"{}\")", entry.species, entry.record_id))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "Found species: [{found}]");
    let _ = writeln!(out);

    let unfound = summary
        .unfound
        .iter()
        .map(|species| format!("\"{species}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "Unfound species: [{unfound}]");

    if !summary.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", summary.warnings.join("\n"));
    }

    out
}

fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), PhyloError> {
    let parent = path
        .parent()
        .ok_or_else(|| PhyloError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| PhyloError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".phylofetch")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| PhyloError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| PhyloError::Filesystem(err.to_string()))?;
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path())
            .map_err(|err| PhyloError::Filesystem(err.to_string()))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| PhyloError::Filesystem(err.to_string()))?;
    Ok(())
}
