use std::collections::BTreeMap;
use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use phylofetch::app::{App, ProgressEvent, ProgressSink, RunOptions, RunRequest};
use phylofetch::entrez::SequenceDatabase;
use phylofetch::error::PhyloError;
use phylofetch::output::JsonOutput;
use phylofetch::report::ReportWriter;

/// Deterministic stand-in for the Entrez service: one fixed hit per species,
/// matched by name containment in the query expression.
#[derive(Default)]
struct FakeEntrez {
    hits: BTreeMap<String, (String, String)>,
    search_calls: Mutex<usize>,
}

impl FakeEntrez {
    fn with_hit(mut self, species: &str, record_id: &str, fasta: &str) -> Self {
        self.hits
            .insert(species.to_string(), (record_id.to_string(), fasta.to_string()));
        self
    }

    fn search_calls(&self) -> usize {
        *self.search_calls.lock().unwrap()
    }
}

impl SequenceDatabase for FakeEntrez {
    fn search(&self, query: &str) -> Result<Vec<String>, PhyloError> {
        *self.search_calls.lock().unwrap() += 1;
        for (species, (record_id, _)) in &self.hits {
            if query.contains(species.as_str()) {
                return Ok(vec![record_id.clone()]);
            }
        }
        Ok(Vec::new())
    }

    fn fetch(&self, id: &str) -> Result<String, PhyloError> {
        self.hits
            .values()
            .find(|(record_id, _)| record_id == id)
            .map(|(_, fasta)| fasta.clone())
            .ok_or_else(|| PhyloError::EntrezHttp(format!("unknown id {id}")))
    }
}

struct FailingEntrez;

impl SequenceDatabase for FailingEntrez {
    fn search(&self, _query: &str) -> Result<Vec<String>, PhyloError> {
        Err(PhyloError::EntrezStatus {
            status: 500,
            message: "server error".to_string(),
        })
    }

    fn fetch(&self, _id: &str) -> Result<String, PhyloError> {
        Err(PhyloError::EntrezHttp("unreachable".to_string()))
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn messages(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event.message);
    }
}

fn request(species: &[&str], gene: &str) -> RunRequest {
    RunRequest {
        species: species.iter().map(|s| s.to_string()).collect(),
        gene_name: gene.to_string(),
        min_length: 0,
        max_length: 1_000_000,
        template: None,
        template_values: Vec::new(),
    }
}

fn out_dir(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

fn header_count(fasta: &str) -> usize {
    fasta.lines().filter(|line| line.starts_with('>')).count()
}

const HOMO_FASTA: &str = ">224589801 Homo sapiens BRCA1, mRNA\nATGGATTTATCTGCTGTTCG\n";

#[test]
fn every_species_lands_in_exactly_one_list() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit("Homo sapiens", "224589801", HOMO_FASTA);
    let app = App::new(db, ReportWriter::new(out_dir(&temp)));

    let species = ["Homo sapiens", "Mus musculus", "Canis lupus"];
    let options = RunOptions {
        skip_errors: true,
        ..RunOptions::default()
    };
    let summary = app
        .run(&request(&species, "BRCA1"), options, &JsonOutput)
        .unwrap();

    assert_eq!(summary.found.len() + summary.unfound.len(), species.len());
    for name in species {
        let in_found = summary.found.iter().any(|entry| entry.species == name);
        let in_unfound = summary.unfound.iter().any(|s| s == name);
        assert!(in_found ^ in_unfound, "{name} must appear in exactly one list");
    }
}

#[test]
fn placeholder_blocks_keep_input_order() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit("Homo sapiens", "224589801", HOMO_FASTA);
    let app = App::new(db, ReportWriter::new(out_dir(&temp)));

    let summary = app
        .run(
            &request(&["Homo sapiens", "Mus musculus"], "BRCA1"),
            RunOptions::default(),
            &JsonOutput,
        )
        .unwrap();

    assert_eq!(summary.found.len(), 1);
    assert_eq!(summary.found[0].species, "Homo sapiens");
    assert_eq!(summary.found[0].record_id, "224589801");
    assert_eq!(summary.unfound, vec!["Mus musculus"]);

    let corpus = fs::read_to_string(temp.path().join("output.fasta")).unwrap();
    assert_eq!(header_count(&corpus), 2);
    let expected = format!("{HOMO_FASTA}>Mus musculus BRCA1 not found.\n\n");
    assert_eq!(corpus, expected);
}

#[test]
fn skipping_errors_drops_placeholder_blocks() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit("Homo sapiens", "224589801", HOMO_FASTA);
    let app = App::new(db, ReportWriter::new(out_dir(&temp)));

    let options = RunOptions {
        skip_errors: true,
        ..RunOptions::default()
    };
    let summary = app
        .run(
            &request(&["Homo sapiens", "Mus musculus"], "BRCA1"),
            options,
            &JsonOutput,
        )
        .unwrap();

    let corpus = fs::read_to_string(temp.path().join("output.fasta")).unwrap();
    assert_eq!(header_count(&corpus), summary.found.len());
    assert!(!corpus.contains("not found."));
}

#[test]
fn rerun_yields_byte_identical_corpus() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit("Homo sapiens", "224589801", HOMO_FASTA);
    let app = App::new(db, ReportWriter::new(out_dir(&temp)));
    let request = request(&["Homo sapiens", "Mus musculus"], "BRCA1");

    app.run(&request, RunOptions::default(), &JsonOutput).unwrap();
    let first = fs::read(temp.path().join("output.fasta")).unwrap();
    app.run(&request, RunOptions::default(), &JsonOutput).unwrap();
    let second = fs::read(temp.path().join("output.fasta")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn mismatch_warning_is_emitted_and_accumulated() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit(
        "Canis lupus",
        "5501",
        ">5501 Canis familiaris COI\nATGC\n",
    );
    let app = App::new(db, ReportWriter::new(out_dir(&temp)));
    let sink = RecordingSink::default();

    let summary = app
        .run(&request(&["Canis lupus"], "COI"), RunOptions::default(), &sink)
        .unwrap();

    let warning =
        "WARNING: Full/Same name for Canis lupus not found in fasta header, check it manually!";
    assert_eq!(summary.warnings, vec![warning]);
    assert!(sink.messages().iter().any(|m| m == warning));
}

#[test]
fn skip_warnings_suppresses_both_channels() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit(
        "Canis lupus",
        "5501",
        ">5501 Canis familiaris COI\nATGC\n",
    );
    let app = App::new(db, ReportWriter::new(out_dir(&temp)));
    let sink = RecordingSink::default();

    let options = RunOptions {
        skip_warnings: true,
        ..RunOptions::default()
    };
    let summary = app
        .run(&request(&["Canis lupus"], "COI"), options, &sink)
        .unwrap();

    assert!(summary.warnings.is_empty());
    assert!(!sink.messages().iter().any(|m| m.starts_with("WARNING")));
}

#[test]
fn verbose_reports_species_gene_id_and_length() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit("Homo sapiens", "224589801", HOMO_FASTA);
    let app = App::new(db, ReportWriter::new(out_dir(&temp)));
    let sink = RecordingSink::default();

    let options = RunOptions {
        verbose: true,
        ..RunOptions::default()
    };
    app.run(&request(&["Homo sapiens"], "BRCA1"), options, &sink)
        .unwrap();

    let expected = format!(
        "For Homo sapiens BRCA1, found 224589801 with length {}.",
        HOMO_FASTA.len()
    );
    assert!(sink.messages().iter().any(|m| m == &expected));
}

#[test]
fn template_error_aborts_before_any_search() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit("Homo sapiens", "224589801", HOMO_FASTA);
    let app = App::new(&db, ReportWriter::new(out_dir(&temp)));

    let mut request = request(&["Homo sapiens"], "BRCA1");
    request.template = Some("{organism}[Organism]".to_string());

    let err = app
        .run(&request, RunOptions::default(), &JsonOutput)
        .unwrap_err();
    assert_matches!(err, PhyloError::Template(_));
    assert_eq!(db.search_calls(), 0);
    assert!(!temp.path().join("output.fasta").exists());
}

#[test]
fn fetch_error_aborts_run_without_output() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(FailingEntrez, ReportWriter::new(out_dir(&temp)));

    let err = app
        .run(
            &request(&["Homo sapiens"], "BRCA1"),
            RunOptions::default(),
            &JsonOutput,
        )
        .unwrap_err();

    assert_matches!(err, PhyloError::Fetch { .. });
    assert!(!temp.path().join("output.fasta").exists());
}

#[test]
fn absorbed_fetch_errors_count_as_unfound() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(FailingEntrez, ReportWriter::new(out_dir(&temp)));

    let options = RunOptions {
        skip_errors: true,
        ..RunOptions::default()
    };
    let summary = app
        .run(&request(&["Homo sapiens"], "BRCA1"), options, &JsonOutput)
        .unwrap();

    assert_eq!(summary.unfound, vec!["Homo sapiens"]);
    assert!(summary.found.is_empty());
    let corpus = fs::read_to_string(temp.path().join("output.fasta")).unwrap();
    assert_eq!(header_count(&corpus), 0);
}

#[test]
fn used_species_file_is_conditional_on_skip_flags() {
    let temp = tempfile::tempdir().unwrap();
    let db = FakeEntrez::default().with_hit("Homo sapiens", "224589801", HOMO_FASTA);
    let app = App::new(db, ReportWriter::new(out_dir(&temp)));
    let request = request(&["Homo sapiens", "Mus musculus"], "BRCA1");

    let summary = app
        .run(&request, RunOptions::default(), &JsonOutput)
        .unwrap();
    assert!(summary.used_species.is_none());
    assert!(!temp.path().join("used_species.txt").exists());

    let options = RunOptions {
        skip_warnings: true,
        ..RunOptions::default()
    };
    let summary = app.run(&request, options, &JsonOutput).unwrap();
    assert!(summary.used_species.is_some());
    let listing = fs::read_to_string(temp.path().join("used_species.txt")).unwrap();
    assert_eq!(listing, "Homo sapiens\n");
}
