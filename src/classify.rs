use crate::domain::{Outcome, SequenceRecord};

/// Buckets one species' fetch result. An absent record (zero hits, or an
/// error the caller chose to absorb) is `NotFound`; a present record is
/// `Found` with `name_match` computed as case-insensitive substring
/// containment of the species name anywhere in the FASTA text. The loose
/// containment check is intentional — warning suppression downstream depends
/// on it, so it must not be tightened into structured header parsing.
pub fn classify(species: &str, record: Option<SequenceRecord>) -> Outcome {
    match record {
        None => Outcome::NotFound {
            species: species.to_string(),
        },
        Some(record) => {
            let name_match = record
                .fasta_text
                .to_lowercase()
                .contains(&species.to_lowercase());
            Outcome::Found {
                species: species.to_string(),
                record_id: record.record_id,
                fasta_text: record.fasta_text,
                name_match,
            }
        }
    }
}

pub fn mismatch_warning(species: &str) -> String {
    format!("WARNING: Full/Same name for {species} not found in fasta header, check it manually!")
}
