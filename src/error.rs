use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PhyloError {
    #[error("template error: {0}")]
    Template(String),

    #[error("no species provided")]
    EmptySpeciesList,

    #[error("missing config file phylofetch.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read species list at {0}")]
    SpeciesListRead(PathBuf),

    #[error("Entrez request failed: {0}")]
    EntrezHttp(String),

    #[error("Entrez returned status {status}: {message}")]
    EntrezStatus { status: u16, message: String },

    #[error("failed to parse Entrez response: {0}")]
    EntrezParse(String),

    #[error("error fetching sequence for query {query}: {message}")]
    Fetch { query: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
