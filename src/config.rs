use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::{RunOptions, RunRequest};
use crate::error::PhyloError;

pub const DEFAULT_CONFIG: &str = "phylofetch.json";

/// On-disk run description. Species can be listed inline, pulled from a
/// one-name-per-line text file, or both (inline entries first).
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub species_file: Option<String>,
    pub gene: String,
    pub email: String,
    #[serde(default)]
    pub min_length: u64,
    #[serde(default = "default_max_length")]
    pub max_length: u64,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub template_values: Vec<String>,
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub skip_errors: bool,
    #[serde(default)]
    pub skip_warnings: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub request: RunRequest,
    pub email: String,
    pub extra_params: Vec<(String, String)>,
    pub options: RunOptions,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PhyloError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG),
        };

        if path.is_none() && !config_path.exists() {
            return Err(PhyloError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PhyloError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PhyloError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PhyloError> {
        let mut species = config.species;
        if let Some(file) = &config.species_file {
            species.extend(read_species_list(Path::new(file))?);
        }
        if species.is_empty() {
            return Err(PhyloError::EmptySpeciesList);
        }

        Ok(ResolvedConfig {
            request: RunRequest {
                species,
                gene_name: config.gene,
                min_length: config.min_length,
                max_length: config.max_length,
                template: config.template,
                template_values: config.template_values,
            },
            email: config.email,
            extra_params: config.extra_params.into_iter().collect(),
            options: RunOptions {
                verbose: config.verbose,
                skip_errors: config.skip_errors,
                skip_warnings: config.skip_warnings,
            },
        })
    }
}

pub fn default_max_length() -> u64 {
    1_000_000
}

/// Reads a species list file: one name per line, trimmed, blank lines
/// skipped.
pub fn read_species_list(path: &Path) -> Result<Vec<String>, PhyloError> {
    let content = fs::read_to_string(path)
        .map_err(|_| PhyloError::SpeciesListRead(path.to_path_buf()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
