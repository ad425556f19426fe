use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use phylofetch::app::{App, RunOptions, RunRequest};
use phylofetch::config::{ConfigLoader, ResolvedConfig, read_species_list};
use phylofetch::entrez::EntrezHttpClient;
use phylofetch::error::PhyloError;
use phylofetch::output::{JsonOutput, OutputMode, StderrProgress};
use phylofetch::report::{ReportWriter, render_summary};

#[derive(Parser)]
#[command(name = "phylofetch")]
#[command(about = "Fetch one representative nucleotide sequence per species for a target gene")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the retrieval pipeline and write the merged FASTA corpus")]
    Fetch(FetchArgs),
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long, help = "JSON run description; without any direct flags, ./phylofetch.json is tried")]
    config: Option<String>,

    #[arg(long)]
    gene: Option<String>,

    #[arg(long, help = "Contact email forwarded to the Entrez service")]
    email: Option<String>,

    #[arg(long = "species")]
    species: Vec<String>,

    #[arg(long, help = "Species list file, one name per line")]
    species_file: Option<Utf8PathBuf>,

    #[arg(long, default_value_t = 0)]
    min_length: u64,

    #[arg(long, default_value_t = 1_000_000)]
    max_length: u64,

    #[arg(long)]
    template: Option<String>,

    #[arg(long = "template-value")]
    template_values: Vec<String>,

    #[arg(long = "param", value_parser = parse_key_value, help = "Extra search parameter, key=value")]
    params: Vec<(String, String)>,

    #[arg(long, default_value = ".")]
    out_dir: Utf8PathBuf,

    #[arg(long)]
    verbose: bool,

    #[arg(long)]
    skip_errors: bool,

    #[arg(long)]
    skip_warnings: bool,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PhyloError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PhyloError) -> u8 {
    match error {
        PhyloError::Template(_)
        | PhyloError::EmptySpeciesList
        | PhyloError::MissingConfig
        | PhyloError::ConfigRead(_)
        | PhyloError::ConfigParse(_)
        | PhyloError::SpeciesListRead(_) => 2,
        PhyloError::EntrezHttp(_)
        | PhyloError::EntrezStatus { .. }
        | PhyloError::EntrezParse(_)
        | PhyloError::Fetch { .. } => 3,
        PhyloError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch(args) => run_fetch(args),
    }
}

fn run_fetch(args: FetchArgs) -> miette::Result<()> {
    let mut resolved = resolve_run(&args)?;
    resolved.options.verbose |= args.verbose;
    resolved.options.skip_errors |= args.skip_errors;
    resolved.options.skip_warnings |= args.skip_warnings;

    let entrez =
        EntrezHttpClient::new(&resolved.email, resolved.extra_params.clone()).into_diagnostic()?;
    let writer = ReportWriter::new(args.out_dir.clone());
    let app = App::new(entrez, writer);

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    match mode {
        OutputMode::Json => {
            let summary = app
                .run(&resolved.request, resolved.options, &JsonOutput)
                .into_diagnostic()?;
            JsonOutput::print_run(&summary).into_diagnostic()?;
        }
        OutputMode::Text => {
            let summary = app
                .run(&resolved.request, resolved.options, &StderrProgress)
                .into_diagnostic()?;
            print!("{}", render_summary(&summary));
        }
    }
    Ok(())
}

fn resolve_run(args: &FetchArgs) -> miette::Result<ResolvedConfig> {
    if let Some(path) = &args.config {
        return ConfigLoader::resolve(Some(path)).into_diagnostic();
    }

    let direct =
        args.gene.is_some() || !args.species.is_empty() || args.species_file.is_some();
    if !direct {
        return ConfigLoader::resolve(None).into_diagnostic();
    }

    let gene_name = args
        .gene
        .clone()
        .ok_or_else(|| miette::Report::msg("--gene is required (or use --config)"))?;
    let email = args
        .email
        .clone()
        .ok_or_else(|| miette::Report::msg("--email is required (or use --config)"))?;

    let mut species = args.species.clone();
    if let Some(file) = &args.species_file {
        species.extend(read_species_list(file.as_std_path()).into_diagnostic()?);
    }
    if species.is_empty() {
        return Err(PhyloError::EmptySpeciesList).into_diagnostic();
    }

    Ok(ResolvedConfig {
        request: RunRequest {
            species,
            gene_name,
            min_length: args.min_length,
            max_length: args.max_length,
            template: args.template.clone(),
            template_values: args.template_values.clone(),
        },
        email,
        extra_params: args.params.clone(),
        options: RunOptions::default(),
    })
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
