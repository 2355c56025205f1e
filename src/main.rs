//! lakeform - synthesize analytics-pipeline resource plans

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lakeform::config::PipelineConfig;
use lakeform::name::NameAllocator;
use lakeform::pipeline::PipelineCompiler;
use lakeform::plan::{self, PlanFormat};
use lakeform::schema::SchemaInferencer;

/// lakeform - compose and resolve an analytics pipeline resource graph
#[derive(Parser, Debug)]
#[command(name = "lakeform", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize the resolved resource plan and print it
    ///
    /// Loads the pipeline configuration, infers the dataset schema from the
    /// sample data directory, composes the full resource graph, and prints
    /// the resolved plan. Nothing is provisioned: the plan is input for a
    /// materialization backend.
    Synth(SynthArgs),
}

/// Synth mode arguments
#[derive(Parser, Debug)]
struct SynthArgs {
    /// Path to the pipeline configuration YAML file
    #[arg(short = 'f', long = "config", env = "LAKEFORM_CONFIG")]
    config_file: PathBuf,

    /// Override the sample-data directory from the config file
    #[arg(long)]
    sample_dir: Option<PathBuf>,

    /// Output format for the plan
    #[arg(long, value_enum, default_value = "yaml")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

impl From<OutputFormat> for PlanFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => Self::Yaml,
            OutputFormat::Json => Self::Json,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Synth(args) => run_synth(args),
    }
}

/// Run plan synthesis: config -> schema -> graph -> plan on stdout
fn run_synth(args: SynthArgs) -> anyhow::Result<()> {
    let mut config = PipelineConfig::from_file(&args.config_file)
        .map_err(|e| anyhow::anyhow!("failed to load config {:?}: {e}", args.config_file))?;
    if let Some(dir) = args.sample_dir {
        config.sample_data_dir = dir;
    }

    let schema = SchemaInferencer::new(&config.sample_data_dir)
        .infer()
        .map_err(|e| anyhow::anyhow!("schema inference failed: {e}"))?;

    let mut allocator = NameAllocator::new();
    let graph = PipelineCompiler::new(&config, &schema)
        .compile(&mut allocator)
        .map_err(|e| anyhow::anyhow!("graph composition failed: {e}"))?;

    let rendered = plan::render(&graph, args.format.into())?;
    println!("{rendered}");
    Ok(())
}
