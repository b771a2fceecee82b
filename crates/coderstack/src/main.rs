mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use coderstack_cloud::{DEFAULT_OUT_DIR, TemplateFormat};
use colored::Colorize;
use commands::BuildOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coderstack")]
#[command(about = "Declare Coder on AWS and render it as a CloudFormation template", long_about = None)]
struct Cli {
    /// Configuration file (default: coder.kdl discovery)
    #[arg(short, long, global = true, env = "CODERSTACK_CONFIG")]
    config: Option<PathBuf>,

    /// Target account ID
    #[arg(long, global = true, env = "CDK_DEFAULT_ACCOUNT")]
    account: Option<String>,

    /// Target region (default: ap-northeast-1)
    #[arg(long, global = true, env = "CDK_DEFAULT_REGION")]
    region: Option<String>,

    /// Override the stack name from the configuration
    #[arg(long, global = true)]
    stack_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the template and assembly manifest
    Synth {
        /// Output directory
        #[arg(short, long, default_value = DEFAULT_OUT_DIR)]
        out: PathBuf,
        /// Template format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// List the resources the template declares
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build the stack and check its invariants
    Validate,
    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

impl From<Format> for TemplateFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => TemplateFormat::Json,
            Format::Yaml => TemplateFormat::Yaml,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let options = BuildOptions {
        config: cli.config,
        account: cli.account,
        region: cli.region,
        stack_name: cli.stack_name,
    };

    let result = match cli.command {
        Commands::Synth { out, format } => {
            commands::synth::handle(&options, &out, format.into()).await
        }
        Commands::Plan { json } => commands::plan::handle(&options, json),
        Commands::Validate => commands::validate::handle(&options),
        Commands::Version => {
            println!("coderstack {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}
