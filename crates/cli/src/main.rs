mod logging;
mod params;
mod runner;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use runner::RunOptions;

/// Embedding record processor.
#[derive(Parser)]
#[command(
    name = "llm-embed",
    version,
    about = "Write LLM embeddings of a record field into another field"
)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the processor specification as JSON
    Spec {
        /// Print the JSON Schema of the configuration parameters instead
        #[arg(long)]
        schema: bool,
    },

    /// Process a batch of NDJSON records
    Process {
        /// TOML file with processor parameters
        #[arg(long)]
        config: Option<PathBuf>,
        /// Parameter override as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = params::parse_override)]
        params: Vec<(String, String)>,
        /// NDJSON file with one record per line (default: stdin)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Deadline for the whole batch, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Spec { schema } => cmd_spec(schema),
        Commands::Process {
            config,
            params: overrides,
            input,
            timeout_ms,
        } => {
            let params = match params::collect_params(config.as_deref(), &overrides) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("{}", e);
                    process::exit(1);
                }
            };
            let options = RunOptions {
                params,
                input: input.as_deref(),
                timeout: timeout_ms.map(Duration::from_millis),
            };
            cmd_process(options);
        }
    }
}

fn cmd_spec(schema: bool) {
    let spec = llm_embed_processor::specification();
    let value = if schema {
        spec.config_schema()
    } else {
        match serde_json::to_value(&spec) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("internal error: failed to serialize specification: {}", e);
                process::exit(1);
            }
        }
    };
    match serde_json::to_string_pretty(&value) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("internal error: failed to serialize specification: {}", e);
            process::exit(1);
        }
    }
}

fn cmd_process(options: RunOptions<'_>) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    };

    let mut stdout = std::io::stdout().lock();
    match rt.block_on(runner::run(options, &mut stdout)) {
        Ok(summary) => {
            tracing::info!(
                records = summary.records,
                errors = summary.errors,
                "run finished"
            );
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
