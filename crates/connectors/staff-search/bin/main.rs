use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use staff_search::query::{self, QueryRequest, SearchRequest};
use staff_search::{routes, state};
use staff_search_configuration::environment::ProcessEnvironment;
use staff_search_configuration::{
    configuration::generate_latest_schema, make_runtime_configuration, parse_configuration,
    write_parsed_configuration, ParsedConfiguration,
};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// How log lines are written to stderr.
    #[arg(long, env = "STAFF_SEARCH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "STAFF_SEARCH_CONFIGURATION", value_name = "DIR", default_value = ".")]
        configuration: PathBuf,
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Answer a single question and print the response envelope.
    Ask {
        #[arg(long, env = "STAFF_SEARCH_CONFIGURATION", value_name = "DIR", default_value = ".")]
        configuration: PathBuf,
        #[arg(long)]
        include_sensitive_info: bool,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        question: String,
    },
    /// Write an initial configuration and its JSON schema into a directory.
    Initialize {
        #[arg(long, env = "STAFF_SEARCH_CONFIGURATION", value_name = "DIR", default_value = ".")]
        configuration: PathBuf,
    },
    /// Print the JSON schema of the configuration file.
    PrintSchema,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "exiting");
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve {
            configuration,
            port,
        } => {
            let state = load_state(configuration).await?;
            let router = routes::create_router(Arc::new(state));
            let address = SocketAddr::from(([0, 0, 0, 0], port));

            tracing::info!(%address, "starting server");
            axum::Server::bind(&address)
                .serve(router.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            Ok(())
        }
        Command::Ask {
            configuration,
            include_sensitive_info,
            limit,
            question,
        } => {
            let received = Instant::now();
            let request = QueryRequest::try_from(SearchRequest {
                question,
                include_sensitive_info,
                limit,
            })?;
            let state = load_state(configuration).await?;
            let envelope = query::query(&state, &request, received).await;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(())
        }
        Command::Initialize { configuration } => {
            write_parsed_configuration(ParsedConfiguration::initial(), &configuration).await?;
            tracing::info!(directory = %configuration.display(), "wrote initial configuration");
            Ok(())
        }
        Command::PrintSchema => {
            println!(
                "{}",
                serde_json::to_string_pretty(&generate_latest_schema())?
            );
            Ok(())
        }
    }
}

/// Parse the configuration directory and build the state. Any failure here is fatal.
async fn load_state(configuration_dir: PathBuf) -> anyhow::Result<state::State> {
    let parsed = parse_configuration(&configuration_dir).await?;
    let configuration = make_runtime_configuration(parsed, ProcessEnvironment)?;
    tracing::info!(
        tables = configuration.schema.tables.0.len(),
        model = %configuration.language_model.model,
        "loaded configuration"
    );
    Ok(state::create_state(configuration).await?)
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "unable to listen for the shutdown signal");
    }
    tracing::info!("shutting down");
}
