//! Command-line front end for the resilient client.
//!
//! Sends one request through the full dispatch pipeline (cache, auth,
//! retry, envelope parsing, error classification) and prints the `data`
//! payload as JSON. Useful for checking a backend and a config file.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use resilient_client::config::{load_config, ClientConfig};
use resilient_client::observability::{logging, metrics};
use resilient_client::resilience::RetryPolicy;
use resilient_client::{ApiError, Dispatcher, ReqwestTransport, RequestDescriptor, Shutdown};

#[derive(Parser)]
#[command(name = "resilient-client")]
#[command(about = "Send API requests through the resilient client pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `api.base_url`.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a GET request
    Get {
        path: String,
        /// Query parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
        /// Skip the bearer token
        #[arg(long)]
        no_auth: bool,
        /// Retry transport failures using the configured policy
        #[arg(long)]
        retry: bool,
    },
    /// Send a POST request with a JSON body
    Post {
        path: String,
        /// Request body as JSON
        #[arg(long, default_value = "{}")]
        body: String,
        #[arg(long)]
        no_auth: bool,
    },
    /// Upload a file as multipart/form-data
    Upload {
        path: String,
        file: PathBuf,
        /// Form field carrying the file
        #[arg(long, default_value = "file")]
        field: String,
        /// Extra text fields as key=value
        #[arg(long = "form", value_parser = parse_key_value)]
        form: Vec<(String, String)>,
    },
    /// Validate a configuration file and print the effective settings
    CheckConfig,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn parse_json(label: &str, raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("{label} is not valid JSON: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::default(),
    };
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }

    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if let Commands::CheckConfig = cli.command {
        return match toml::to_string_pretty(&config) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run(config, cli.command).await {
        Ok(data) => {
            match serde_json::to_string_pretty(&data) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{data}"),
            }
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ClientConfig, command: Commands) -> Result<Value, String> {
    let transport = ReqwestTransport::new(config.api.request_timeout()).map_err(|e| e.to_string())?;
    let retry_policy = RetryPolicy::from(&config.retry);

    let dispatcher = Dispatcher::builder(config, Arc::new(transport))
        .build()
        .map_err(|e| e.to_string())?;

    let shutdown = Shutdown::new();
    let maintenance = dispatcher.start_maintenance(&shutdown);

    let result = match command {
        Commands::Get {
            path,
            params,
            no_auth,
            retry,
        } => {
            let mut descriptor = RequestDescriptor::get(path);
            if let Some(params) = params {
                descriptor = descriptor.with_params(parse_json("--params", &params)?);
            }
            if no_auth {
                descriptor = descriptor.skip_auth();
            }
            if retry {
                descriptor = descriptor.with_retry(retry_policy);
            }
            dispatcher.dispatch(descriptor).await
        }
        Commands::Post {
            path,
            body,
            no_auth,
        } => {
            let mut descriptor = RequestDescriptor::post(path, parse_json("--body", &body)?);
            if no_auth {
                descriptor = descriptor.skip_auth();
            }
            dispatcher.dispatch(descriptor).await
        }
        Commands::Upload {
            path,
            file,
            field,
            form,
        } => dispatcher.upload_file(file, path, field, form).await,
        Commands::CheckConfig => Ok(Value::Null),
    };

    shutdown.trigger();
    for task in maintenance {
        if tokio::time::timeout(Duration::from_secs(1), task).await.is_err() {
            tracing::warn!("Background task did not stop in time");
        }
    }

    result.map_err(|err: ApiError| format!("{} ({})", err.user_message, err.message))
}
