//! livebox-cli: call router services and watch events from a terminal.
//!
//! ```text
//! ADMIN_PASSWORD=... livebox-cli call --service NMC --method getWANStatus
//! ADMIN_PASSWORD=... livebox-cli events Devices.Device
//! ```

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use livebox::prelude::*;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "livebox-cli")]
#[command(about = "Talk to a Livebox router through its JSON API")]
struct Cli {
    /// Router address
    #[arg(long, env = "LIVEBOX_ADDRESS", default_value = livebox::DEFAULT_ADDRESS)]
    address: String,

    /// Login name
    #[arg(long, env = "LIVEBOX_USERNAME", default_value = livebox::DEFAULT_USERNAME)]
    username: String,

    /// Login password
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call a service method and print the JSON result
    Call {
        #[arg(long)]
        service: String,

        #[arg(long)]
        method: String,

        /// JSON object of named parameters
        #[arg(long)]
        params: Option<String>,
    },

    /// Print events as JSON lines until Ctrl-C
    Events {
        /// Event sources to watch
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = Client::builder()
        .address(&cli.address)
        .username(&cli.username)
        .password(&cli.password)
        .build()
        .context("failed to create livebox client")?;

    match cli.command {
        Command::Call {
            service,
            method,
            params,
        } => {
            let request = build_request(&service, &method, params.as_deref())?;
            let out: Value = client.call(&request).await.context("request failed")?;
            println!("{out}");
        }
        Command::Events { names } => watch(&client, names).await?,
    }

    Ok(())
}

fn build_request(service: &str, method: &str, params: Option<&str>) -> anyhow::Result<Request> {
    if service.is_empty() {
        bail!("--service is missing");
    }
    if method.is_empty() {
        bail!("--method is missing");
    }

    let request = Request::new(service, method);
    match params {
        Some(raw) if !raw.trim().is_empty() => {
            let parameters: Map<String, Value> =
                serde_json::from_str(raw).context("failed to parse --params")?;
            Ok(request.with_parameters(parameters))
        }
        _ => Ok(request),
    }
}

async fn watch(client: &Client, names: Vec<String>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut events = client.events(cancel.clone(), names).await;

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, stopping");
            }
            cancel.cancel();
        }
    });

    while let Some(item) = events.recv().await {
        match item {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(err) => tracing::warn!(error = %err, "event poll failed"),
        }
    }

    Ok(())
}
