mod ops;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rpc::prelude::*;
use rpc_core::args::{ClientArgs, CommonArgs, ServerArgs};
use rpc_core::{BroadcastListener, RpcClient, RpcServer};
use serde_json::Map;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rpc-node")]
#[command(about = "Serve, call and listen to RPC operations")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a server with the demo operations until Ctrl-C
    Serve {
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Call an operation and print its reply
    Call {
        #[command(flatten)]
        client: ClientArgs,
        /// Operation name
        name: String,
        /// Positional arguments, as JSON (bare words are taken as strings)
        args: Vec<String>,
        /// Keyword arguments, as a JSON object
        #[arg(long)]
        kwargs: Option<String>,
    },
    /// Print broadcasts until Ctrl-C
    Listen {
        #[command(flatten)]
        client: ClientArgs,
        /// Topic prefixes (everything if none)
        topics: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = cli.common.load_config()?;
    info!("Starting {}", cli.common.get_service_name());

    match cli.command {
        Commands::Serve { server } => {
            server.apply(&mut config);
            serve(config.server).await
        }
        Commands::Call {
            client,
            name,
            args,
            kwargs,
        } => {
            client.apply(&mut config);
            call(config.client, &name, parse_args(&args, kwargs.as_deref())?)
        }
        Commands::Listen { client, topics } => {
            client.apply(&mut config);
            listen(config.client, &topics).await
        }
    }
}

async fn serve(config: rpc_core::config::ServerConfig) -> Result<()> {
    let reply_address = config.reply_address()?;
    let publish_address = config.publish_address()?;

    let server = Arc::new(RpcServer::with_config(config));
    ops::register_all(&server);
    server.start(&reply_address, &publish_address)?;

    let ticker = {
        let server = server.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            let mut seq: u64 = 0;
            loop {
                interval.tick().await;
                if !server.is_active() {
                    break;
                }
                seq += 1;
                if let Err(e) = server.publish("tick", &json!({ "seq": seq })) {
                    warn!("Failed to publish tick: {}", e);
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    server.stop();
    ticker.abort();

    tokio::task::spawn_blocking(move || server.join()).await??;
    Ok(())
}

fn call(config: rpc_core::config::ClientConfig, name: &str, args: Args) -> Result<()> {
    let request_address = config.request_address()?;
    let subscribe_address = config.subscribe_address()?;

    let client = RpcClient::with_config(config, |_: &str, _: Value| {});
    client.start(&request_address, &subscribe_address)?;

    match client.call_raw(name, args)? {
        CallReply::Success(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        CallReply::Failure(diagnostic) => Err(anyhow!("{}", diagnostic)),
    }
}

struct Printer;

impl BroadcastListener for Printer {
    fn on_message(&self, topic: &str, payload: Value) {
        println!("{} {}", topic, payload);
    }

    fn on_disconnected(&self) {
        warn!("Server heartbeat lost");
    }
}

async fn listen(config: rpc_core::config::ClientConfig, topics: &[String]) -> Result<()> {
    let request_address = config.request_address()?;
    let subscribe_address = config.subscribe_address()?;

    let client = RpcClient::with_config(config, Printer);
    if topics.is_empty() {
        client.subscribe_topic("");
    }
    for topic in topics {
        client.subscribe_topic(topic);
    }
    client.start(&request_address, &subscribe_address)?;

    tokio::signal::ctrl_c().await?;
    client.stop();
    tokio::task::spawn_blocking(move || client.join()).await??;
    Ok(())
}

/// Builds call arguments from command-line words.
fn parse_args(words: &[String], kwargs: Option<&str>) -> Result<Args> {
    let positional = words
        .iter()
        .map(|word| serde_json::from_str(word).unwrap_or_else(|_| Value::String(word.clone())))
        .collect();
    let named = match kwargs {
        Some(text) => serde_json::from_str::<Map<String, Value>>(text)
            .context("--kwargs must be a JSON object")?,
        None => Map::new(),
    };
    Ok(Args::from_parts(positional, named))
}
