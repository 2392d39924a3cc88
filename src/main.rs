//! tree-net CLI - runs the parent-side listener of a tree node.
//!
//! See the `tree_net` library for the connection handling itself.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tree_net::net::{ChannelEventBus, LoggingHandler, ParentListener};
use tree_net::{NodeConfig, NodeContext};

#[derive(Parser)]
#[command(name = "tree-net")]
#[command(version)]
#[command(about = "Parent-side connection manager for a tree overlay node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept parent and API connections until interrupted
    Listen {
        #[command(flatten)]
        node: NodeArgs,
        /// Write logs to this file instead of stderr
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Print the effective configuration as JSON
    ShowConfig {
        #[command(flatten)]
        node: NodeArgs,
    },
}

#[derive(clap::Args)]
struct NodeArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Node name sent during the handshake
    #[arg(long)]
    name: Option<String>,
    /// Host or IP to bind
    #[arg(long)]
    ip: Option<String>,
    /// Port to bind (0 = default 8888)
    #[arg(long)]
    port: Option<u16>,
}

impl NodeArgs {
    /// Load file and environment configuration, then apply flags on top.
    fn resolve(self) -> Result<NodeConfig> {
        let mut config = NodeConfig::load(self.config.as_deref())?;
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(ip) = self.ip {
            config.tree_ip = ip;
        }
        if let Some(port) = self.port {
            config.tree_port = port;
        }
        Ok(config)
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    if let Some(path) = log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create log file at {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

/// Run the listener until an accept failure or Ctrl-C.
async fn run_listener(config: NodeConfig) -> Result<()> {
    let (bus, mut events) = ChannelEventBus::new();
    let ctx = Arc::new(NodeContext::new(
        config.name.clone(),
        Arc::new(bus),
        Arc::new(LoggingHandler),
    ));

    // Lifecycle subscriber: surface role changes in the log
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log::info!("[Events] {} {}", event.kind, event.peer_name());
        }
    });

    let listener = ParentListener::start(&config, ctx).await?;
    log::info!(
        "tree-net v{} serving {} on {}",
        env!("CARGO_PKG_VERSION"),
        config.name,
        listener.local_addr()
    );

    tokio::select! {
        failure = listener.join() => {
            if let Some(err) = failure {
                return Err(err).context("Listener stopped");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to wait for Ctrl-C")?;
            log::info!("Shutting down...");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Listen { node, log_file } => {
            init_logging(log_file.as_ref())?;
            let config = node.resolve()?;
            run_listener(config).await?;
        }
        Commands::ShowConfig { node } => {
            let config = node.resolve()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
