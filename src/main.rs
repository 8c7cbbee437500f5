//! `live-response` command line.
//!
//! # Commands
//!
//! ```text
//! live-response mirror <port-url>
//!     resolve the port, mirror the remote live response,
//!     print each committed frame as a JSON line until done
//!
//! live-response replay <script.json> [--listen <addr>]
//!     drive a local live response through the script's steps,
//!     print each frame; with --listen, publish over a socket port
//! ```
//!
//! Both commands accept `--config <file>` (TOML) for logging, metrics and
//! transport settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use live_response::config::{load_config, LiveConfig};
use live_response::observability::{logging, metrics};
use live_response::port::{PortResolver, PortUrl, SocketPort, Transports};
use live_response::{
    Body, EngineSettings, LiveResponse, Port, ResponseFrame, ResponseLike,
    ResponseOptions, ToResponseOptions,
};

#[derive(Parser)]
#[command(name = "live-response")]
#[command(about = "Mirror and publish live responses", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a remote live response advertised at a port URL
    Mirror {
        /// `socket://<host:port/path>` or `broadcast://<name>`
        port_url: String,
    },
    /// Replay a JSON script of frames
    Replay {
        script: PathBuf,

        /// Publish the replay to socket clients connecting on this address
        #[arg(short, long)]
        listen: Option<String>,
    },
}

/// One step of a replay script.
#[derive(Debug, Deserialize)]
struct ReplayStep {
    #[serde(default)]
    body: Value,
    status: Option<u16>,
    status_text: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    delay_ms: u64,
    done: Option<bool>,
    #[serde(default)]
    concurrent: bool,
}

impl ReplayStep {
    fn options(&self, last: bool) -> ResponseOptions {
        let mut options = ResponseOptions::new()
            .headers(self.headers.clone())
            .done(self.done.unwrap_or(last))
            .concurrent(self.concurrent);
        if let Some(status) = self.status {
            options = options.status(status);
        }
        if let Some(text) = &self.status_text {
            options = options.status_text(text.clone());
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LiveConfig::default(),
    };
    logging::init_logging(&config.logging);

    if config.metrics.enabled {
        match config.metrics.address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.metrics.address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Mirror { port_url } => mirror(&config, &port_url).await,
        Commands::Replay { script, listen } => replay(&config, &script, listen.as_deref()).await,
    }
}

async fn mirror(config: &LiveConfig, port_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url: PortUrl = port_url.parse()?;
    let transports = Transports::from_config(config);
    let port = transports.resolve(&url).await?;
    tracing::info!(url = %url, "Mirroring live response");

    let live = LiveResponse::with_settings(
        ResponseLike::from_port(port),
        ResponseOptions::new(),
        EngineSettings::from_config(config),
    )?;
    print_frames(&live).await;

    if let Some(e) = live.error() {
        return Err(e.into());
    }
    Ok(())
}

async fn replay(
    config: &LiveConfig,
    script: &Path,
    listen: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let steps: Vec<ReplayStep> = serde_json::from_str(&tokio::fs::read_to_string(script).await?)?;
    let Some((first, rest)) = steps.split_first() else {
        tracing::warn!(script = %script.display(), "Replay script has no steps");
        return Ok(());
    };

    let settings = EngineSettings::from_config(config);
    let live = LiveResponse::with_settings(
        Body::from(first.body.clone()),
        first.options(rest.is_empty()),
        settings,
    )?;

    let shutdown = CancellationToken::new();
    if let Some(addr) = listen {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %listener.local_addr()?, "Waiting for the first mirror");
        let (stream, peer) = listener.accept().await?;
        publish(&live, stream, peer, config, &shutdown).await;
        tokio::spawn(accept_loop(
            listener,
            live.clone(),
            config.clone(),
            shutdown.clone(),
        ));
    }

    let printer = {
        let live = live.clone();
        tokio::spawn(async move { print_frames(&live).await })
    };

    for (index, step) in rest.iter().enumerate() {
        tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
        let last = index + 1 == rest.len();
        let replacement = live.replace_with(Body::from(step.body.clone()), step.options(last))?;
        if !replacement.await? {
            tracing::warn!(step = index + 1, "Replay step was superseded");
        }
    }

    printer.await?;
    shutdown.cancel();
    if let Some(e) = live.error() {
        return Err(e.into());
    }
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    live: LiveResponse,
    config: LiveConfig,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => publish(&live, stream, peer, &config, &shutdown).await,
                Err(e) => tracing::warn!(error = %e, "Accept failed"),
            },
        }
    }
}

async fn publish(
    live: &LiveResponse,
    stream: tokio::net::TcpStream,
    peer: std::net::SocketAddr,
    config: &LiveConfig,
    shutdown: &CancellationToken,
) {
    let port = match SocketPort::accept(stream, None, config.engine.port_capacity).await {
        Ok(port) => port,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "Handshake failed");
            return;
        }
    };
    let port: Arc<dyn Port> = port;
    let response = live.to_response(
        ToResponseOptions::new()
            .port(port.clone())
            .signal(shutdown.child_token()),
    );
    if let Some(message) = response.to_message() {
        if let Err(e) = port.post_message(message) {
            tracing::warn!(peer = %peer, error = %e, "Failed to send current frame");
        }
    }
    tracing::info!(peer = %peer, "Mirror connected");
}

async fn print_frames(live: &LiveResponse) {
    let mut frames = live.to_stream();
    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(frame) => println!("{}", frame_line(&frame)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, disconnecting");
                live.disconnect(true);
                break;
            }
        }
    }
}

fn frame_line(frame: &ResponseFrame) -> Value {
    json!({
        "seq": frame.seq(),
        "ok": frame.ok(),
        "frame": frame.to_payload(),
    })
}
