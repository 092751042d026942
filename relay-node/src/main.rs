// Word relay: display, processing and client roles over framed TCP.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use relay_node::config::{self, Config};
use relay_node::supervisor::supervise;
use relay_node::{
    Client, ClientConfig, ConsoleRenderer, DisplayNode, ProcessingConfig, ProcessingNode,
    ShutdownToken,
};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Pause between starting roles in `all` mode so each downstream listener is up first.
const STAGGER: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(name = "relay", version)]
#[command(about = "Client -> processing -> display word relay")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Run the display node
    Display { port: Option<u16> },
    /// Run the processing node, forwarding to a display node
    Processing {
        port: Option<u16>,
        display_host: Option<String>,
        display_port: Option<u16>,
    },
    /// Run an interactive client
    Client { host: String, port: Option<u16> },
    /// Run display, processing and client on loopback
    All {
        /// Accepted for compatibility; the client does not listen.
        client_port: u16,
        processing_port: u16,
        display_port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut cfg = config::load();
    let shutdown = ShutdownToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            warn!(error = %e, "signal handler unavailable");
            return;
        }
        info!("shutdown requested");
        signal_token.trigger();
    });

    match args.role {
        Role::Display { port } => {
            if let Some(p) = port {
                cfg.display_port = p;
            }
            run_display(cfg, shutdown).await;
        }
        Role::Processing {
            port,
            display_host,
            display_port,
        } => {
            if let Some(p) = port {
                cfg.processing_port = p;
            }
            if let Some(h) = display_host {
                cfg.display_host = h;
            }
            if let Some(p) = display_port {
                cfg.display_port = p;
            }
            run_processing(cfg, shutdown).await;
        }
        Role::Client { host, port } => {
            let port = port.unwrap_or(cfg.processing_port);
            run_client(&cfg, host, port, &shutdown).await?;
        }
        Role::All {
            client_port: _,
            processing_port,
            display_port,
        } => {
            cfg.processing_port = processing_port;
            cfg.display_port = display_port;
            cfg.display_host = Ipv4Addr::LOCALHOST.to_string();

            let display = tokio::spawn(run_display(cfg.clone(), shutdown.clone()));
            tokio::time::sleep(STAGGER).await;
            let processing = tokio::spawn(run_processing(cfg.clone(), shutdown.clone()));
            tokio::time::sleep(STAGGER).await;

            run_client(&cfg, Ipv4Addr::LOCALHOST.to_string(), processing_port, &shutdown).await?;
            shutdown.trigger();
            let _ = tokio::join!(display, processing);
        }
    }
    Ok(())
}

fn listen_on(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

async fn run_display(cfg: Config, shutdown: ShutdownToken) {
    let listen = listen_on(cfg.display_port);
    supervise("display", cfg.restart_delay(), shutdown, |token| async move {
        DisplayNode::bind(listen, ConsoleRenderer, token).await?.run().await
    })
    .await;
}

async fn run_processing(cfg: Config, shutdown: ShutdownToken) {
    let restart_delay = cfg.restart_delay();
    let node_cfg = ProcessingConfig::new(
        listen_on(cfg.processing_port),
        cfg.display_host,
        cfg.display_port,
    );
    supervise("processing", restart_delay, shutdown, |token| {
        let node_cfg = node_cfg.clone();
        async move { ProcessingNode::bind(node_cfg, token).await?.run().await }
    })
    .await;
}

async fn run_client(
    cfg: &Config,
    host: String,
    port: u16,
    shutdown: &ShutdownToken,
) -> Result<()> {
    let mut client_cfg = ClientConfig::new(host, port);
    client_cfg.ack_timeout = cfg.ack_timeout();
    let mut client = Client::new(client_cfg);
    if let Err(e) = client.connect().await {
        // send() reconnects on demand; an unreachable node is not fatal here.
        warn!(error = %e, "processing node not reachable yet");
    }
    println!("Enter messages (type 'exit' to quit):");
    client
        .run_interactive(BufReader::new(tokio::io::stdin()), shutdown)
        .await?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
