//! hostguardd - The hostguard background service
//!
//! This is the main entry point for the hostguardd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Block engine and scheduler
//! - Hosts file reconciliation
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use hostguard_api::{EnforcementReport, Event, EventPayload};
use hostguard_config::load_config_or_default;
use hostguard_core::{BlockEngine, CoreEvent, SessionScheduler};
use hostguard_hosts::FileHostTable;
use hostguard_ipc::{IpcServer, ServerMessage};
use hostguard_store::{JsonStore, Store};
use hostguard_util::default_config_path;
use hostguardd::{event_payload, notify, report_event, CommandHandler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// hostguardd - Block sessions enforced through the hosts file
#[derive(Parser, Debug)]
#[command(name = "hostguardd")]
#[command(about = "Block sessions enforced through the hosts file", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/hostguard/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set HOSTGUARD_SOCKET env var)
    #[arg(short, long, env = "HOSTGUARD_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set HOSTGUARD_DATA_DIR env var)
    #[arg(short, long, env = "HOSTGUARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Hosts file override
    #[arg(long)]
    hosts_file: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    handler: CommandHandler,
    scheduler: Arc<SessionScheduler>,
    ipc: Arc<IpcServer>,
    tick_interval: Duration,
    display_interval: Duration,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let config = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            default_blocks = config.default_blocks.len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| config.daemon.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.daemon.data_dir.clone());

        let hosts_path = args
            .hosts_file
            .clone()
            .unwrap_or_else(|| config.enforcement.hosts_path.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let store: Arc<dyn Store> = Arc::new(
            JsonStore::open(&data_dir)
                .with_context(|| format!("Failed to open store in {:?}", data_dir))?,
        );

        info!(data_dir = %data_dir.display(), "Store initialized");

        let engine = BlockEngine::load(store, config.default_blocks.clone(), config.session.clone())
            .context("Failed to load persisted state")?;

        let hosts = Arc::new(FileHostTable::new(&hosts_path, config.enforcement.redirect_ip));
        info!(hosts_path = %hosts_path.display(), "Host table initialized");

        let scheduler = Arc::new(SessionScheduler::new(engine, hosts));

        // Bring the hosts file in line with persisted state before serving
        let outcome = scheduler.resume().await;
        if !outcome.report.ok {
            warn!(error = ?outcome.report.error, "Initial enforcement failed");
        }

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        Ok(Self {
            handler: CommandHandler::new(scheduler.clone()),
            scheduler,
            ipc: Arc::new(ipc),
            tick_interval: config.enforcement.tick_interval,
            display_interval: config.enforcement.display_interval,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc = self.ipc.clone();
        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        // Hosts file writes run off the select loop; results come back here
        let (report_tx, mut reports) = mpsc::unbounded_channel();
        let reconciler = self.scheduler.spawn_reconciler(report_tx);

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        let mut enforcement_timer = tokio::time::interval(self.tick_interval);
        let mut display_timer = tokio::time::interval(self.display_interval);
        // The first enforcement tick fires immediately; resume already covered it
        enforcement_timer.tick().await;

        info!(
            tick_interval = ?self.tick_interval,
            display_interval = ?self.display_interval,
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // Expiry, plus a reconcile request for the worker
                _ = enforcement_timer.tick() => {
                    let events = self.scheduler.expire().await;
                    self.publish_core_events(events).await;
                }

                Some(report) = reports.recv() => {
                    self.publish_report(report).await;
                }

                // Countdown for subscribed clients
                _ = display_timer.tick() => {
                    if ipc.subscriber_count().await > 0 {
                        let status = self.scheduler.engine().await.status(hostguard_util::now());
                        ipc.broadcast_event(Event::new(EventPayload::StatusTick(status)));
                    }
                }

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        // State is left as is; the next start resumes from the store
        info!("Shutting down hostguardd");
        reconciler.abort();
        ipc.broadcast_event(Event::new(EventPayload::Shutdown));
        ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn publish_core_events(&self, events: Vec<CoreEvent>) {
        if events.is_empty() {
            return;
        }
        let payloads: Vec<EventPayload> = {
            let engine = self.scheduler.engine().await;
            events
                .iter()
                .map(|event| event_payload(event, &engine))
                .collect()
        };

        for payload in payloads {
            self.publish(Event::new(payload)).await;
        }
    }

    async fn publish_report(&self, report: EnforcementReport) {
        if let Some(event) = report_event(&report) {
            self.publish(event).await;
        }
    }

    async fn publish(&self, event: Event) {
        if let Some((summary, body)) = notify::notification_for(&event.payload)
            && self.scheduler.engine().await.notifications_enabled()
        {
            notify::send(summary, &body);
        }
        self.ipc.broadcast_event(event);
    }

    async fn handle_ipc_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                debug!(client_id = %client_id, request_id = request.request_id, "Request received");

                let handled = self
                    .handler
                    .handle(&client_id, request.request_id, request.command)
                    .await;

                if let Err(e) = self.ipc.send_response(&client_id, handled.response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }

                for event in handled.events {
                    self.publish(event).await;
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(client_id = %client_id, uid = ?info.uid, "Client connected");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hostguardd starting");

    let service = Service::new(&args).await?;
    service.run().await
}
