//! hostguardctl - command-line client for hostguardd
//!
//! Every subcommand is one request over the service socket; `watch` keeps
//! the connection open and prints events as they arrive.

mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hostguard_api::{Command, ResponsePayload, ResponseResult};
use hostguard_ipc::IpcClient;
use hostguard_util::{default_socket_path, parse_duration};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// hostguardctl - control block sessions
#[derive(Parser, Debug)]
#[command(name = "hostguardctl")]
#[command(about = "Control hostguard block sessions", long_about = None)]
struct Args {
    /// Socket path for hostguardd connection (or set HOSTGUARD_SOCKET env var)
    #[arg(short, long, env = "HOSTGUARD_SOCKET")]
    socket: Option<PathBuf>,

    /// Print raw JSON payloads
    #[arg(long, global = true)]
    json: bool,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: CtlCommand,
}

#[derive(Subcommand, Debug)]
enum CtlCommand {
    /// Start a block session, e.g. `start 2h`, `start 7d` or `start 7` (days)
    Start {
        #[arg(value_parser = parse_duration)]
        duration: Duration,
    },

    /// Shorten the running session to at most 30 more minutes (once per session)
    Emergency,

    /// Show the current session
    Status,

    /// Print status ticks and session events until interrupted
    Watch,

    /// Show blocked and allowed sites
    Policy,

    /// Show past sessions
    History {
        /// Only the most recent N sessions
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Manage custom blocked sites
    #[command(subcommand)]
    Site(SiteCommand),

    /// Manage sites exempt from blocking
    #[command(subcommand)]
    Allow(DomainCommand),

    /// Manage approved YouTube channels
    #[command(subcommand)]
    Channel(ChannelCommand),

    /// Turn the session-complete notification on or off
    Notifications {
        #[arg(action = clap::ArgAction::Set, value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },

    /// Show service health
    Health,

    /// Check that the service answers
    Ping,
}

#[derive(Subcommand, Debug)]
enum SiteCommand {
    /// Block a domain, optionally only some paths (`site add youtube.com /shorts`)
    Add { domain: String, paths: Vec<String> },
    /// Stop blocking a custom domain
    Rm { domain: String },
}

#[derive(Subcommand, Debug)]
enum DomainCommand {
    Add { domain: String },
    Rm { domain: String },
}

#[derive(Subcommand, Debug)]
enum ChannelCommand {
    /// Channel URL or identifier
    Add { channel: String },
    Rm { channel: String },
}

impl CtlCommand {
    fn into_request(self) -> Command {
        match self {
            CtlCommand::Start { duration } => Command::StartSession { duration },
            CtlCommand::Emergency => Command::EmergencyShorten,
            CtlCommand::Status | CtlCommand::Watch => Command::GetStatus,
            CtlCommand::Policy => Command::GetPolicy,
            CtlCommand::History { limit } => Command::GetHistory { limit },
            CtlCommand::Site(SiteCommand::Add { domain, paths }) => {
                Command::AddCustomDomain { domain, paths }
            }
            CtlCommand::Site(SiteCommand::Rm { domain }) => Command::RemoveCustomDomain { domain },
            CtlCommand::Allow(DomainCommand::Add { domain }) => Command::AddAllowedDomain { domain },
            CtlCommand::Allow(DomainCommand::Rm { domain }) => {
                Command::RemoveAllowedDomain { domain }
            }
            CtlCommand::Channel(ChannelCommand::Add { channel }) => {
                Command::AddAllowedChannel { channel }
            }
            CtlCommand::Channel(ChannelCommand::Rm { channel }) => {
                Command::RemoveAllowedChannel { channel }
            }
            CtlCommand::Notifications { enabled } => Command::SetNotifications { enabled },
            CtlCommand::Health => Command::GetHealth,
            CtlCommand::Ping => Command::Ping,
        }
    }
}

fn print_payload(payload: &ResponsePayload, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(payload)?);
        return Ok(());
    }

    match payload {
        ResponsePayload::Status(view) => print!("{}", output::status(view)),
        ResponsePayload::Policy(view) | ResponsePayload::PolicyUpdated(view) => {
            print!("{}", output::policy(view))
        }
        ResponsePayload::History(entries) => print!("{}", output::history(entries)),
        ResponsePayload::SessionStarted { ends_at, .. } => {
            println!("Blocking until {}", hostguard_util::format_local(ends_at))
        }
        ResponsePayload::EmergencyApplied { ends_at } => {
            println!("Blocking now ends at {}", hostguard_util::format_local(ends_at))
        }
        ResponsePayload::Health(health) => print!("{}", output::health(health)),
        ResponsePayload::Subscribed { .. } | ResponsePayload::Unsubscribed => {}
        ResponsePayload::Pong => println!("pong"),
    }
    Ok(())
}

async fn watch(client: IpcClient, json: bool) -> Result<()> {
    let mut events = client.subscribe().await.context("Failed to subscribe")?;
    loop {
        let event = events.next().await.context("Lost connection to hostguardd")?;
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!(
                "{}  {}",
                event.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S"),
                output::event(&event.payload)
            );
        }
        if matches!(event.payload, hostguard_api::EventPayload::Shutdown) {
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let socket_path = args.socket.unwrap_or_else(default_socket_path);
    let mut client = IpcClient::connect(&socket_path)
        .await
        .with_context(|| format!("Failed to connect to hostguardd at {:?}", socket_path))?;

    if matches!(args.cmd, CtlCommand::Watch) {
        return watch(client, args.json).await;
    }

    let response = client.send(args.cmd.into_request()).await?;
    match response.result {
        ResponseResult::Ok(payload) => print_payload(&payload, args.json),
        ResponseResult::Err(e) => bail!("{:?}: {}", e.code, e.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_parses_duration() {
        let args = Args::try_parse_from(["hostguardctl", "start", "1d12h"]).unwrap();
        match args.cmd.into_request() {
            Command::StartSession { duration } => {
                assert_eq!(duration, Duration::from_secs(36 * 3600))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn start_bare_number_is_days() {
        let args = Args::try_parse_from(["hostguardctl", "start", "7"]).unwrap();
        match args.cmd.into_request() {
            Command::StartSession { duration } => {
                assert_eq!(duration, Duration::from_secs(7 * 86_400))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn start_rejects_bad_duration() {
        assert!(Args::try_parse_from(["hostguardctl", "start", "soon"]).is_err());
    }

    #[test]
    fn site_add_with_paths() {
        let args =
            Args::try_parse_from(["hostguardctl", "site", "add", "youtube.com", "/shorts"]).unwrap();
        match args.cmd.into_request() {
            Command::AddCustomDomain { domain, paths } => {
                assert_eq!(domain, "youtube.com");
                assert_eq!(paths, vec!["/shorts".to_string()]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn notifications_accept_on_off() {
        let args = Args::try_parse_from(["hostguardctl", "notifications", "off"]).unwrap();
        assert!(matches!(
            args.cmd.into_request(),
            Command::SetNotifications { enabled: false }
        ));
    }
}
