//! Desktop notifications via `notify-send`

use hostguard_api::EventPayload;
use tokio::process::Command;
use tracing::{debug, warn};

const NOTIFY_COMMAND: &str = "notify-send";
const APP_NAME: &str = "hostguard";

/// Summary and body for events worth a desktop notification
pub fn notification_for(payload: &EventPayload) -> Option<(&'static str, String)> {
    match payload {
        EventPayload::SessionCompleted { .. } => Some((
            "Block session complete",
            "Blocked sites are reachable again.".to_string(),
        )),
        EventPayload::EmergencyUsed { ends_at, .. } => Some((
            "Emergency override used",
            format!("Blocking ends at {}.", hostguard_util::format_local(ends_at)),
        )),
        _ => None,
    }
}

/// Fire-and-forget notification. Missing `notify-send` is only logged.
pub fn send(summary: &str, body: &str) {
    let spawned = Command::new(NOTIFY_COMMAND)
        .args(["--app-name", APP_NAME, summary, body])
        .kill_on_drop(false)
        .spawn();

    match spawned {
        Ok(mut child) => {
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) if !status.success() => {
                        debug!(status = ?status, "notify-send exited with failure")
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Failed waiting for notify-send"),
                }
            });
        }
        Err(e) => warn!(error = %e, "Failed to run notify-send"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_notified() {
        let payload = EventPayload::SessionCompleted {
            session_id: hostguard_util::SessionId::new(),
            ended_at: hostguard_util::now(),
        };
        let (summary, _) = notification_for(&payload).unwrap();
        assert_eq!(summary, "Block session complete");
    }

    #[test]
    fn status_ticks_are_not_notified() {
        let payload = EventPayload::StatusTick(hostguard_api::StatusView::idle());
        assert!(notification_for(&payload).is_none());
    }
}
