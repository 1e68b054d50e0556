//! Human-readable rendering of service responses and events

use hostguard_api::{
    EventPayload, HealthStatus, HistoryEntry, PolicyView, SessionPhase, StatusView,
};
use hostguard_util::{format_duration, format_local, Domain};
use std::collections::BTreeMap;
use std::fmt::Write;

pub fn status(view: &StatusView) -> String {
    let mut out = String::new();
    match view.phase {
        SessionPhase::Idle => {
            out.push_str("No block session active\n");
            return out;
        }
        SessionPhase::Active => out.push_str("Blocking active\n"),
        SessionPhase::Expiring => out.push_str("Blocking ending\n"),
    }

    let _ = writeln!(out, "  remaining: {}", format_duration(view.remaining));
    let _ = writeln!(out, "  elapsed:   {}", format_duration(view.elapsed));
    if let Some(ends_at) = &view.ends_at {
        let _ = writeln!(out, "  ends:      {}", format_local(ends_at));
    }

    let emergency = if view.emergency_used {
        "used"
    } else if view.emergency_available {
        "available"
    } else {
        "locked"
    };
    let _ = writeln!(out, "  emergency: {}", emergency);

    if !view.allowed_sites.is_empty() {
        let sites: Vec<&str> = view.allowed_sites.iter().map(|d| d.as_str()).collect();
        let _ = writeln!(out, "  allowed:   {}", sites.join(", "));
    }
    out
}

fn blocks(out: &mut String, title: &str, blocks: &BTreeMap<Domain, Vec<String>>) {
    let _ = writeln!(out, "{}:", title);
    if blocks.is_empty() {
        out.push_str("  (none)\n");
    }
    for (domain, paths) in blocks {
        if paths.is_empty() {
            let _ = writeln!(out, "  {}", domain);
        } else {
            let _ = writeln!(out, "  {} [{}]", domain, paths.join(", "));
        }
    }
}

pub fn policy(view: &PolicyView) -> String {
    let mut out = String::new();
    blocks(&mut out, "Default blocks", &view.default_blocks);
    blocks(&mut out, "Custom blocks", &view.custom_sites);

    out.push_str("Allowed sites:\n");
    for site in &view.allowed_sites {
        let _ = writeln!(out, "  {}", site);
    }
    out.push_str("Allowed channels:\n");
    for channel in &view.allowed_channels {
        let _ = writeln!(out, "  {}", channel.as_str());
    }

    let _ = writeln!(
        out,
        "Notifications: {}",
        if view.notifications { "on" } else { "off" }
    );
    if !view.editable {
        out.push_str("(locked while a session is active)\n");
    }
    out
}

pub fn history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No sessions recorded\n".to_string();
    }

    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{}  {:>10}  allowed: {}",
            format_local(&entry.started_at),
            format_duration(entry.duration),
            if entry.sites.is_empty() {
                "-".to_string()
            } else {
                entry.sites.join(", ")
            }
        );
    }
    out
}

pub fn health(health: &HealthStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "live:  {}", health.live);
    let _ = writeln!(out, "ready: {}", health.ready);
    let _ = writeln!(out, "store: {}", if health.store_ok { "ok" } else { "failing" });
    match &health.last_enforcement {
        Some(report) if report.ok => {
            let _ = writeln!(
                out,
                "hosts: ok ({} entries, {})",
                report.entries,
                format_local(&report.at)
            );
        }
        Some(report) => {
            let _ = writeln!(
                out,
                "hosts: failing ({})",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
        None => out.push_str("hosts: not reconciled yet\n"),
    }
    out
}

/// One line per event for `watch`
pub fn event(payload: &EventPayload) -> String {
    match payload {
        EventPayload::StatusTick(view) => match view.phase {
            SessionPhase::Idle => "idle".to_string(),
            _ => format!("remaining {}", format_duration(view.remaining)),
        },
        EventPayload::SessionStarted { ends_at, .. } => {
            format!("session started, ends {}", format_local(ends_at))
        }
        EventPayload::EmergencyUsed { ends_at, .. } => {
            format!("emergency override used, ends {}", format_local(ends_at))
        }
        EventPayload::SessionCompleted { .. } => "session completed".to_string(),
        EventPayload::PolicyChanged(_) => "policy changed".to_string(),
        EventPayload::EnforcementFailed { error } => format!("enforcement failed: {}", error),
        EventPayload::Shutdown => "service shutting down".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn idle_status() {
        assert_eq!(status(&StatusView::idle()), "No block session active\n");
    }

    #[test]
    fn active_status_shows_countdown() {
        let mut view = StatusView::idle();
        view.phase = SessionPhase::Active;
        view.remaining = Duration::from_secs(5400);
        view.emergency_available = true;

        let text = status(&view);
        assert!(text.contains("remaining: 1h 30m 0s"));
        assert!(text.contains("emergency: available"));
    }

    #[test]
    fn policy_lists_paths() {
        let mut defaults = BTreeMap::new();
        defaults.insert(Domain::parse("youtube.com").unwrap(), vec!["/shorts".to_string()]);
        let view = PolicyView {
            default_blocks: defaults,
            custom_sites: BTreeMap::new(),
            allowed_sites: vec![],
            allowed_channels: vec![],
            notifications: true,
            editable: false,
        };

        let text = policy(&view);
        assert!(text.contains("youtube.com [/shorts]"));
        assert!(text.contains("Custom blocks:\n  (none)"));
        assert!(text.contains("locked while a session is active"));
    }

    #[test]
    fn empty_history() {
        assert_eq!(history(&[]), "No sessions recorded\n");
    }
}
