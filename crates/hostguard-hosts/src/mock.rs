//! Mock host table for testing

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

use crate::{
    apply_to_content, render_entries, strip_managed, ApplyOutcome, EffectiveBlockSet, HostTable,
    HostTableError, HostTableResult,
};

/// In-memory hosts file that records how it was driven
pub struct MockHostTable {
    content: Mutex<String>,
    redirect_ip: IpAddr,
    apply_calls: AtomicUsize,
    clear_calls: AtomicUsize,

    /// Configure every operation to fail with `PermissionDenied`
    fail: AtomicBool,

    /// While true, apply and clear wait before touching the content
    paused: watch::Sender<bool>,
}

impl MockHostTable {
    pub fn new() -> Self {
        Self::with_content("127.0.0.1 localhost\n")
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Mutex::new(content.into()),
            redirect_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            apply_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            paused: watch::channel(false).0,
        }
    }

    /// Current table content
    pub fn content(&self) -> String {
        self.content.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn apply_count(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Hold every apply and clear until [`MockHostTable::release`]
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn release(&self) {
        self.paused.send_replace(false);
    }

    async fn wait_while_paused(&self) {
        let mut paused = self.paused.subscribe();
        while *paused.borrow_and_update() {
            if paused.changed().await.is_err() {
                break;
            }
        }
    }

    fn edit(&self, entries: usize, f: impl FnOnce(&str) -> String) -> HostTableResult<ApplyOutcome> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HostTableError::PermissionDenied("mock hosts file is read-only".into()));
        }
        let mut content = self
            .content
            .lock()
            .map_err(|_| HostTableError::Internal("mock lock poisoned".into()))?;
        let updated = f(&content);
        let changed = updated != *content;
        *content = updated;
        Ok(ApplyOutcome { entries, changed })
    }
}

impl Default for MockHostTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostTable for MockHostTable {
    async fn apply(&self, set: &EffectiveBlockSet) -> HostTableResult<ApplyOutcome> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_while_paused().await;
        let ip = self.redirect_ip;
        self.edit(render_entries(set, ip).len(), |c| apply_to_content(c, set, ip))
    }

    async fn clear(&self) -> HostTableResult<ApplyOutcome> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_while_paused().await;
        let ip = self.redirect_ip;
        self.edit(0, |c| strip_managed(c, ip))
    }

    fn is_healthy(&self) -> bool {
        !self.fail.load(Ordering::SeqCst)
    }
}
