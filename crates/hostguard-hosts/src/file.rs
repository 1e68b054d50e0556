//! Hosts-file backed host table
//!
//! Writes go to a temporary file in the same directory which then replaces
//! the original, keeping its mode and owner. When the rename is refused
//! (a bind-mounted `/etc/hosts` in a container, for example) the file is
//! rewritten in place instead.

use async_trait::async_trait;
use std::io::Write;
use std::net::IpAddr;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{
    apply_to_content, render_entries, strip_managed, ApplyOutcome, EffectiveBlockSet, HostTable,
    HostTableError, HostTableResult,
};

/// Host table backed by a hosts file on disk
pub struct FileHostTable {
    path: PathBuf,
    redirect_ip: IpAddr,
}

impl FileHostTable {
    pub fn new(path: impl Into<PathBuf>, redirect_ip: IpAddr) -> Self {
        Self {
            path: path.into(),
            redirect_ip,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn rewrite<F>(&self, entries: usize, edit: F) -> HostTableResult<ApplyOutcome>
    where
        F: FnOnce(&str) -> String + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || rewrite_blocking(&path, entries, edit))
            .await
            .map_err(|e| HostTableError::Internal(format!("hosts write task failed: {}", e)))?
    }
}

fn rewrite_blocking<F>(path: &Path, entries: usize, edit: F) -> HostTableResult<ApplyOutcome>
where
    F: FnOnce(&str) -> String,
{
    let current = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let updated = edit(&current);
    if updated == current {
        debug!(path = %path.display(), "Hosts file already up to date");
        return Ok(ApplyOutcome {
            entries,
            changed: false,
        });
    }

    if let Err(e) = replace_atomically(path, &updated) {
        warn!(
            path = %path.display(),
            error = %e,
            "Atomic replace failed, rewriting in place"
        );
        std::fs::write(path, updated.as_bytes())?;
    }

    info!(path = %path.display(), entries, "Hosts file updated");
    Ok(ApplyOutcome {
        entries,
        changed: true,
    })
}

fn replace_atomically(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
        if let Err(e) = std::os::unix::fs::fchown(tmp.as_file(), Some(meta.uid()), Some(meta.gid()))
        {
            debug!(error = %e, "Could not copy hosts file owner");
        }
    }

    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl HostTable for FileHostTable {
    async fn apply(&self, set: &EffectiveBlockSet) -> HostTableResult<ApplyOutcome> {
        let ip = self.redirect_ip;
        let entries = render_entries(set, ip).len();
        let set = set.clone();
        self.rewrite(entries, move |content| apply_to_content(content, &set, ip))
            .await
    }

    async fn clear(&self) -> HostTableResult<ApplyOutcome> {
        let ip = self.redirect_ip;
        self.rewrite(0, move |content| strip_managed(content, ip)).await
    }

    fn is_healthy(&self) -> bool {
        self.path.parent().is_some_and(Path::is_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed_section_count;
    use hostguard_util::Domain;
    use std::os::unix::fs::PermissionsExt;

    const BASE: &str = "127.0.0.1 localhost\n::1 localhost\n";

    fn blocks() -> EffectiveBlockSet {
        [(Domain::parse("youtube.com").unwrap(), vec!["/shorts".to_string()])]
            .into_iter()
            .collect()
    }

    fn table(dir: &Path) -> FileHostTable {
        let path = dir.join("hosts");
        std::fs::write(&path, BASE).unwrap();
        FileHostTable::new(path, "127.0.0.1".parse().unwrap())
    }

    #[tokio::test]
    async fn apply_and_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path());

        let outcome = table.apply(&blocks()).await.unwrap();
        assert_eq!(outcome, ApplyOutcome { entries: 3, changed: true });

        let content = std::fs::read_to_string(table.path()).unwrap();
        assert!(content.contains("127.0.0.1 www.youtube.com\n"));
        assert_eq!(managed_section_count(&content), 1);

        table.clear().await.unwrap();
        assert_eq!(std::fs::read_to_string(table.path()).unwrap(), BASE);
    }

    #[tokio::test]
    async fn external_edit_between_apply_and_clear_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path());
        table.apply(&blocks()).await.unwrap();

        let mut content = std::fs::read_to_string(table.path()).unwrap();
        content.push_str("10.0.0.9 box.lan\n");
        std::fs::write(table.path(), &content).unwrap();

        table.apply(&blocks()).await.unwrap();
        let reapplied = std::fs::read_to_string(table.path()).unwrap();
        assert_eq!(managed_section_count(&reapplied), 1);
        assert!(reapplied.starts_with(&format!("{BASE}10.0.0.9 box.lan\n")));

        table.clear().await.unwrap();
        assert_eq!(
            std::fs::read_to_string(table.path()).unwrap(),
            format!("{BASE}10.0.0.9 box.lan\n")
        );
    }

    #[tokio::test]
    async fn unchanged_content_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path());

        assert!(table.apply(&blocks()).await.unwrap().changed);
        assert!(!table.apply(&blocks()).await.unwrap().changed);
        assert!(table.clear().await.unwrap().changed);
        assert!(!table.clear().await.unwrap().changed);
    }

    #[tokio::test]
    async fn permissions_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path());
        std::fs::set_permissions(table.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        table.apply(&blocks()).await.unwrap();

        let mode = std::fs::metadata(table.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let table = FileHostTable::new(dir.path().join("hosts"), "127.0.0.1".parse().unwrap());

        table.apply(&blocks()).await.unwrap();
        let content = std::fs::read_to_string(table.path()).unwrap();
        assert_eq!(managed_section_count(&content), 1);
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path());
        table.apply(&blocks()).await.unwrap();
        table.clear().await.unwrap();

        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }
}
