//! Desired-state reconciliation for the static site server.

use std::path::{Path, PathBuf};

use temoa_core::ServerHandle;

use crate::error::ServerError;
use crate::static_site::StaticSite;

/// Owned optional [`StaticSite`], driven towards a desired root.
#[derive(Default)]
pub struct ServerSlot {
    current: Option<StaticSite>,
}

impl ServerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ServerHandle> {
        self.current.as_ref().map(StaticSite::handle)
    }

    /// Make the slot serve `desired`, or nothing for `None`.
    ///
    /// An unchanged root keeps the running site and its port. A changed root
    /// stops the old site, waiting for its port to be released, before the
    /// new one is launched.
    pub async fn reconcile(
        &mut self,
        desired: Option<&Path>,
    ) -> Result<Option<&ServerHandle>, ServerError> {
        let desired = desired.map(normalize_root);
        let unchanged = match (&self.current, &desired) {
            (Some(site), Some(root)) => site.root() == root.as_path(),
            (None, None) => true,
            _ => false,
        };

        if !unchanged {
            if let Some(site) = self.current.take() {
                tracing::debug!(root = %site.root().display(), "Replacing static site");
                site.stop().await;
            }
            if let Some(root) = desired {
                self.current = Some(StaticSite::launch(&root).await?);
            }
        }

        Ok(self.current())
    }

    /// Stop whatever is running.
    pub async fn clear(&mut self) {
        if let Some(site) = self.current.take() {
            site.stop().await;
        }
    }
}

/// Compare roots by their canonical form so `out/run` and `./out/run` are
/// the same root.
fn normalize_root(root: &Path) -> PathBuf {
    std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_root_keeps_the_port() {
        let dir = tempfile::tempdir().unwrap();
        let mut slot = ServerSlot::new();

        let first = slot.reconcile(Some(dir.path())).await.unwrap().unwrap().port;
        let again = slot.reconcile(Some(dir.path())).await.unwrap().unwrap().port;
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn changed_root_replaces_the_site() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let mut slot = ServerSlot::new();

        let first = slot.reconcile(Some(a.path())).await.unwrap().unwrap().port;
        let second = slot.reconcile(Some(b.path())).await.unwrap().unwrap().clone();
        assert_ne!(first, second.port);
        assert_eq!(second.root, normalize_root(b.path()));
    }

    #[tokio::test]
    async fn none_stops_the_site() {
        let dir = tempfile::tempdir().unwrap();
        let mut slot = ServerSlot::new();
        slot.reconcile(Some(dir.path())).await.unwrap();

        assert!(slot.reconcile(None).await.unwrap().is_none());
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn failed_launch_leaves_the_slot_empty() {
        let good = tempfile::tempdir().unwrap();
        let mut slot = ServerSlot::new();
        slot.reconcile(Some(good.path())).await.unwrap();

        let missing = good.path().join("missing");
        assert!(slot.reconcile(Some(&missing)).await.is_err());
        assert!(slot.current().is_none());
    }
}
