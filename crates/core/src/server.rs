//! Handles describing provisioned loopback servers.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// All artifact servers bind here and nowhere else.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// The two kinds of artifact server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    /// Static directory server for the report artifacts.
    StaticSite,
    /// Embedded query application over a dataset file.
    Query,
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKind::StaticSite => f.write_str("static-site"),
            ServerKind::Query => f.write_str("query"),
        }
    }
}

/// A provisioned local server.
///
/// `root` is the served directory for [`ServerKind::StaticSite`] and the
/// dataset file for [`ServerKind::Query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerHandle {
    pub kind: ServerKind,
    pub root: PathBuf,
    pub port: u16,
    pub running: bool,
}

impl ServerHandle {
    pub fn new(kind: ServerKind, root: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            kind,
            root: root.into(),
            port,
            running: true,
        }
    }

    /// Base address, always ending in `/`.
    pub fn address(&self) -> String {
        format!("http://{LOOPBACK_HOST}:{}/", self.port)
    }

    /// Address of a path relative to the served root.
    pub fn address_of(&self, relative: &str) -> String {
        format!("{}{}", self.address(), relative.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_loopback_with_trailing_slash() {
        let handle = ServerHandle::new(ServerKind::StaticSite, "/out", 41234);
        assert_eq!(handle.address(), "http://127.0.0.1:41234/");
    }

    #[test]
    fn address_of_joins_relative_paths() {
        let handle = ServerHandle::new(ServerKind::StaticSite, "/out", 8000);
        assert_eq!(
            handle.address_of("report.html"),
            "http://127.0.0.1:8000/report.html"
        );
        assert_eq!(
            handle.address_of("/nested/a.svg"),
            "http://127.0.0.1:8000/nested/a.svg"
        );
    }
}
