//! Metadata source resolution.
//!
//! A connection identifier is a `Key=Value;Key=Value` string in the style of
//! platform connection strings. Only exported metadata snapshots are
//! supported; see [`snapshot::SnapshotSource`].

pub mod snapshot;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::traits::SourceError;
pub use snapshot::SnapshotSource;

/// Parsed connection identifier with case-insensitive keys.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    values: HashMap<String, String>,
}

impl ConnectionInfo {
    /// Parses `Key=Value;...`. A string without any `=` is read as a bare path.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let mut values = HashMap::new();

        if !raw.is_empty() && !raw.contains('=') {
            values.insert("path".to_string(), raw.to_string());
            return Self { values };
        }

        for segment in raw.split(';') {
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                continue;
            }
            values.insert(key, value.trim().to_string());
        }

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn auth_type(&self) -> Option<&str> {
        self.get("AuthType")
    }

    /// Snapshot path from `Path`, `File` or `FileName`.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        ["Path", "File", "FileName"]
            .iter()
            .find_map(|key| self.get(key))
            .map(PathBuf::from)
    }
}

/// Resolves a connection identifier to a metadata source.
///
/// # Errors
///
/// Returns [`SourceError::UnsupportedConnection`] when the identifier names
/// neither a snapshot file nor `AuthType=File`.
pub fn open_source(connection: &str) -> Result<SnapshotSource, SourceError> {
    let info = ConnectionInfo::parse(connection);

    if let Some(auth) = info.auth_type() {
        if !auth.eq_ignore_ascii_case("file") {
            return Err(SourceError::UnsupportedConnection(format!(
                "AuthType '{auth}' requires a live connection; export a metadata snapshot and use AuthType=File;Path=<file>"
            )));
        }
    }

    match info.snapshot_path() {
        Some(path) => Ok(SnapshotSource::new(path)),
        None => Err(SourceError::UnsupportedConnection(
            "connection string does not name a metadata snapshot (Path=...)".to_string(),
        )),
    }
}
