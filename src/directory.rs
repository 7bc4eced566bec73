//! Digest recipients and their watchlists.
//!
//! The workflow only needs two lookups, both behind [`UserDirectory`]:
//! who should get a digest, and which symbols a given user watches.
//! [`FileDirectory`] serves both from a YAML file:
//!
//! ```yaml
//! users:
//!   - id: u_1
//!     email: ada@example.com
//!     name: Ada
//!     watchlist: [AAPL, MSFT]
//!   - id: u_2
//!     email: grace@example.com
//!     name: Grace
//! ```
//!
//! The file is re-read on every call so edits apply to the next run.

use crate::error::DirectoryError;
use crate::models::{DigestUser, SymbolSet};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Source of digest recipients and their watchlists.
pub trait UserDirectory {
    /// All users who should receive the daily digest.
    async fn list_digest_users(&self) -> Result<Vec<DigestUser>, DirectoryError>;

    /// Symbols on the user's watchlist; empty when the user has none or is unknown.
    async fn symbols_for_user(&self, email: &str) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    watchlist: Vec<String>,
}

/// [`UserDirectory`] read from a YAML file.
#[derive(Debug, Clone)]
pub struct FileDirectory {
    path: PathBuf,
}

impl FileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<DirectoryFile, DirectoryError> {
        let path = self.path.display().to_string();
        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|source| DirectoryError::Io {
                path: path.clone(),
                source,
            })?;
        serde_yaml::from_str(&text).map_err(|source| DirectoryError::Parse { path, source })
    }
}

impl UserDirectory for FileDirectory {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn list_digest_users(&self) -> Result<Vec<DigestUser>, DirectoryError> {
        let file = self.load().await?;
        let total = file.users.len();
        let users: Vec<DigestUser> = file
            .users
            .into_iter()
            .filter(|u| !u.email.trim().is_empty() && !u.name.trim().is_empty())
            .map(|u| DigestUser {
                id: u.id,
                email: u.email.trim().to_string(),
                name: u.name.trim().to_string(),
            })
            .collect();
        debug!(total, eligible = users.len(), "Loaded digest users");
        Ok(users)
    }

    #[instrument(level = "debug", skip_all, fields(%email))]
    async fn symbols_for_user(&self, email: &str) -> Vec<String> {
        let file = match self.load().await {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "Watchlist lookup failed; treating as empty");
                return Vec::new();
            }
        };

        file.users
            .into_iter()
            .find(|u| u.email.trim().eq_ignore_ascii_case(email))
            .map(|u| SymbolSet::normalize(u.watchlist).iter().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
