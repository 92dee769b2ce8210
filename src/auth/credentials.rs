//! Credential storage.

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::clock::unix_secs;

/// Access/refresh token pair with an absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
}

impl TokenSet {
    /// Tokens that expire `lifetime_secs` from now.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        lifetime_secs: u64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: unix_secs().saturating_add(lifetime_secs),
        }
    }

    /// Lifetime left; zero once expired.
    pub fn remaining(&self) -> Duration {
        Duration::from_secs(self.expires_at.saturating_sub(unix_secs()))
    }

    /// True when the remaining lifetime is below `threshold`.
    pub fn expires_within(&self, threshold: Duration) -> bool {
        self.remaining() < threshold
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential file is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where tokens live between calls.
pub trait CredentialStore: Send + Sync {
    fn get_token(&self) -> Option<TokenSet>;

    fn set_token(&self, tokens: TokenSet) -> Result<(), CredentialError>;

    fn clear_token(&self) -> Result<(), CredentialError>;

    /// True when there is no token or it expires within `threshold`.
    fn is_near_expiry(&self, threshold: Duration) -> bool {
        self.get_token()
            .map_or(true, |tokens| tokens.expires_within(threshold))
    }
}

/// Process-local store; tokens are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    current: ArcSwapOption<TokenSet>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenSet) -> Self {
        Self {
            current: ArcSwapOption::from_pointee(tokens),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_token(&self) -> Option<TokenSet> {
        self.current.load_full().map(|tokens| (*tokens).clone())
    }

    fn set_token(&self, tokens: TokenSet) -> Result<(), CredentialError> {
        self.current.store(Some(Arc::new(tokens)));
        Ok(())
    }

    fn clear_token(&self) -> Result<(), CredentialError> {
        self.current.store(None);
        Ok(())
    }
}

/// JSON file store with an in-memory copy for reads.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    current: ArcSwapOption<TokenSet>,
}

impl FileCredentialStore {
    /// Open the store, loading tokens if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = path.as_ref().to_path_buf();
        let current = if path.exists() {
            let reader = BufReader::new(fs::File::open(&path)?);
            let tokens: TokenSet = serde_json::from_reader(reader)?;
            tracing::info!(path = %path.display(), "Loaded stored credentials");
            ArcSwapOption::from_pointee(tokens)
        } else {
            ArcSwapOption::empty()
        };
        Ok(Self { path, current })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get_token(&self) -> Option<TokenSet> {
        self.current.load_full().map(|tokens| (*tokens).clone())
    }

    fn set_token(&self, tokens: TokenSet) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(fs::File::create(&self.path)?);
        serde_json::to_writer(writer, &tokens)?;
        self.current.store(Some(Arc::new(tokens)));
        Ok(())
    }

    fn clear_token(&self) -> Result<(), CredentialError> {
        self.current.store(None);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
