use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::backend::error::ApiError;

/// Read-only view of wherever the session token is persisted.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load_token(&self) -> Result<Option<String>, ApiError>;
}

/// Token held in memory, e.g. taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenStore {
    token: Option<String>,
}

impl StaticTokenStore {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenStore for StaticTokenStore {
    async fn load_token(&self) -> Result<Option<String>, ApiError> {
        Ok(self.token.clone())
    }
}

/// Token persisted as a plain text file. A missing or blank file means no
/// token.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load_token(&self) -> Result<Option<String>, ApiError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token.to_string()))
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ApiError::TokenStore(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }
}
