//! Environment-driven API configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use procureflow_approvals::AuthorizationMatrix;

pub const BIND_ADDR_VAR: &str = "PROCUREFLOW_BIND_ADDR";
pub const MATRIX_PATH_VAR: &str = "APPROVAL_MATRIX_PATH";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid PROCUREFLOW_BIND_ADDR '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("failed to read approval matrix {}: {source}", path.display())]
    MatrixRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid approval matrix {}: {reason}", path.display())]
    MatrixInvalid { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub matrix_path: Option<PathBuf>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (blank values count as unset).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let raw_addr = get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: raw_addr.clone(),
                source,
            })?;

        Ok(Self {
            bind_addr,
            matrix_path: get(MATRIX_PATH_VAR).map(PathBuf::from),
        })
    }

    /// The configured matrix, or the built-in default when no file is set.
    pub fn load_matrix(&self) -> Result<AuthorizationMatrix, ConfigError> {
        match &self.matrix_path {
            Some(path) => read_matrix(path),
            None => Ok(AuthorizationMatrix::default()),
        }
    }
}

fn read_matrix(path: &Path) -> Result<AuthorizationMatrix, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::MatrixRead {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: String| ConfigError::MatrixInvalid {
        path: path.to_path_buf(),
        reason,
    };

    let matrix: AuthorizationMatrix = serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;
    matrix.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(matrix)
}
