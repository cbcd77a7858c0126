use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("invalid collection id: {0}")]
    InvalidCollection(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid handheld database key: {0}")]
    InvalidKey(String),

    #[error("unknown rank filter: {0} (expected ALL, PLATINUM, GOLD, SILVER, BRONZE or FAULTY)")]
    InvalidRank(String),

    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("item not found in repository {repository}: {name}")]
    ItemNotFound { repository: String, name: String },

    #[error("missing config file handheld-catalog.json")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("catalog request failed: {0}")]
    Http(String),

    #[error("catalog returned status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("failed to decode {0}")]
    Decode(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("extraction failed: {0}")]
    Extract(String),

    #[error("download cancelled: {0}")]
    Cancelled(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Decode,
    Io,
    Cancelled,
    Invalid,
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Http(_) | CatalogError::HttpStatus { .. } => ErrorKind::Network,
            CatalogError::Decode(_) | CatalogError::ConfigParse(_) => ErrorKind::Decode,
            CatalogError::Filesystem(_)
            | CatalogError::Extract(_)
            | CatalogError::ConfigRead(_) => ErrorKind::Io,
            CatalogError::Cancelled(_) => ErrorKind::Cancelled,
            CatalogError::InvalidCollection(_)
            | CatalogError::InvalidFileName(_)
            | CatalogError::InvalidKey(_)
            | CatalogError::InvalidRank(_)
            | CatalogError::UnknownRepository(_)
            | CatalogError::ItemNotFound { .. }
            | CatalogError::MissingConfig => ErrorKind::Invalid,
        }
    }
}
