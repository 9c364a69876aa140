use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Error in {path} line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Collection file not found: {0}")]
    CollectionNotFound(PathBuf),
    #[error("Store backend failure: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid query parameter '{name}': {value}")]
    InvalidQueryParameter { name: &'static str, value: String },
    #[error("Unit not found: {0}")]
    UnitNotFound(String),
    #[error("Upstream store error: {0}")]
    UpstreamStore(#[from] StoreError),
    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl AnalyticsError {
    pub fn invalid(name: &'static str, value: impl Into<String>) -> Self {
        AnalyticsError::InvalidQueryParameter {
            name,
            value: value.into(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type Result<T> = std::result::Result<T, AnalyticsError>;
