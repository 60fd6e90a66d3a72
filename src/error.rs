use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),

    #[error("positions failed to load, refusing to overwrite the stored ones")]
    NotLoaded,

    #[error("failed to write positions: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("failed to prepare storage at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("no URL to fetch")]
    EmptyUrl,

    #[error("failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("position #{0} already exists")]
    DuplicateId(i64),

    #[error("position #{0} not found")]
    UnknownId(i64),
}

/// Every rule the dialog input violated, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .problems.join("\n"))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("dialog is already closed")]
    Closed,

    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
