use thiserror::Error;

#[derive(Error, Debug)]
pub enum PainelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No organization selected; run `painel session set --org <ID>` first")]
    NoOrganization,

    #[error("Not authenticated; run `painel session set` first")]
    NotAuthenticated,

    #[error("Organization {0} is not available to this assessor")]
    UnknownOrganization(i64),

    #[error("Invalid month: {0} (expected 1-12)")]
    InvalidMonth(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PainelError>;
