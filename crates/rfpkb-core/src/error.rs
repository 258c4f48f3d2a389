use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Missing tenant id")]
    MissingTenant,

    #[error("Knowledge base for tenant '{0}' has no attributes and no chunks")]
    EmptyKnowledgeBase(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Stale write: {0} changed since it was read")]
    StaleWrite(String),

    #[error("Embedding failure: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("Lexical ranking failure: {0}")]
    Lexical(#[source] anyhow::Error),

    #[error("Answer generation failed: {0}")]
    Generation(#[source] anyhow::Error),
}

impl Error {
    pub fn persistence<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Persistence(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
