use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Worker pool closed while partitions were still waiting to dispatch.")]
    PoolClosed(#[from] tokio::sync::AcquireError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("The search response carried GraphQL errors: {0}")]
    GraphqlErrors(String),
    #[error("The search response has no \"data\" object.")]
    MissingData,
    #[error("No key under \"data\" decodes as a search connection.")]
    UnknownEnvelope,
}
