use async_trait::async_trait;
use thiserror::Error;

use hrflow_core::domain::request::{RequestId, RequestRecord};

pub mod memory;
pub mod request;

pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("request `{0}` was not found")]
    NotFound(RequestId),
    #[error("request `{0}` already exists")]
    Duplicate(RequestId),
    #[error("request `{request_id}` changed since revision {expected_revision} was read")]
    Conflict { request_id: RequestId, expected_revision: u32 },
}

/// Async persistence for request records and their chains.
///
/// `replace` is the compare-and-swap used by every decision: it writes
/// `record` only while the stored revision still equals
/// `expected_revision`, otherwise it fails with `Conflict` and writes
/// nothing.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError>;

    async fn list(&self) -> Result<Vec<RequestRecord>, RepositoryError>;

    async fn insert(&self, record: RequestRecord) -> Result<(), RepositoryError>;

    async fn replace(
        &self,
        record: RequestRecord,
        expected_revision: u32,
    ) -> Result<(), RepositoryError>;
}
