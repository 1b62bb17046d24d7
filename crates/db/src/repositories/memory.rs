use std::collections::HashMap;

use tokio::sync::RwLock;

use hrflow_core::domain::request::{RequestId, RequestRecord};

use super::{RepositoryError, RequestRepository};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    records: RwLock<HashMap<String, RequestRecord>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<RequestRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut listed: Vec<_> = records.values().cloned().collect();
        listed.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(listed)
    }

    async fn insert(&self, record: RequestRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id.0) {
            return Err(RepositoryError::Duplicate(record.id));
        }
        records.insert(record.id.0.clone(), record);
        Ok(())
    }

    async fn replace(
        &self,
        record: RequestRecord,
        expected_revision: u32,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&record.id.0)
            .ok_or_else(|| RepositoryError::NotFound(record.id.clone()))?;
        if stored.revision != expected_revision {
            return Err(RepositoryError::Conflict { request_id: record.id, expected_revision });
        }
        *stored = record;
        Ok(())
    }
}
