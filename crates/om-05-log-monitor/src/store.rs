//! Monitor state persistence.

use crate::domain::LogStatus;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::StoreError;
use std::collections::HashMap;

/// Per-log monitor state store.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Mark a log active, creating its status if unknown.
    async fn activate(&self, log_url: &str) -> Result<(), StoreError>;

    /// Mark a log inactive; its verified state is retained.
    async fn deactivate(&self, log_url: &str) -> Result<(), StoreError>;

    /// All active logs.
    async fn active_logs(&self) -> Result<Vec<LogStatus>, StoreError>;

    /// Status for one log.
    async fn get(&self, log_url: &str) -> Result<LogStatus, StoreError>;

    /// Persist a status.
    async fn put(&self, status: &LogStatus) -> Result<(), StoreError>;
}

/// In-memory [`MonitorStore`].
#[derive(Default)]
pub struct MemoryMonitorStore {
    logs: RwLock<HashMap<String, LogStatus>>,
}

impl MemoryMonitorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MonitorStore for MemoryMonitorStore {
    async fn activate(&self, log_url: &str) -> Result<(), StoreError> {
        let mut logs = self.logs.write();
        logs.entry(log_url.to_string())
            .or_insert_with(|| LogStatus::new(log_url))
            .active = true;
        Ok(())
    }

    async fn deactivate(&self, log_url: &str) -> Result<(), StoreError> {
        if let Some(status) = self.logs.write().get_mut(log_url) {
            status.active = false;
        }
        Ok(())
    }

    async fn active_logs(&self) -> Result<Vec<LogStatus>, StoreError> {
        Ok(self
            .logs
            .read()
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }

    async fn get(&self, log_url: &str) -> Result<LogStatus, StoreError> {
        self.logs
            .read()
            .get(log_url)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(log_url.to_string()))
    }

    async fn put(&self, status: &LogStatus) -> Result<(), StoreError> {
        self.logs
            .write()
            .insert(status.log_url.clone(), status.clone());
        Ok(())
    }
}
