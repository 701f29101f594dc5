//! In-memory status cache.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::warn;

use promoforge_core::ContractId;

use super::StatusCache;

/// In-memory sub-task flags. The default cache for dev/test wiring.
#[derive(Debug, Default)]
pub struct InMemoryStatusCache {
    flags: RwLock<HashMap<String, HashMap<String, bool>>>,
}

impl InMemoryStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// All flags for a contract, for assertions in tests.
    pub fn snapshot(&self, contract_id: &ContractId) -> HashMap<String, bool> {
        self.flags
            .read()
            .ok()
            .and_then(|f| f.get(contract_id.as_str()).cloned())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl StatusCache for InMemoryStatusCache {
    async fn set(&self, contract_id: &ContractId, sub_task: &str, success: bool) {
        match self.flags.write() {
            Ok(mut flags) => {
                flags
                    .entry(contract_id.as_str().to_string())
                    .or_default()
                    .insert(sub_task.to_string(), success);
            }
            Err(_) => warn!(contract = %contract_id, "status cache lock poisoned"),
        }
    }

    async fn get(&self, contract_id: &ContractId, sub_task: &str) -> Option<bool> {
        self.flags
            .read()
            .ok()
            .and_then(|f| f.get(contract_id.as_str())?.get(sub_task).copied())
    }

    async fn clear(&self, contract_id: &ContractId) {
        if let Ok(mut flags) = self.flags.write() {
            flags.remove(contract_id.as_str());
        }
    }
}
