//! Task contract registry.
//!
//! Holds the contracts an automation definition may reference by name. The
//! registry is an explicit value passed to whoever needs it; there is no
//! process-wide table.

use std::collections::BTreeMap;
use std::sync::Arc;

use jobflow_types::contract::TaskContract;
use jobflow_types::error::GraphError;

#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    contracts: BTreeMap<String, Arc<TaskContract>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract. Names are unique within a registry.
    pub fn register(&mut self, contract: TaskContract) -> Result<Arc<TaskContract>, GraphError> {
        if self.contracts.contains_key(&contract.name) {
            return Err(GraphError::DuplicateTask(contract.name));
        }
        let contract = Arc::new(contract);
        self.contracts
            .insert(contract.name.clone(), Arc::clone(&contract));
        Ok(contract)
    }

    pub fn get(&self, name: &str) -> Result<Arc<TaskContract>, GraphError> {
        self.contracts
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownTask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Registered contracts, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskContract>> {
        self.contracts.values()
    }
}
