//! Device model table

use meshgate_core::{DeviceModel, ModelLookup};
use std::collections::HashMap;

/// Model lookup backed by a map from reported model identifier to metadata
#[derive(Debug, Clone, Default)]
pub struct StaticModelTable {
    models: HashMap<String, DeviceModel>,
}

impl StaticModelTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under the identifier devices report
    pub fn insert(&mut self, model_id: impl Into<String>, model: DeviceModel) {
        self.models.insert(model_id.into(), model);
    }

    /// Register a model, builder style
    pub fn with_model(mut self, model_id: impl Into<String>, model: DeviceModel) -> Self {
        self.insert(model_id, model);
        self
    }

    /// Number of known models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelLookup for StaticModelTable {
    fn find_model(&self, model_id: &str) -> Option<DeviceModel> {
        self.models.get(model_id).cloned()
    }
}
