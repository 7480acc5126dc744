use std::sync::Arc;

use crate::config::WorkspaceDescriptor;

/// Configuration provider trait, letting callers read descriptor-level
/// values (the `props` bag, or specific keys) without owning the
/// descriptor itself.
pub trait ConfigProvider: Send + Sync {
    /// Get the `props` entry for a given key (spec.md §6: `props:
    /// map<string,any>`).
    fn get_prop(&self, key: &str) -> Option<&serde_json::Value>;

    /// Get a specific descriptor value by key ("name", "base_dir", …).
    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value>;
}

/// `ConfigProvider` implementation backed by a loaded `WorkspaceDescriptor`.
pub struct DescriptorConfigProvider(Arc<WorkspaceDescriptor>);

impl DescriptorConfigProvider {
    pub fn new(descriptor: WorkspaceDescriptor) -> Self {
        Self(Arc::new(descriptor))
    }

    pub fn from_arc(descriptor: Arc<WorkspaceDescriptor>) -> Self {
        Self(descriptor)
    }

    pub fn inner(&self) -> &WorkspaceDescriptor {
        &self.0
    }
}

impl ConfigProvider for DescriptorConfigProvider {
    fn get_prop(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.props.get(key)
    }

    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "name" => Some(serde_json::Value::String(self.0.name.clone())),
            "base_dir" => Some(serde_json::Value::String(self.0.base_dir.clone())),
            "cache_dir" => Some(serde_json::Value::String(self.0.cache_dir.clone())),
            "registries" => serde_json::to_value(&self.0.registries).ok(),
            "logging" => self
                .0
                .logging
                .as_ref()
                .and_then(|v| serde_json::to_value(v).ok()),
            _ => None,
        }
    }
}
