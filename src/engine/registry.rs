//! Model registry with atomic readiness.
//!
//! Both compiled model handles live in a single slot behind one lock, so a
//! reader can never observe the age model without the gender model or vice
//! versa. The loader installs once after warm-up; afterwards the registry
//! is read-only for the rest of the process lifetime.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::engine::model::Model;

struct ReadyPair {
    age: Arc<dyn Model>,
    gender: Arc<dyn Model>,
}

/// Holds the two warmed compiled-model handles, or nothing.
pub struct ModelRegistry {
    slot: RwLock<Option<ReadyPair>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Installs both models at once. Only the loader calls this, exactly
    /// once, after both warm-up passes succeed.
    pub fn install(&self, age: Arc<dyn Model>, gender: Arc<dyn Model>) {
        let mut slot = self.slot.write();
        if slot.is_some() {
            info!("Model registry already installed; ignoring reinstall");
            return;
        }
        *slot = Some(ReadyPair { age, gender });
        info!("Model registry ready (age + gender)");
    }

    pub fn is_ready(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Returns both handles, or `None` if the registry is not ready.
    pub fn models(&self) -> Option<(Arc<dyn Model>, Arc<dyn Model>)> {
        self.slot
            .read()
            .as_ref()
            .map(|pair| (Arc::clone(&pair.age), Arc::clone(&pair.gender)))
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::ConvNet;

    #[test]
    fn test_registry_starts_empty() {
        let registry = ModelRegistry::new();
        assert!(!registry.is_ready());
        assert!(registry.models().is_none());
    }

    #[test]
    fn test_install_is_atomic() {
        let registry = ModelRegistry::new();
        registry.install(
            Arc::new(ConvNet::age().unwrap()),
            Arc::new(ConvNet::gender().unwrap()),
        );
        assert!(registry.is_ready());
        let (age, gender) = registry.models().unwrap();
        assert_eq!(age.name(), "age");
        assert_eq!(gender.name(), "gender");
    }

    #[test]
    fn test_reinstall_is_ignored() {
        let registry = ModelRegistry::new();
        registry.install(
            Arc::new(ConvNet::age().unwrap()),
            Arc::new(ConvNet::gender().unwrap()),
        );
        registry.install(
            Arc::new(ConvNet::gender().unwrap()),
            Arc::new(ConvNet::age().unwrap()),
        );
        let (age, _) = registry.models().unwrap();
        assert_eq!(age.name(), "age");
    }
}
