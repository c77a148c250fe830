//! Keyed flow-controller factory.
//!
//! One controller exists per name (the phase's full name, so the parameter
//! suffix participates in the key). Lookups take the read lock; only the
//! first request for a name pays for the write lock and construction.

use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::controller::FlowController;

/// Name-keyed pool of [`FlowController`]s.
#[derive(Default)]
pub struct FlowControllerFactory {
    controllers: RwLock<FxHashMap<String, Arc<FlowController>>>,
}

impl FlowControllerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The controller for `name`, creating it with the given window on first
    /// use. Later calls return the existing controller regardless of the
    /// window parameters they pass.
    pub fn controller(&self, name: &str, window_ms: i64, max_count: u64) -> Arc<FlowController> {
        {
            let map = self
                .controllers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(controller) = map.get(name) {
                return controller.clone();
            }
        }
        let mut map = self
            .controllers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(controller) = map.get(name) {
            return controller.clone();
        }
        tracing::debug!(name = %name, window_ms, max_count, "creating flow controller");
        let controller = Arc::new(FlowController::new(name, window_ms, max_count));
        map.insert(name.to_string(), controller.clone());
        controller
    }

    pub fn len(&self) -> usize {
        self.controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide factory the scheduler acquires controllers from.
pub fn global_flow_factory() -> &'static FlowControllerFactory {
    static FACTORY: OnceLock<FlowControllerFactory> = OnceLock::new();
    FACTORY.get_or_init(FlowControllerFactory::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_returns_same_controller() {
        let factory = FlowControllerFactory::new();
        let a = factory.controller("alpha", 100, 5);
        let b = factory.controller("alpha", 999, 999);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn distinct_names_get_distinct_controllers() {
        let factory = FlowControllerFactory::new();
        let a = factory.controller("alpha", 100, 5);
        let b = factory.controller("beta", 100, 5);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.len(), 2);
    }
}
