//! Phase factory registry.
//!
//! The scheduler instantiates phase bodies by class name through a registry
//! of constructor closures. Registration normally happens once at process
//! startup; the graph validator asks [`has_registered`] for every node's full
//! name before a graph is accepted.
//!
//! The synthetic `StartPhase`/`EndPhase` endpoints are instantiated through
//! the same factory, so an application must register classes under those two
//! names as well (a no-op phase that calls `notify_done(0)` is the usual
//! choice).
//!
//! [`has_registered`]: PhaseRegistry::has_registered

use rustc_hash::FxHashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::phase::Phase;

type PhaseCtor = Box<dyn Fn() -> Box<dyn Phase> + Send + Sync>;

/// Name-keyed phase constructor table.
#[derive(Default)]
pub struct PhaseRegistry {
    ctors: RwLock<FxHashMap<String, PhaseCtor>>,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `class_name`, replacing any previous one.
    pub fn register<F>(&self, class_name: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<dyn Phase> + Send + Sync + 'static,
    {
        let class_name = class_name.into();
        tracing::debug!(class_name = %class_name, "registering phase class");
        self.ctors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class_name, Box::new(ctor));
    }

    /// Registers `P` under `class_name` using its `Default` constructor.
    pub fn register_default<P>(&self, class_name: impl Into<String>)
    where
        P: Phase + Default + 'static,
    {
        self.register(class_name, || Box::new(P::default()));
    }

    /// Whether `full_name` resolves to a registered class.
    ///
    /// Any `(...)` parameter suffix is stripped before the lookup.
    pub fn has_registered(&self, full_name: &str) -> bool {
        let class_name = full_name
            .split_once('(')
            .map_or(full_name, |(head, _)| head);
        self.ctors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(class_name)
    }

    /// Instantiates a new phase body for `class_name`.
    pub fn create(&self, class_name: &str) -> Option<Box<dyn Phase>> {
        self.ctors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
            .map(|ctor| ctor())
    }

    pub fn len(&self) -> usize {
        self.ctors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry the scheduler resolves classes against.
pub fn global_registry() -> &'static PhaseRegistry {
    static REGISTRY: OnceLock<PhaseRegistry> = OnceLock::new();
    REGISTRY.get_or_init(PhaseRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PhaseContext;
    use crate::params::PhaseParamDetail;
    use crate::phase::PhaseSignal;
    use std::sync::Arc;

    #[derive(Default)]
    struct NoopPhase;

    impl Phase for NoopPhase {
        fn do_process(
            &self,
            _ctx: &Arc<PhaseContext>,
            _detail: &PhaseParamDetail,
            signal: &PhaseSignal,
        ) -> i32 {
            signal.notify_done(0)
        }
    }

    #[test]
    fn lookup_strips_parameter_suffix() {
        let registry = PhaseRegistry::new();
        registry.register_default::<NoopPhase>("NoopPhase");
        assert!(registry.has_registered("NoopPhase"));
        assert!(registry.has_registered("NoopPhase(redo:true,redo_retry_times:2)"));
        assert!(!registry.has_registered("OtherPhase"));
        assert!(!registry.has_registered("OtherPhase(x:1)"));
    }

    #[test]
    fn create_returns_fresh_instances() {
        let registry = PhaseRegistry::new();
        registry.register_default::<NoopPhase>("NoopPhase");
        assert!(registry.create("NoopPhase").is_some());
        assert!(registry.create("Missing").is_none());
        assert_eq!(registry.len(), 1);
    }
}
