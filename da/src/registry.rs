//! Name-to-factory registry for DA backends.
//!
//! Built once at startup and passed by reference to whoever needs to
//! construct a backend. Every [`Registry::resolve`] call yields a fresh,
//! independent instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::{grpc, mock, DaError, DataAvailabilityLayer, GrpcDa, MockDa};

pub type Factory = Arc<dyn Fn() -> Box<dyn DataAvailabilityLayer> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Registry {
    factories: BTreeMap<String, Factory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `mock` and `grpc` backends.
    pub fn with_defaults() -> Self {
        let mut factories: BTreeMap<String, Factory> = BTreeMap::new();
        factories.insert(
            mock::NAME.to_string(),
            Arc::new(|| Box::new(MockDa::new()) as Box<dyn DataAvailabilityLayer>),
        );
        factories.insert(
            grpc::NAME.to_string(),
            Arc::new(|| Box::new(GrpcDa::new()) as Box<dyn DataAvailabilityLayer>),
        );
        Self { factories }
    }

    pub fn register(&mut self, name: impl Into<String>, factory: Factory) -> Result<(), DaError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(DaError::DuplicateBackend(name));
        }
        debug!(backend = %name, "DA backend registered");
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Construct a new instance of the backend registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn DataAvailabilityLayer>, DaError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| DaError::UnknownBackend(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
