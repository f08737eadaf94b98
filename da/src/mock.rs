//! In-memory DA backend for tests and local development.
//!
//! Every submit lands at the next DA height. Blobs are kept until the
//! instance is dropped; stopping only refuses further calls.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use tessel_types::sha256;
use tracing::debug;

use crate::{parse_config, BlobRef, DaError, DataAvailabilityLayer, SubmitReceipt};

pub const NAME: &str = "mock";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// DA height of the first submitted blob, minus one.
    pub start_height: u64,
}

#[derive(Default)]
struct Inner {
    height: u64,
    blobs: BTreeMap<u64, Vec<u8>>,
}

#[derive(Default)]
pub struct MockDa {
    running: bool,
    inner: Mutex<Inner>,
}

impl MockDa {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_running(&self) -> Result<(), DaError> {
        if self.running {
            Ok(())
        } else {
            Err(DaError::NotRunning(NAME))
        }
    }
}

#[async_trait]
impl DataAvailabilityLayer for MockDa {
    fn name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self, config: &[u8]) -> Result<(), DaError> {
        let config: MockConfig = parse_config(config)?;
        let mut inner = self.inner.lock().unwrap();
        inner.height = config.start_height;
        inner.blobs.clear();
        Ok(())
    }

    async fn start(&mut self) -> Result<(), DaError> {
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DaError> {
        self.running = false;
        Ok(())
    }

    async fn submit(&self, blob: &[u8]) -> Result<SubmitReceipt, DaError> {
        self.ensure_running()?;
        let mut inner = self.inner.lock().unwrap();
        inner.height += 1;
        let da_height = inner.height;
        inner.blobs.insert(da_height, blob.to_vec());
        debug!(da_height, bytes = blob.len(), "mock DA blob stored");
        Ok(SubmitReceipt {
            reference: BlobRef {
                da_height,
                commitment: sha256(blob),
            },
            da_height,
        })
    }

    async fn retrieve(&self, reference: &BlobRef) -> Result<Vec<u8>, DaError> {
        self.ensure_running()?;
        self.inner
            .lock()
            .unwrap()
            .blobs
            .get(&reference.da_height)
            .filter(|blob| sha256(blob) == reference.commitment)
            .cloned()
            .ok_or(DaError::BlobNotFound(reference.da_height))
    }

    async fn check_availability(&self, reference: &BlobRef) -> Result<bool, DaError> {
        self.ensure_running()?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .blobs
            .get(&reference.da_height)
            .is_some_and(|blob| sha256(blob) == reference.commitment))
    }
}
