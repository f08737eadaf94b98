//! Data availability layer for the Tessel node.
//!
//! A DA backend publishes opaque blobs somewhere they can later be fetched
//! and checked for availability. Backends are constructed by name through
//! an explicit [`Registry`] value; nothing here is global.

pub mod error;
pub mod grpc;
pub mod mock;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::DaError;
pub use grpc::GrpcDa;
pub use mock::MockDa;
pub use registry::{Factory, Registry};

/// Where a blob landed: the DA height plus the sha256 commitment of its
/// bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    pub da_height: u64,
    pub commitment: [u8; 32],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub reference: BlobRef,
    pub da_height: u64,
}

/// The capability set every DA backend implements.
///
/// Lifecycle: `init` once with the backend's JSON configuration, then
/// `start`; `submit`, `retrieve` and `check_availability` are only valid
/// while running.
#[async_trait]
pub trait DataAvailabilityLayer: Send + Sync {
    /// Registry name of this backend.
    fn name(&self) -> &'static str;

    /// Apply configuration. An empty slice means defaults.
    fn init(&mut self, config: &[u8]) -> Result<(), DaError>;

    async fn start(&mut self) -> Result<(), DaError>;

    async fn stop(&mut self) -> Result<(), DaError>;

    async fn submit(&self, blob: &[u8]) -> Result<SubmitReceipt, DaError>;

    async fn retrieve(&self, reference: &BlobRef) -> Result<Vec<u8>, DaError>;

    async fn check_availability(&self, reference: &BlobRef) -> Result<bool, DaError>;
}

/// Parse a JSON config blob, treating an empty one as `T::default()`.
pub(crate) fn parse_config<T>(config: &[u8]) -> Result<T, DaError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if config.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(config).map_err(|e| DaError::Config(e.to_string()))
}
