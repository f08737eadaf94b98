//! Client for a remote DA service.
//!
//! Every call opens a TCP connection to the configured service, writes one
//! request frame and reads one response frame. A frame is a 4-byte
//! big-endian length followed by a bincode payload.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::{parse_config, BlobRef, DaError, DataAvailabilityLayer, SubmitReceipt};

pub const NAME: &str = "grpc";

/// Largest frame accepted in either direction.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GrpcConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7980,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaRequest {
    Submit { blob: Vec<u8> },
    Retrieve { reference: BlobRef },
    CheckAvailability { reference: BlobRef },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaResponse {
    Submitted(SubmitReceipt),
    Blob(Vec<u8>),
    Availability(bool),
    NotFound(u64),
    Error(String),
}

/// Write one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), DaError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(DaError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let len_bytes = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, DaError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(DaError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

#[derive(Default)]
pub struct GrpcDa {
    config: GrpcConfig,
    running: bool,
}

impl GrpcDa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &GrpcConfig {
        &self.config
    }

    async fn call(&self, request: DaRequest) -> Result<DaResponse, DaError> {
        if !self.running {
            return Err(DaError::NotRunning(NAME));
        }
        tokio::time::timeout(REQUEST_TIMEOUT, self.round_trip(&request))
            .await
            .map_err(|_| DaError::Timeout)?
    }

    async fn round_trip(&self, request: &DaRequest) -> Result<DaResponse, DaError> {
        let mut stream = TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;
        let payload = bincode::serialize(request)?;
        write_frame(&mut stream, &payload).await?;
        let body = read_frame(&mut stream).await?;
        let response: DaResponse = bincode::deserialize(&body)?;
        if let DaResponse::Error(msg) = response {
            warn!(error = %msg, "DA service returned an error");
            return Err(DaError::Remote(msg));
        }
        Ok(response)
    }
}

#[async_trait]
impl DataAvailabilityLayer for GrpcDa {
    fn name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self, config: &[u8]) -> Result<(), DaError> {
        self.config = parse_config(config)?;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), DaError> {
        debug!(host = %self.config.host, port = self.config.port, "grpc DA client started");
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DaError> {
        self.running = false;
        Ok(())
    }

    async fn submit(&self, blob: &[u8]) -> Result<SubmitReceipt, DaError> {
        match self.call(DaRequest::Submit { blob: blob.to_vec() }).await? {
            DaResponse::Submitted(receipt) => Ok(receipt),
            other => Err(DaError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    async fn retrieve(&self, reference: &BlobRef) -> Result<Vec<u8>, DaError> {
        match self.call(DaRequest::Retrieve { reference: *reference }).await? {
            DaResponse::Blob(blob) => Ok(blob),
            DaResponse::NotFound(height) => Err(DaError::BlobNotFound(height)),
            other => Err(DaError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    async fn check_availability(&self, reference: &BlobRef) -> Result<bool, DaError> {
        match self
            .call(DaRequest::CheckAvailability {
                reference: *reference,
            })
            .await?
        {
            DaResponse::Availability(available) => Ok(available),
            other => Err(DaError::UnexpectedResponse(format!("{other:?}"))),
        }
    }
}
