// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Reversible per-backend data transformation
//
// A backend's write path runs an ordered chain of steps (compress, then
// encrypt) over the payload before it leaves the process; the read path
// applies the inverse steps in the opposite order (decrypt, then
// decompress). Steps are selected once, from the backend's static
// connection properties, when the backend is built.

pub mod compression;
pub mod encryption;

pub use compression::{GzipCompress, GzipDecompress};
pub use encryption::{AesGcmCipher, AesGcmDecrypt, AesGcmEncrypt, NONCE_LEN};

use bytes::Bytes;
use std::io::{Cursor, Read};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::storage::backend::{CompressionAlgorithm, ConnectionProperties, EncryptionAlgorithm};

/// Byte stream flowing between pipeline steps
pub type ByteStream = Box<dyn Read + Send>;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("gzip compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("gzip decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("invalid ciphertext: {len} bytes is shorter than the {nonce_len}-byte nonce")]
    CiphertextTooShort { len: usize, nonce_len: usize },

    #[error("decryption failed: authentication tag mismatch or corrupted ciphertext")]
    Decrypt,

    #[error("AES256 encryption requested without an encryption key")]
    MissingKey,

    #[error("failed to read transform stream: {0}")]
    Io(#[source] std::io::Error),

    #[error("transform worker failed: {0}")]
    Worker(String),
}

/// Resource acquired by a write step, released once the stream is consumed
pub struct ReleaseHandle {
    step: &'static str,
    release: Box<dyn FnOnce() + Send>,
}

impl ReleaseHandle {
    pub fn new(step: &'static str, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            step,
            release: Box::new(release),
        }
    }

    pub fn step(&self) -> &'static str {
        self.step
    }

    pub fn release(self) {
        (self.release)()
    }
}

/// Owns every handle acquired by a write pipeline run.
///
/// Handles are released last-acquired first, either explicitly or on drop.
#[derive(Default)]
pub struct ReleaseGuard {
    handles: Vec<ReleaseHandle>,
}

impl ReleaseGuard {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn release(mut self) {
        self.release_all();
    }

    fn release_all(&mut self) {
        while let Some(handle) = self.handles.pop() {
            debug!("Releasing resources of transform step '{}'", handle.step());
            handle.release();
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Write-time transformation step
pub trait WriteTransform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, input: ByteStream)
        -> Result<(ByteStream, Option<ReleaseHandle>), TransformError>;
}

/// Read-time inverse transformation step
pub trait ReadTransform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, input: ByteStream) -> Result<ByteStream, TransformError>;
}

/// Ordered chain of write steps
#[derive(Clone, Default)]
pub struct WritePipeline {
    steps: Vec<Arc<dyn WriteTransform>>,
}

impl WritePipeline {
    pub fn new(steps: Vec<Arc<dyn WriteTransform>>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step over `input`.
    ///
    /// When a step fails, the handles acquired by the steps before it are
    /// released in reverse order before the error is returned.
    pub fn apply(&self, input: ByteStream) -> Result<(ByteStream, ReleaseGuard), TransformError> {
        let mut guard = ReleaseGuard::default();
        let mut current = input;

        for step in &self.steps {
            match step.apply(current) {
                Ok((out, handle)) => {
                    guard.handles.extend(handle);
                    current = out;
                }
                Err(e) => {
                    debug!(
                        "Write step '{}' failed, releasing {} acquired handle(s)",
                        step.name(),
                        guard.len()
                    );
                    guard.release_all();
                    return Err(e);
                }
            }
        }

        Ok((current, guard))
    }

    /// Encode a fully buffered payload
    pub fn encode(&self, data: Bytes) -> Result<Bytes, TransformError> {
        if self.is_empty() {
            return Ok(data);
        }

        let (mut stream, guard) = self.apply(Box::new(Cursor::new(data)))?;
        let mut out = Vec::new();
        stream.read_to_end(&mut out).map_err(TransformError::Io)?;
        drop(stream);
        guard.release();

        Ok(Bytes::from(out))
    }

    /// `encode` on the blocking thread pool
    pub async fn encode_blocking(&self, data: Bytes) -> Result<Bytes, TransformError> {
        if self.is_empty() {
            return Ok(data);
        }
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.encode(data))
            .await
            .map_err(|e| TransformError::Worker(e.to_string()))?
    }
}

/// Ordered chain of inverse (read) steps
#[derive(Clone, Default)]
pub struct ReadPipeline {
    steps: Vec<Arc<dyn ReadTransform>>,
}

impl ReadPipeline {
    pub fn new(steps: Vec<Arc<dyn ReadTransform>>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn apply(&self, input: ByteStream) -> Result<ByteStream, TransformError> {
        let mut current = input;
        for step in &self.steps {
            current = step.apply(current)?;
        }
        Ok(current)
    }

    /// Decode a fully buffered payload
    pub fn decode(&self, data: Bytes) -> Result<Bytes, TransformError> {
        if self.is_empty() {
            return Ok(data);
        }

        let mut stream = self.apply(Box::new(Cursor::new(data)))?;
        let mut out = Vec::new();
        stream.read_to_end(&mut out).map_err(TransformError::Io)?;

        Ok(Bytes::from(out))
    }

    /// `decode` on the blocking thread pool
    pub async fn decode_blocking(&self, data: Bytes) -> Result<Bytes, TransformError> {
        if self.is_empty() {
            return Ok(data);
        }
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.decode(data))
            .await
            .map_err(|e| TransformError::Worker(e.to_string()))?
    }
}

/// Write and read pipelines derived from one backend's properties
#[derive(Clone, Default)]
pub struct Pipelines {
    pub write: WritePipeline,
    pub read: ReadPipeline,
}

impl Pipelines {
    /// Build both pipelines: compress then encrypt on write, decrypt then
    /// decompress on read.
    pub fn from_properties(props: &ConnectionProperties) -> Result<Self, TransformError> {
        let mut write: Vec<Arc<dyn WriteTransform>> = Vec::new();
        let mut read: Vec<Arc<dyn ReadTransform>> = Vec::new();

        if props.save_compress == CompressionAlgorithm::Gzip {
            write.push(Arc::new(GzipCompress::default()));
        }

        if props.save_encrypt == EncryptionAlgorithm::Aes256 {
            let key = props
                .encrypt_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(TransformError::MissingKey)?;
            let cipher = Arc::new(AesGcmCipher::from_passphrase(key));
            write.push(Arc::new(AesGcmEncrypt::new(cipher.clone())));
            read.push(Arc::new(AesGcmDecrypt::new(cipher)));
        }

        if props.save_compress == CompressionAlgorithm::Gzip {
            read.push(Arc::new(GzipDecompress));
        }

        Ok(Self {
            write: WritePipeline::new(write),
            read: ReadPipeline::new(read),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_properties_build_empty_pipelines() {
        let pipelines = Pipelines::from_properties(&ConnectionProperties::main()).unwrap();
        assert!(pipelines.write.is_empty());
        assert!(pipelines.read.is_empty());

        let data = Bytes::from_static(b"untouched");
        assert_eq!(pipelines.write.encode(data.clone()).unwrap(), data);
    }

    #[test]
    fn test_step_ordering() {
        let props = ConnectionProperties::main().with_gzip().with_aes256("secret");
        let pipelines = Pipelines::from_properties(&props).unwrap();
        assert_eq!(
            pipelines.write.step_names(),
            vec!["gzip-compress", "aes-gcm-encrypt"]
        );
        assert_eq!(
            pipelines.read.step_names(),
            vec!["aes-gcm-decrypt", "gzip-decompress"]
        );
    }

    #[test]
    fn test_encrypt_without_key_fails_at_build() {
        let mut props = ConnectionProperties::main().with_aes256("");
        assert!(matches!(
            Pipelines::from_properties(&props),
            Err(TransformError::MissingKey)
        ));

        props.encrypt_key = None;
        assert!(matches!(
            Pipelines::from_properties(&props),
            Err(TransformError::MissingKey)
        ));
    }

    #[tokio::test]
    async fn test_blocking_roundtrip_of_large_payload() {
        let props = ConnectionProperties::main().with_gzip().with_aes256("secret");
        let pipelines = Pipelines::from_properties(&props).unwrap();
        let data = Bytes::from(b"multi megabyte object ".repeat(256 * 1024));

        let encoded = pipelines.write.encode_blocking(data.clone()).await.unwrap();
        assert!(encoded.len() < data.len());
        assert_eq!(pipelines.read.decode_blocking(encoded).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_blocking_decode_reports_errors() {
        let props = ConnectionProperties::main().with_aes256("secret");
        let pipelines = Pipelines::from_properties(&props).unwrap();
        let result = pipelines.read.decode_blocking(Bytes::from_static(b"short")).await;
        assert!(matches!(result, Err(TransformError::CiphertextTooShort { .. })));
    }
}
