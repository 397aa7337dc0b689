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

// AES-256-GCM encryption steps
//
// On-disk layout: nonce (12 bytes) followed by the AEAD ciphertext and tag.
// The cipher key is the SHA-256 digest of the configured passphrase.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};
use std::sync::Arc;

use super::{ByteStream, ReadTransform, ReleaseHandle, TransformError, WriteTransform};

/// GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(digest.as_slice());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt under a fresh random nonce and prepend the nonce
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, TransformError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| TransformError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        if data.len() < NONCE_LEN {
            return Err(TransformError::CiphertextTooShort {
                len: data.len(),
                nonce_len: NONCE_LEN,
            });
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TransformError::Decrypt)
    }
}

pub struct AesGcmEncrypt {
    cipher: Arc<AesGcmCipher>,
}

impl AesGcmEncrypt {
    pub fn new(cipher: Arc<AesGcmCipher>) -> Self {
        Self { cipher }
    }
}

impl WriteTransform for AesGcmEncrypt {
    fn name(&self) -> &'static str {
        "aes-gcm-encrypt"
    }

    fn apply(
        &self,
        mut input: ByteStream,
    ) -> Result<(ByteStream, Option<ReleaseHandle>), TransformError> {
        let mut plaintext = Vec::new();
        input
            .read_to_end(&mut plaintext)
            .map_err(TransformError::Io)?;
        let sealed = self.cipher.encrypt(&plaintext)?;

        Ok((Box::new(Cursor::new(sealed)), None))
    }
}

pub struct AesGcmDecrypt {
    cipher: Arc<AesGcmCipher>,
}

impl AesGcmDecrypt {
    pub fn new(cipher: Arc<AesGcmCipher>) -> Self {
        Self { cipher }
    }
}

impl ReadTransform for AesGcmDecrypt {
    fn name(&self) -> &'static str {
        "aes-gcm-decrypt"
    }

    fn apply(&self, mut input: ByteStream) -> Result<ByteStream, TransformError> {
        let mut sealed = Vec::new();
        input.read_to_end(&mut sealed).map_err(TransformError::Io)?;
        let plaintext = self.cipher.decrypt(&sealed)?;

        Ok(Box::new(Cursor::new(plaintext)))
    }
}
