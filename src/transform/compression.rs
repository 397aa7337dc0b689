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

// Gzip compression steps

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Read};

use super::{ByteStream, ReadTransform, ReleaseHandle, TransformError, WriteTransform};

/// Compress a buffer into a gzip stream
pub fn compress(data: &[u8], level: Compression) -> Result<Vec<u8>, TransformError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), level);
    std::io::Write::write_all(&mut encoder, data).map_err(TransformError::Compress)?;
    encoder.finish().map_err(TransformError::Compress)
}

/// Decompress a gzip stream, rejecting malformed or truncated input
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(TransformError::Decompress)?;
    Ok(out)
}

pub struct GzipCompress {
    level: Compression,
}

impl GzipCompress {
    pub fn new(level: Compression) -> Self {
        Self { level }
    }
}

impl Default for GzipCompress {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl WriteTransform for GzipCompress {
    fn name(&self) -> &'static str {
        "gzip-compress"
    }

    fn apply(
        &self,
        mut input: ByteStream,
    ) -> Result<(ByteStream, Option<ReleaseHandle>), TransformError> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        std::io::copy(&mut input, &mut encoder).map_err(TransformError::Compress)?;
        let compressed = encoder.finish().map_err(TransformError::Compress)?;

        Ok((Box::new(Cursor::new(compressed)), None))
    }
}

pub struct GzipDecompress;

impl ReadTransform for GzipDecompress {
    fn name(&self) -> &'static str {
        "gzip-decompress"
    }

    fn apply(&self, input: ByteStream) -> Result<ByteStream, TransformError> {
        let mut decoder = GzDecoder::new(input);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(TransformError::Decompress)?;

        Ok(Box::new(Cursor::new(out)))
    }
}
