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

// Error taxonomy for orchestrated object operations

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::transform::TransformError;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Orchestrator-level operation, used to label errors and log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Put,
    Get,
    Remove,
    Exists,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Put => "PutObject",
            Operation::Get => "GetObject",
            Operation::Remove => "RemoveObject",
            Operation::Exists => "ExistsObject",
        };
        f.write_str(name)
    }
}

/// Per-backend failures collected during a fan-out
#[derive(Debug, Default)]
pub struct BackendErrors(pub Vec<StoreError>);

impl BackendErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoreError> {
        self.0.iter()
    }
}

impl fmt::Display for BackendErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no main backend configured for {0} operation")]
    NoMainBackend(Operation),

    #[error("no backends configured")]
    NoBackends,

    #[error("backend '{backend}' requests AES256 encryption but no encryption key is configured")]
    MissingEncryptionKey { backend: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{operation} failed on backend '{backend}': {source:#}")]
    Backend {
        backend: String,
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },

    #[error("{operation} failed on all {total} backends: {errors}")]
    AllFailed {
        operation: Operation,
        total: usize,
        errors: BackendErrors,
    },

    #[error("{operation} partially failed on {failed}/{total} backends: {errors}")]
    PartialFailure {
        operation: Operation,
        failed: usize,
        total: usize,
        errors: BackendErrors,
    },

    #[error("all clients failed to get the object: {0}")]
    AllClientsFailed(BackendErrors),

    #[error("{operation} worker terminated abnormally: {message}")]
    Worker {
        operation: Operation,
        message: String,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },

    #[error("failed to read input stream: {0}")]
    Read(#[source] std::io::Error),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl StoreError {
    /// Wrap a single backend failure with the backend id and operation
    pub fn backend(backend: impl Into<String>, operation: Operation, source: anyhow::Error) -> Self {
        StoreError::Backend {
            backend: backend.into(),
            operation,
            source,
        }
    }

    /// Fold the failures of a fan-out over `total` backends into one result.
    ///
    /// A single attempted backend reports its own error; otherwise all-failed
    /// and partially-failed outcomes are kept distinct.
    pub fn aggregate(operation: Operation, total: usize, mut errors: Vec<StoreError>) -> Result<()> {
        if errors.is_empty() {
            return Ok(());
        }
        if total == 1 && errors.len() == 1 {
            return Err(errors.remove(0));
        }
        let failed = errors.len();
        if failed >= total {
            Err(StoreError::AllFailed {
                operation,
                total,
                errors: BackendErrors(errors),
            })
        } else {
            Err(StoreError::PartialFailure {
                operation,
                failed,
                total,
                errors: BackendErrors(errors),
            })
        }
    }

    /// True when some, but not all, backends failed
    pub fn is_partial(&self) -> bool {
        matches!(self, StoreError::PartialFailure { .. })
    }

    /// True for errors raised before any backend I/O was attempted
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StoreError::NoMainBackend(_)
                | StoreError::NoBackends
                | StoreError::MissingEncryptionKey { .. }
                | StoreError::InvalidConfig(_)
        )
    }
}
