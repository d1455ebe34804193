// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read queries for the current Generation ID.

use crate::presenter;
use crate::presenter::GenerationId;
use crate::presenter::GENERATION_ID_LEN;
use crate::store::GenerationIdStore;
use crate::store::NotBoundError;
use crate::window::MapError;
use crate::window::MemoryWindow;
use crate::window::PhysicalMapper;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use zerocopy::IntoBytes;

/// A failed Generation ID query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The device is not bound.
    #[error(transparent)]
    NotBound(#[from] NotBoundError),
    /// The value could not be mapped.
    #[error(transparent)]
    Map(#[from] MapError),
}

impl From<QueryError> for io::Error {
    fn from(err: QueryError) -> Self {
        let kind = match &err {
            QueryError::NotBound(_) => io::ErrorKind::NotConnected,
            QueryError::Map(err) => err.kind(),
        };
        io::Error::new(kind, err)
    }
}

/// Serves reads of the current Generation ID.
///
/// Each read captures the current address and then maps and copies the value
/// without holding the store's lock, so a concurrent refresh is observed
/// either entirely before or entirely after the read.
#[derive(Debug)]
pub struct GenerationIdReader<M> {
    store: Arc<GenerationIdStore>,
    window: MemoryWindow<M>,
}

impl<M: PhysicalMapper> GenerationIdReader<M> {
    /// Creates a reader for the address held in `store`.
    pub fn new(store: Arc<GenerationIdStore>, mapper: M) -> Self {
        Self {
            store,
            window: MemoryWindow::new(mapper),
        }
    }

    /// Reads the current value.
    pub fn read(&self) -> Result<GenerationId, QueryError> {
        let address = self.store.current()?;
        let id = self.window.read_physical(address).inspect_err(|err| {
            tracing::warn!(
                error = err as &dyn std::error::Error,
                "could not map generation ID memory"
            );
        })?;
        tracing::trace!(%address, %id, "read generation ID");
        Ok(id)
    }

    /// Returns the canonical text form, terminated by a newline.
    pub fn generation_id(&self) -> Result<String, QueryError> {
        Ok(presenter::as_canonical_string(self.read()?.as_bytes()))
    }

    /// Returns the raw 16 bytes.
    pub fn raw(&self) -> Result<[u8; GENERATION_ID_LEN], QueryError> {
        Ok(presenter::as_raw_bytes(self.read()?.as_bytes()))
    }
}
