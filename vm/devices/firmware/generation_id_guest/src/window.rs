// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Short-lived mappings of the physical memory holding the Generation ID.

use crate::presenter::GenerationId;
use crate::resolver::PhysicalAddress;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use zerocopy::FromZeros;
use zerocopy::IntoBytes;

/// A mapped range of device-backed physical memory.
///
/// The mapping is released when the region is dropped.
pub trait MappedRegion {
    /// Copies `data.len()` bytes starting at `offset` into `data`, using
    /// accesses that are valid for uncached, hardware-mutated memory.
    ///
    /// Panics if the range is outside the region.
    fn read_volatile(&self, offset: usize, data: &mut [u8]);
}

/// Platform primitive that maps physical memory for reading.
pub trait PhysicalMapper: Send + Sync {
    /// The mapping type.
    type Region: MappedRegion;

    /// Maps `len` bytes at `address` read-only and uncached.
    fn map(&self, address: PhysicalAddress, len: usize) -> io::Result<Self::Region>;
}

impl<T: PhysicalMapper + ?Sized> PhysicalMapper for &T {
    type Region = T::Region;

    fn map(&self, address: PhysicalAddress, len: usize) -> io::Result<Self::Region> {
        (**self).map(address, len)
    }
}

impl<T: PhysicalMapper + ?Sized> PhysicalMapper for Arc<T> {
    type Region = T::Region;

    fn map(&self, address: PhysicalAddress, len: usize) -> io::Result<Self::Region> {
        (**self).map(address, len)
    }
}

/// Failed to map physical memory.
#[derive(Debug, Error)]
#[error("failed to map {len:#x} bytes at physical address {address}")]
pub struct MapError {
    address: PhysicalAddress,
    len: usize,
    #[source]
    source: io::Error,
}

impl MapError {
    /// The address that could not be mapped.
    pub fn address(&self) -> PhysicalAddress {
        self.address
    }

    /// The kind of the underlying OS error.
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// Reads physical memory through per-call mappings.
#[derive(Debug)]
pub struct MemoryWindow<M> {
    mapper: M,
}

impl<M: PhysicalMapper> MemoryWindow<M> {
    /// Creates a window that maps memory with `mapper`.
    pub fn new(mapper: M) -> Self {
        Self { mapper }
    }

    /// Reads the Generation ID stored at `address`.
    pub fn read_physical(&self, address: PhysicalAddress) -> Result<GenerationId, MapError> {
        let mut id = GenerationId::new_zeroed();
        self.read(address, id.as_mut_bytes())?;
        Ok(id)
    }

    /// Fills `data` from physical memory at `address`.
    ///
    /// The mapping exists only for the duration of the call.
    pub fn read(&self, address: PhysicalAddress, data: &mut [u8]) -> Result<(), MapError> {
        let region = self
            .mapper
            .map(address, data.len())
            .map_err(|source| MapError {
                address,
                len: data.len(),
                source,
            })?;
        region.read_volatile(0, data);
        Ok(())
    }
}
