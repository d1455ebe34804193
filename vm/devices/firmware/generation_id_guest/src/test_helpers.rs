// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory stand-ins for the firmware and physical memory.

use crate::presenter::GENERATION_ID_LEN;
use crate::resolver::AcpiObject;
use crate::resolver::AcpiPath;
use crate::resolver::EvaluateError;
use crate::resolver::MethodEvaluator;
use crate::resolver::PhysicalAddress;
use crate::window::MappedRegion;
use crate::window::PhysicalMapper;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub fn addr_package(low: u64, high: u64) -> AcpiObject {
    AcpiObject::Package(vec![AcpiObject::Integer(low), AcpiObject::Integer(high)])
}

/// Answers `ADDR` per device; devices without an answer fail with
/// [`EvaluateError::MissingMethod`].
#[derive(Default)]
pub struct FakeEvaluator {
    results: Mutex<HashMap<AcpiPath, AcpiObject>>,
    calls: Mutex<Vec<String>>,
}

impl FakeEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, device: &AcpiPath, result: AcpiObject) {
        self.results.lock().insert(device.clone(), result);
    }

    pub fn remove(&self, device: &AcpiPath) {
        self.results.lock().remove(device);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl MethodEvaluator for FakeEvaluator {
    fn evaluate(&self, device: &AcpiPath, method: &str) -> Result<AcpiObject, EvaluateError> {
        self.calls.lock().push(device.method(method));
        self.results
            .lock()
            .get(device)
            .cloned()
            .ok_or(EvaluateError::MissingMethod)
    }
}

/// Physical memory made of 16-byte cells; mapping anything else fails.
#[derive(Default)]
pub struct FakeMapper {
    cells: Mutex<HashMap<PhysicalAddress, [u8; GENERATION_ID_LEN]>>,
    maps: AtomicUsize,
    live: Arc<AtomicUsize>,
}

impl FakeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the hypervisor writing a new value.
    pub fn store(&self, address: PhysicalAddress, value: [u8; GENERATION_ID_LEN]) {
        self.cells.lock().insert(address, value);
    }

    pub fn map_count(&self) -> usize {
        self.maps.load(Ordering::SeqCst)
    }

    pub fn live_mappings(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeRegion {
    data: Vec<u8>,
    live: Arc<AtomicUsize>,
}

impl MappedRegion for FakeRegion {
    fn read_volatile(&self, offset: usize, data: &mut [u8]) {
        data.copy_from_slice(&self.data[offset..offset + data.len()]);
    }
}

impl Drop for FakeRegion {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PhysicalMapper for FakeMapper {
    type Region = FakeRegion;

    fn map(&self, address: PhysicalAddress, len: usize) -> io::Result<FakeRegion> {
        self.maps.fetch_add(1, Ordering::SeqCst);
        let cells = self.cells.lock();
        let cell = cells
            .get(&address)
            .filter(|_| len <= GENERATION_ID_LEN)
            .ok_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable))?;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(FakeRegion {
            data: cell[..len].to_vec(),
            live: self.live.clone(),
        })
    }
}
