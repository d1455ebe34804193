// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Formatting of Generation ID values.
//!
//! The canonical text form groups the bytes like a GUID, reading the first
//! three fields as little-endian integers, which is how the value is laid out
//! in memory. It is not the big-endian RFC 4122 form.

use std::fmt;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// Size of a Generation ID in bytes.
pub const GENERATION_ID_LEN: usize = 16;

const DATA1_OFFSET: usize = 0;
const DATA2_OFFSET: usize = 4;
const DATA3_OFFSET: usize = 6;
const CLOCK_SEQ_OFFSET: usize = 8;
const NODE_OFFSET: usize = 10;

/// A snapshot of the 16-byte Generation ID.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct GenerationId([u8; GENERATION_ID_LEN]);

impl GenerationId {
    /// Wraps raw Generation ID bytes.
    pub const fn new(bytes: [u8; GENERATION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub const fn to_bytes(self) -> [u8; GENERATION_ID_LEN] {
        self.0
    }

    fn u32_at(&self, offset: usize) -> u32 {
        let b = &self.0;
        u32::from_le_bytes([b[offset], b[offset + 1], b[offset + 2], b[offset + 3]])
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.0[offset], self.0[offset + 1]])
    }
}

impl From<[u8; GENERATION_ID_LEN]> for GenerationId {
    fn from(bytes: [u8; GENERATION_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-",
            self.u32_at(DATA1_OFFSET),
            self.u16_at(DATA2_OFFSET),
            self.u16_at(DATA3_OFFSET),
        )?;
        for b in &self.0[CLOCK_SEQ_OFFSET..NODE_OFFSET] {
            write!(f, "{b:02x}")?;
        }
        f.write_str("-")?;
        for b in &self.0[NODE_OFFSET..] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Formats `bytes` as `aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee\n`.
///
/// # Panics
///
/// Panics if `bytes` is not exactly [`GENERATION_ID_LEN`] bytes long.
pub fn as_canonical_string(bytes: &[u8]) -> String {
    format!("{}\n", GenerationId(*exact(bytes)))
}

/// Returns `bytes` unchanged, as the literal hardware representation.
///
/// # Panics
///
/// Panics if `bytes` is not exactly [`GENERATION_ID_LEN`] bytes long.
pub fn as_raw_bytes(bytes: &[u8]) -> [u8; GENERATION_ID_LEN] {
    *exact(bytes)
}

fn exact(bytes: &[u8]) -> &[u8; GENERATION_ID_LEN] {
    match bytes.try_into() {
        Ok(bytes) => bytes,
        Err(_) => panic!(
            "generation ID must be {GENERATION_ID_LEN} bytes, got {}",
            bytes.len()
        ),
    }
}
