// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resolution of the Generation ID's physical address from the `ADDR` method.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// ACPI hardware ID of the Generation ID device.
pub const DEVICE_HID: &str = "QEMUVGID";

/// Argument-less method returning the `{ low, high }` address package.
pub const ADDR_METHOD: &str = "ADDR";

/// An absolute ACPI namespace path naming a device, such as `\_SB_.VGEN`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AcpiPath(String);

impl AcpiPath {
    /// Wraps an ACPI namespace path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the path as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the full path of `method` on this device.
    pub fn method(&self, method: &str) -> String {
        format!("{}.{}", self.0, method)
    }
}

impl fmt::Display for AcpiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed object produced by evaluating an ACPI method.
#[derive(Clone, Debug, PartialEq, Eq)]
#[expect(missing_docs)] // self-explanatory variants
pub enum AcpiObject {
    Integer(u64),
    String(String),
    Buffer(Vec<u8>),
    Package(Vec<AcpiObject>),
}

impl AcpiObject {
    /// The ACPI name of this object's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            AcpiObject::Integer(_) => "integer",
            AcpiObject::String(_) => "string",
            AcpiObject::Buffer(_) => "buffer",
            AcpiObject::Package(_) => "package",
        }
    }
}

/// An error from a [`MethodEvaluator`].
#[derive(Debug, Error)]
pub enum EvaluateError {
    /// The method does not exist on the device.
    #[error("method not found")]
    MissingMethod,
    /// The firmware failed the evaluation with the given status.
    #[error("firmware returned {0}")]
    Firmware(String),
    /// The evaluation primitive itself could not be used.
    #[error("evaluation transport failure")]
    Io(#[source] std::io::Error),
    /// The evaluation primitive returned something that is not an object.
    #[error("unrecognized evaluation result {0:?}")]
    InvalidResult(String),
}

/// Platform primitive that evaluates argument-less ACPI methods.
///
/// The returned object is owned by the caller, so any platform buffer backing
/// it must already have been released, or be released when it is dropped.
pub trait MethodEvaluator: Send + Sync {
    /// Evaluates `method` on `device`.
    fn evaluate(&self, device: &AcpiPath, method: &str) -> Result<AcpiObject, EvaluateError>;
}

impl<T: MethodEvaluator + ?Sized> MethodEvaluator for &T {
    fn evaluate(&self, device: &AcpiPath, method: &str) -> Result<AcpiObject, EvaluateError> {
        (**self).evaluate(device, method)
    }
}

impl<T: MethodEvaluator + ?Sized> MethodEvaluator for Arc<T> {
    fn evaluate(&self, device: &AcpiPath, method: &str) -> Result<AcpiObject, EvaluateError> {
        (**self).evaluate(device, method)
    }
}

/// A physical address reported by the firmware.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    /// Composes an address from the two 32-bit halves reported by `ADDR`.
    pub const fn from_halves(low: u32, high: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }

    /// Returns the address as an integer.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Why an `ADDR` result could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedResult {
    /// The result was not a package.
    #[error("expected a package, found {0}")]
    NotPackage(&'static str),
    /// The package did not have exactly two elements.
    #[error("expected 2 elements, found {0}")]
    ElementCount(usize),
    /// A package element was not an integer.
    #[error("element {index} is a {found}, expected an integer")]
    ElementType {
        /// Position of the offending element.
        index: usize,
        /// Type of the offending element.
        found: &'static str,
    },
}

/// An error resolving the Generation ID address.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Evaluating `ADDR` failed.
    #[error("failed to evaluate ADDR on {device}")]
    NotFound {
        /// The device being resolved.
        device: AcpiPath,
        /// The evaluation failure.
        #[source]
        source: EvaluateError,
    },
    /// `ADDR` returned something other than two integers.
    #[error("malformed ADDR result from {device}")]
    MalformedResult {
        /// The device being resolved.
        device: AcpiPath,
        /// What was wrong with the result.
        #[source]
        reason: MalformedResult,
    },
    /// The device was removed or rebound while `ADDR` was being evaluated,
    /// so the result was discarded.
    #[error("ADDR result from {device} was superseded by a later event")]
    Superseded {
        /// The device being resolved.
        device: AcpiPath,
    },
}

/// Resolves the Generation ID address by evaluating `ADDR`.
#[derive(Debug)]
pub struct AddressResolver<E> {
    evaluator: E,
}

impl<E: MethodEvaluator> AddressResolver<E> {
    /// Creates a resolver using `evaluator` to run firmware methods.
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// Evaluates `ADDR` on `device` and decodes the result.
    pub fn resolve(&self, device: &AcpiPath) -> Result<PhysicalAddress, ResolveError> {
        let result = self
            .evaluator
            .evaluate(device, ADDR_METHOD)
            .map_err(|source| ResolveError::NotFound {
                device: device.clone(),
                source,
            })?;

        let address = decode_addr(&result).map_err(|reason| ResolveError::MalformedResult {
            device: device.clone(),
            reason,
        })?;

        tracing::debug!(%device, %address, "resolved generation ID address");
        Ok(address)
    }
}

/// Decodes an `ADDR` result into a physical address.
///
/// The result must be a package of exactly two integers, the low 32 bits of
/// the address first. Each element only contributes its low 32 bits.
pub fn decode_addr(result: &AcpiObject) -> Result<PhysicalAddress, MalformedResult> {
    let AcpiObject::Package(elements) = result else {
        return Err(MalformedResult::NotPackage(result.type_name()));
    };
    let [low, high] = elements.as_slice() else {
        return Err(MalformedResult::ElementCount(elements.len()));
    };
    Ok(PhysicalAddress::from_halves(
        address_half(0, low)?,
        address_half(1, high)?,
    ))
}

fn address_half(index: usize, element: &AcpiObject) -> Result<u32, MalformedResult> {
    match *element {
        AcpiObject::Integer(value) => Ok(value as u32),
        ref other => Err(MalformedResult::ElementType {
            index,
            found: other.type_name(),
        }),
    }
}
