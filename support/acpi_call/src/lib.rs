// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! ACPI method evaluation through the `acpi_call` kernel module.
//!
//! The module exposes a single file, normally `/proc/acpi/call`. Writing a
//! method path evaluates it, and reading the file back returns the result as
//! text.

#![forbid(unsafe_code)]

mod reply;

pub use reply::parse_reply;

use generation_id_guest::resolver::EvaluateError;
use generation_id_guest::AcpiObject;
use generation_id_guest::AcpiPath;
use generation_id_guest::MethodEvaluator;
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::path::PathBuf;

/// Default path of the `acpi_call` interface.
pub const ACPI_CALL: &str = "/proc/acpi/call";

/// Evaluates ACPI methods with the `acpi_call` kernel module.
#[derive(Debug)]
pub struct AcpiCallEvaluator {
    path: PathBuf,
    // The module keeps one result buffer for all callers.
    call: Mutex<()>,
}

impl AcpiCallEvaluator {
    /// Uses the `acpi_call` interface at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            call: Mutex::new(()),
        }
    }

    /// The interface path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn call(&self, method_path: &str) -> io::Result<String> {
        let _guard = self.call.lock();
        fs_err::write(&self.path, method_path)?;
        let reply = fs_err::read_to_string(&self.path)?;
        Ok(reply.trim_end_matches(['\0', '\n']).to_owned())
    }
}

impl Default for AcpiCallEvaluator {
    fn default() -> Self {
        Self::new(ACPI_CALL)
    }
}

impl MethodEvaluator for AcpiCallEvaluator {
    fn evaluate(&self, device: &AcpiPath, method: &str) -> Result<AcpiObject, EvaluateError> {
        let method_path = device.method(method);
        let reply = self.call(&method_path).map_err(EvaluateError::Io)?;
        tracing::debug!(method = %method_path, reply = %reply, "acpi_call");
        parse_reply(&reply)
    }
}
