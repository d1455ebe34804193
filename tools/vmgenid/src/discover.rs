// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Finds the Generation ID device among the ACPI devices in sysfs.

use anyhow::Context;
use generation_id_guest::resolver::DEVICE_HID;
use generation_id_guest::AcpiPath;
use std::path::Path;

/// A Generation ID device instance known to the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// The sysfs instance name, such as `QEMUVGID:00`.
    pub name: String,
    /// The ACPI namespace path of the device.
    pub path: AcpiPath,
}

/// Returns true if `name` is a sysfs instance name of the Generation ID
/// device.
pub fn is_generation_id_device(name: &str) -> bool {
    name.strip_prefix(DEVICE_HID)
        .is_some_and(|instance| instance.starts_with(':'))
}

/// Reads the ACPI path of the device instance `name` under `sysfs`.
pub fn device(sysfs: &Path, name: &str) -> anyhow::Result<Device> {
    let path = fs_err::read_to_string(sysfs.join(name).join("path"))?;
    let path = path.trim();
    if path.is_empty() {
        anyhow::bail!("device {name} has no ACPI path");
    }
    Ok(Device {
        name: name.to_owned(),
        path: AcpiPath::new(path),
    })
}

/// Finds the Generation ID device under `sysfs`.
///
/// Only one instance is supported; if there are several, the first one by
/// name is used.
pub fn find(sysfs: &Path) -> anyhow::Result<Option<Device>> {
    let mut names = Vec::new();
    for entry in fs_err::read_dir(sysfs)? {
        let name = entry?.file_name();
        if let Some(name) = name.to_str().filter(|n| is_generation_id_device(n)) {
            names.push(name.to_owned());
        }
    }
    names.sort();

    let Some((first, rest)) = names.split_first() else {
        return Ok(None);
    };
    if !rest.is_empty() {
        tracing::warn!(
            device = first.as_str(),
            ignored = ?rest,
            "multiple generation ID devices found"
        );
    }
    device(sysfs, first)
        .with_context(|| format!("failed to read device {first}"))
        .map(Some)
}
