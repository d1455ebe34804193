// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! CLI argument parsing.
//!
//! This module only marshals raw CLI strings into typed values. Opening
//! files and devices is left to the caller.

use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

/// Reads the virtual machine Generation ID exposed by the `QEMUVGID` ACPI
/// device.
///
/// Requires the `acpi_call` kernel module and read access to `/dev/mem`.
/// Set `VMGENID_LOG` to control log output (default `info`).
#[derive(Debug, Parser)]
pub struct Options {
    /// path of the acpi_call interface
    #[clap(long, value_name = "PATH", default_value = "/proc/acpi/call")]
    pub acpi_call: PathBuf,

    /// path of the physical memory device
    #[clap(long, value_name = "PATH", default_value = "/dev/mem")]
    pub mem: PathBuf,

    /// sysfs directory listing ACPI devices
    #[clap(long, value_name = "PATH", default_value = "/sys/bus/acpi/devices")]
    pub sysfs: PathBuf,

    /// ACPI namespace path of the device, instead of looking it up in sysfs
    /// (e.g. `\_SB_.VGEN`)
    #[clap(long, value_name = "ACPI_PATH")]
    pub device: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the Generation ID as text.
    Show,
    /// Write the 16 raw Generation ID bytes to stdout.
    Raw,
    /// Print the Generation ID, then again each time the platform reports a
    /// change.
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use test_with_tracing::test;

    #[test]
    fn verify_cli() {
        Options::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let opts = Options::try_parse_from(["vmgenid", "show"]).unwrap();
        assert_eq!(opts.acpi_call, PathBuf::from("/proc/acpi/call"));
        assert_eq!(opts.mem, PathBuf::from("/dev/mem"));
        assert_eq!(opts.sysfs, PathBuf::from("/sys/bus/acpi/devices"));
        assert!(opts.device.is_none());
        assert!(matches!(opts.command, Command::Show));
    }

    #[test]
    fn overrides() {
        let opts = Options::try_parse_from([
            "vmgenid",
            "--device",
            r"\_SB_.VGEN",
            "--mem",
            "/tmp/mem",
            "watch",
        ])
        .unwrap();
        assert_eq!(opts.device.as_deref(), Some(r"\_SB_.VGEN"));
        assert_eq!(opts.mem, PathBuf::from("/tmp/mem"));
        assert!(matches!(opts.command, Command::Watch));
    }

    #[test]
    fn requires_command() {
        assert!(Options::try_parse_from(["vmgenid"]).is_err());
    }
}
