// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Implements a blocking listener for Linux kobject uevents.
//!
//! The kernel reports device arrival, removal and driver-defined change
//! notifications (such as ACPI device notifications surfaced by a driver) as
//! uevents.

#![cfg(target_os = "linux")]

mod bind_kobject_uevent;

use anyhow::Context;
use socket2::Socket;
use std::io;
use std::io::Read;
use thiserror::Error;

const BUFFER_SIZE: usize = 4096;

/// A listener for Linux kobject uevents.
pub struct UeventListener {
    socket: Socket,
    buf: Box<[u8; BUFFER_SIZE]>,
}

/// An error from [`UeventListener::new`].
#[derive(Debug, Error)]
#[error("failed to create uevent socket")]
pub struct NewUeventListenerError(#[source] io::Error);

impl UeventListener {
    /// Opens a new netlink socket and starts listening on it.
    ///
    /// Events are queued by the kernel from this point on, so callers should
    /// open the listener before scanning for the current device state.
    pub fn new() -> Result<Self, NewUeventListenerError> {
        let socket =
            bind_kobject_uevent::bind_kobject_uevent_socket().map_err(NewUeventListenerError)?;
        Ok(Self {
            socket,
            buf: Box::new([0; BUFFER_SIZE]),
        })
    }

    /// Blocks until the next uevent arrives.
    ///
    /// If the socket overflowed, a synthetic event with `RESCAN=true` is
    /// returned so that the caller can re-check any state it depends on.
    pub fn next_event(&mut self) -> anyhow::Result<Uevent<'_>> {
        match (&self.socket).read(&mut self.buf[..]) {
            Ok(n) => {
                let buf = std::str::from_utf8(&self.buf[..n])
                    .context("failed to parse uevent as utf-8 string")?;
                Uevent::parse(buf)
            }
            // uevent socket is an unreliable source and can overflow during an
            // uevent flood. Report a rescan instead of failing.
            Err(e) if e.raw_os_error() == Some(libc::ENOBUFS) => {
                tracing::info!("uevent socket read error: {:?}", e);
                Ok(Uevent::rescan())
            }
            Err(e) => Err(e).context("uevent read failure"),
        }
    }
}

/// A device event.
#[derive(Debug)]
pub struct Uevent<'a> {
    header: &'a str,
    properties: Vec<(&'a str, &'a str)>,
}

impl<'a> Uevent<'a> {
    /// Parses a raw `header\0KEY=VALUE\0...` message.
    pub fn parse(buf: &'a str) -> anyhow::Result<Self> {
        let mut lines = buf.split('\0');
        let header = lines.next().context("missing event header")?;
        let properties = lines.filter_map(|line| line.split_once('=')).collect();
        tracing::debug!(header, ?properties, "uevent");
        let mut uevent = Uevent { header, properties };
        uevent.properties.sort_by_key(|(k, _)| *k);
        Ok(uevent)
    }

    fn rescan() -> Self {
        Uevent {
            header: "rescan",
            properties: vec![("RESCAN", "true")],
        }
    }

    /// Gets the header.
    pub fn header(&self) -> &str {
        self.header
    }

    /// Gets a property by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let i = self
            .properties
            .binary_search_by_key(&key, |(k, _)| k)
            .ok()?;
        Some(self.properties[i].1)
    }

    /// Returns true for the synthetic event reported after an overflow.
    pub fn is_rescan(&self) -> bool {
        self.get("RESCAN") == Some("true")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_with_tracing::test;

    const CHANGE: &str = "change@/devices/LNXSYSTM:00/LNXSYBUS:00/QEMUVGID:00\0\
        ACTION=change\0\
        DEVPATH=/devices/LNXSYSTM:00/LNXSYBUS:00/QEMUVGID:00\0\
        SUBSYSTEM=acpi\0\
        NEW_VMGENID=1\0\
        SEQNUM=4821\0";

    #[test]
    fn parses_properties() {
        let event = Uevent::parse(CHANGE).unwrap();
        assert_eq!(
            event.header(),
            "change@/devices/LNXSYSTM:00/LNXSYBUS:00/QEMUVGID:00"
        );
        assert_eq!(event.get("ACTION"), Some("change"));
        assert_eq!(event.get("SUBSYSTEM"), Some("acpi"));
        assert_eq!(event.get("NEW_VMGENID"), Some("1"));
        assert_eq!(event.get("MISSING"), None);
        assert!(!event.is_rescan());
    }

    #[test]
    fn values_may_contain_equals() {
        let event = Uevent::parse("add@/x\0MODALIAS=acpi:QEMUVGID:=x\0").unwrap();
        assert_eq!(event.get("MODALIAS"), Some("acpi:QEMUVGID:=x"));
    }

    #[test]
    fn ignores_malformed_lines() {
        let event = Uevent::parse("remove@/x\0garbage\0\0ACTION=remove").unwrap();
        assert_eq!(event.get("ACTION"), Some("remove"));
        assert_eq!(event.properties.len(), 1);
    }

    #[test]
    fn rescan_event() {
        assert!(Uevent::rescan().is_rescan());
    }
}
