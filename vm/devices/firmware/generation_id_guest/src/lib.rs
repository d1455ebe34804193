// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Guest-side consumer of the virtual machine Generation ID.
//!
//! The hypervisor publishes a 128-bit value through an ACPI device with
//! hardware ID `QEMUVGID`. The device's `ADDR` method returns the physical
//! address of the value as a `{ low, high }` package of 32-bit integers. The
//! value changes whenever the VM is duplicated or restored from a snapshot,
//! and the platform sends an ACPI notification on the device when that
//! happens.
//!
//! This crate contains the platform-independent part of reading that value:
//!
//! * [`resolver`] evaluates `ADDR` and composes the physical address.
//! * [`window`] maps the address and copies the 16 bytes out with device-safe
//!   accesses.
//! * [`store`] holds the current address behind a short-held lock.
//! * [`presenter`] formats the value.
//! * [`handler`] drives the store from device add/notify/remove events.
//! * [`query`] serves reads of the current value.
//!
//! The firmware method evaluation and the physical memory mapping are
//! supplied by the caller through [`MethodEvaluator`] and [`PhysicalMapper`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod handler;
pub mod presenter;
pub mod query;
pub mod resolver;
pub mod store;
pub mod window;

#[cfg(test)]
mod test_helpers;

pub use handler::DeviceEvent;
pub use handler::NotificationHandler;
pub use presenter::GenerationId;
pub use query::GenerationIdReader;
pub use query::QueryError;
pub use resolver::AcpiObject;
pub use resolver::AcpiPath;
pub use resolver::AddressResolver;
pub use resolver::MethodEvaluator;
pub use resolver::PhysicalAddress;
pub use resolver::ResolveError;
pub use store::DeviceState;
pub use store::GenerationIdStore;
pub use window::MappedRegion;
pub use window::MemoryWindow;
pub use window::PhysicalMapper;
