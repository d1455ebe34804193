// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Follows Generation ID device events reported as kobject uevents.

use crate::discover;
use crate::discover::Device;
use generation_id_guest::DeviceEvent;
use generation_id_guest::GenerationIdReader;
use generation_id_guest::MethodEvaluator;
use generation_id_guest::NotificationHandler;
use generation_id_guest::PhysicalMapper;
use std::io::Write;
use std::path::Path;
use uevent::Uevent;
use uevent::UeventListener;

/// Notification code the platform uses to signal a new Generation ID.
const GENERATION_CHANGED: u32 = 0x80;

/// What a uevent means for the Generation ID device.
#[derive(Debug, PartialEq, Eq)]
pub enum WatchEvent<'a> {
    /// An event for the device instance `name`.
    Device { name: &'a str, event: DeviceEvent },
    /// Events may have been lost.
    Rescan,
}

/// Maps a uevent to a device event, or `None` if it is unrelated.
pub fn classify<'a>(uevent: &'a Uevent<'_>) -> Option<WatchEvent<'a>> {
    if uevent.is_rescan() {
        return Some(WatchEvent::Rescan);
    }
    let name = uevent.get("DEVPATH")?.rsplit('/').next()?;
    if !discover::is_generation_id_device(name) {
        return None;
    }
    let event = match uevent.get("ACTION")? {
        "add" => DeviceEvent::Add,
        "remove" => DeviceEvent::Remove,
        "change" => DeviceEvent::Notify(GENERATION_CHANGED),
        _ => return None,
    };
    Some(WatchEvent::Device { name, event })
}

/// Dispatches device events to the handler and prints the value after each
/// successful add or notify.
pub struct Watcher<'a, E, M, W> {
    pub handler: &'a NotificationHandler<E>,
    pub reader: &'a GenerationIdReader<M>,
    pub sysfs: &'a Path,
    pub out: W,
    pub device: Option<Device>,
}

impl<E: MethodEvaluator, M: PhysicalMapper, W: Write> Watcher<'_, E, M, W> {
    /// Blocks forever, handling events from `listener`.
    pub fn run(&mut self, listener: &mut UeventListener) -> anyhow::Result<()> {
        loop {
            let uevent = listener.next_event()?;
            if let Some(event) = classify(&uevent) {
                self.handle(event)?;
            }
        }
    }

    /// Handles one event. Only failures writing the output are returned.
    pub fn handle(&mut self, event: WatchEvent<'_>) -> anyhow::Result<()> {
        let (device, event) = match event {
            WatchEvent::Device { name, event } => {
                let device = match (&self.device, event) {
                    (Some(device), DeviceEvent::Notify(_) | DeviceEvent::Remove)
                        if device.name == name =>
                    {
                        device.clone()
                    }
                    (_, DeviceEvent::Remove) => {
                        tracing::debug!(name, "ignoring removal of unbound device");
                        return Ok(());
                    }
                    _ => match discover::device(self.sysfs, name) {
                        Ok(device) => device,
                        Err(err) => {
                            tracing::warn!(
                                error = &*err as &dyn std::error::Error,
                                name,
                                "failed to look up generation ID device"
                            );
                            return Ok(());
                        }
                    },
                };
                (device, event)
            }
            WatchEvent::Rescan => match &self.device {
                Some(device) => (device.clone(), DeviceEvent::Notify(GENERATION_CHANGED)),
                None => match discover::find(self.sysfs) {
                    Ok(Some(device)) => (device, DeviceEvent::Add),
                    Ok(None) => return Ok(()),
                    Err(err) => {
                        tracing::warn!(
                            error = &*err as &dyn std::error::Error,
                            "failed to rescan for generation ID device"
                        );
                        return Ok(());
                    }
                },
            },
        };

        self.apply(device, event)
    }

    /// Binds `device`, as if it had just been added.
    pub fn attach(&mut self, device: Device) -> anyhow::Result<()> {
        self.apply(device, DeviceEvent::Add)
    }

    fn apply(&mut self, device: Device, event: DeviceEvent) -> anyhow::Result<()> {
        // Failures are logged by the handler; keep waiting for the next event.
        match self.handler.dispatch(&device.path, event) {
            Ok(Some(_)) => {
                self.device = Some(device);
                self.print()
            }
            Ok(None) => {
                self.device = None;
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    fn print(&mut self) -> anyhow::Result<()> {
        match self.reader.generation_id() {
            Ok(id) => {
                tracing::info!(id = id.trim_end(), "generation ID");
                self.out.write_all(id.as_bytes())?;
                self.out.flush()?;
            }
            Err(err) => {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    "failed to read generation ID"
                );
            }
        }
        Ok(())
    }
}
