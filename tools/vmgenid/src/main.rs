// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Command-line reader for the virtual machine Generation ID.

mod cli_args;
#[cfg(target_os = "linux")]
mod discover;
mod tracing_init;
#[cfg(target_os = "linux")]
mod watch;

use clap::Parser;
use cli_args::Options;

fn main() -> anyhow::Result<()> {
    tracing_init::enable_tracing()?;
    let opts = Options::parse();
    do_main(opts)
}

#[cfg(not(target_os = "linux"))]
fn do_main(_opts: Options) -> anyhow::Result<()> {
    anyhow::bail!("the generation ID device is only supported on Linux")
}

#[cfg(target_os = "linux")]
fn do_main(opts: Options) -> anyhow::Result<()> {
    use acpi_call::AcpiCallEvaluator;
    use anyhow::Context;
    use cli_args::Command;
    use devmem::DevMem;
    use generation_id_guest::GenerationIdReader;
    use generation_id_guest::GenerationIdStore;
    use generation_id_guest::NotificationHandler;
    use std::io::Write;
    use std::sync::Arc;

    let store = Arc::new(GenerationIdStore::new());
    let handler = NotificationHandler::new(store.clone(), AcpiCallEvaluator::new(&opts.acpi_call));
    let reader = GenerationIdReader::new(store, DevMem::open_path(&opts.mem)?);

    match opts.command {
        Command::Show | Command::Raw => {
            let device = select_device(&opts)?.context("no generation ID device found")?;
            handler.on_add(&device.path)?;
            let mut stdout = std::io::stdout().lock();
            if let Command::Show = opts.command {
                stdout.write_all(reader.generation_id()?.as_bytes())?;
            } else {
                stdout.write_all(&reader.raw()?)?;
            }
            stdout.flush()?;
            Ok(())
        }
        Command::Watch => {
            // Subscribe before looking for the device so that no event is
            // missed in between.
            let mut listener = uevent::UeventListener::new()?;
            let mut watcher = watch::Watcher {
                handler: &handler,
                reader: &reader,
                sysfs: &opts.sysfs,
                out: std::io::stdout(),
                device: None,
            };
            match select_device(&opts)? {
                Some(device) => watcher.attach(device)?,
                None => tracing::info!("waiting for generation ID device"),
            }
            watcher.run(&mut listener)
        }
    }
}

#[cfg(target_os = "linux")]
fn select_device(opts: &Options) -> anyhow::Result<Option<discover::Device>> {
    match &opts.device {
        Some(path) => Ok(Some(discover::Device {
            name: String::new(),
            path: generation_id_guest::AcpiPath::new(path.as_str()),
        })),
        None => discover::find(&opts.sysfs),
    }
}
