use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::{join, signal};
use udmx_usb::device::{find_devices, find_ports, list_usb_devices};
use udmx_usb::{Connector, LibUsbProvider};

use crate::cli::{effective_level, Cli};
use crate::console::run_console;
use crate::primary_worker::{handle_changes, WorkerOptions};
use crate::settings::SettingsHandle;
use crate::shutdown::Shutdown;

mod cli;
mod console;
mod primary_worker;
mod settings;
mod shutdown;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Settings come first, the stored verbose flag feeds into the log level..
    let settings = SettingsHandle::load(args.config).await?;
    let level = effective_level(args.log_level, settings.get_verbose_logging().await);

    // The logger itself lets everything through, the global max level does the filtering so
    // verbose logging can be switched at runtime.
    CombinedLogger::init(vec![TermLogger::new(
        log::LevelFilter::Trace,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("Could not configure the logger")?;
    log::set_max_level(level);
    log_panics::init();

    if args.list {
        list_outputs();
        return Ok(());
    }

    if args.test {
        test_devices();
        return Ok(());
    }

    info!("Starting UDMX Daemon v{}", VERSION);
    let mut shutdown = Shutdown::new();

    let (usb_tx, usb_rx) = mpsc::channel(32);
    let usb_handle = tokio::spawn(handle_changes(
        usb_rx,
        shutdown.clone(),
        settings,
        LibUsbProvider,
        WorkerOptions {
            interval: Duration::from_millis(args.interval_ms),
            auto_connect: args.auto_connect,
            serial: args.serial,
            log_level: args.log_level,
        },
    ));

    let console_shutdown = shutdown.clone();
    let console_handle = tokio::spawn(async move {
        if let Err(e) = run_console(usb_tx, console_shutdown).await {
            error!("Console stopped: {}", e);
        }
    });

    // Setup Ctrl+C Monitoring..
    tokio::spawn(await_ctrl_c(shutdown.clone()));

    shutdown.recv().await;
    info!("Shutting down daemon");

    // The console is parked on stdin, nothing more to hear from it.
    console_handle.abort();
    let _ = join!(usb_handle);

    Ok(())
}

fn list_outputs() {
    let devices = find_devices();
    if devices.is_empty() {
        println!("No uDMX devices found");
    }
    for (index, device) in devices.iter().enumerate() {
        println!("[{}] {}", index, device);
    }

    for port in find_ports() {
        println!("{} ({})", port.path, port.description);
    }
}

fn test_devices() {
    let connector = Connector::new(LibUsbProvider);
    let devices = connector.enumerate();

    if devices.is_empty() {
        println!("No uDMX devices found, USB devices present:");
        for device in list_usb_devices() {
            println!("  {}", device);
        }
        return;
    }

    for device in devices {
        match connector.test_device(&device) {
            Ok(()) => println!("{}: OK", device),
            Err(e) => println!("{}: FAILED ({})", device, e),
        }
    }
}

async fn await_ctrl_c(shutdown: Shutdown) {
    if signal::ctrl_c().await.is_ok() {
        shutdown.trigger();
    }
}
