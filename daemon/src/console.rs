use crate::primary_worker::{DaemonResponse, DeviceCommand, DeviceSender, QuickAction};
use crate::Shutdown;
use anyhow::{anyhow, Result};
use log::{debug, error, warn};
use std::io::BufRead;
use tokio::sync::{mpsc, oneshot};
use udmx_types::input::{pan_tilt, DEFAULT_DEADZONE};
use udmx_types::FixtureChannel;

const HELP: &str = "\
Commands:
  list                    List the connected uDMX devices
  connect [index]         Connect to a device (defaults to the last used one)
  serial <path>           Send through a serial DMX adapter instead
  ports                   List the available serial ports
  disconnect              Stop sending and release the device
  set <channel> <value>   Set a channel (1-512) to a value (0-255)
  get <channel>           Show the value of a channel
  stick <x> <y>           Move pan / tilt from a stick position (-1.0 to 1.0)
  off                     All fixture channels to 0
  full                    Dimmer to full
  reposition              Trigger a reposition (resets after 5 seconds)
  reset                   Every channel in the universe to 0
  status                  Show the connection and fixture state
  json                    Show the status as JSON
  verbose <on|off>        Switch debug logging on or off (saved in the settings)
  help                    Show this message
  quit                    Shut down the daemon";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    List,
    Ports,
    Connect(Option<usize>),
    Serial(String),
    Disconnect,
    Set(u16, u16),
    Get(u16),
    Stick(f32, f32),
    Action(QuickAction),
    Status,
    Json,
    Verbose(bool),
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Err(String::from("Empty command"));
    };
    let args: Vec<&str> = parts.collect();

    let command = match (command.to_lowercase().as_str(), args.as_slice()) {
        ("list", []) => ConsoleCommand::List,
        ("ports", []) => ConsoleCommand::Ports,
        ("connect", []) => ConsoleCommand::Connect(None),
        ("connect", [index]) => ConsoleCommand::Connect(Some(number(index)?)),
        ("serial", [path]) => ConsoleCommand::Serial(path.to_string()),
        ("disconnect", []) => ConsoleCommand::Disconnect,
        ("set", [channel, value]) => ConsoleCommand::Set(number(channel)?, number(value)?),
        ("get", [channel]) => ConsoleCommand::Get(number(channel)?),
        ("stick", [x, y]) => ConsoleCommand::Stick(axis(x)?, axis(y)?),
        ("off", []) => ConsoleCommand::Action(QuickAction::AllOff),
        ("full", []) => ConsoleCommand::Action(QuickAction::FullBrightness),
        ("reposition", []) => ConsoleCommand::Action(QuickAction::Reposition),
        ("reset", []) => ConsoleCommand::Action(QuickAction::Reset),
        ("status", []) => ConsoleCommand::Status,
        ("json", []) => ConsoleCommand::Json,
        ("verbose", ["on"]) => ConsoleCommand::Verbose(true),
        ("verbose", ["off"]) => ConsoleCommand::Verbose(false),
        ("help", []) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        (command, _) => {
            return Err(format!(
                "Unknown command or wrong arguments: {}, try 'help'",
                command
            ))
        }
    };
    Ok(command)
}

fn number<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Not a valid number: {}", value))
}

fn axis(value: &str) -> Result<f32, String> {
    let axis: f32 = value
        .parse()
        .map_err(|_| format!("Not a valid axis: {}", value))?;
    if !(-1.0..=1.0).contains(&axis) {
        return Err(format!("Axis out of range: {}", value));
    }
    Ok(axis)
}

/// Reads stdin on its own thread, a blocking read inside the runtime would hold up shutdown.
fn spawn_reader() -> Result<mpsc::Receiver<String>> {
    let (line_tx, line_rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name(String::from("console-reader"))
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Unable to read from stdin: {}", e);
                        break;
                    }
                }
            }
            debug!("Console input closed");
        })?;
    Ok(line_rx)
}

pub async fn run_console(usb_tx: DeviceSender, shutdown: Shutdown) -> Result<()> {
    let mut lines = spawn_reader()?;
    println!("Type 'help' for a list of commands");

    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(ConsoleCommand::Quit) => {
                shutdown.trigger();
                break;
            }
            Ok(command) => {
                if let Err(e) = handle_command(&usb_tx, command).await {
                    error!("{}", e);
                }
            }
            Err(message) => println!("{}", message),
        }
    }
    Ok(())
}

async fn request<T>(
    usb_tx: &DeviceSender,
    command: impl FnOnce(oneshot::Sender<T>) -> DeviceCommand,
) -> Result<T> {
    let (tx, rx) = oneshot::channel();
    usb_tx
        .send(command(tx))
        .await
        .map_err(|_| anyhow!("Device worker has stopped"))?;
    Ok(rx.await?)
}

fn print_response(response: DaemonResponse) {
    match response {
        DaemonResponse::Ok => println!("OK"),
        DaemonResponse::Error(message) => println!("Error: {}", message),
    }
}

async fn handle_command(usb_tx: &DeviceSender, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::List => {
            let devices = request(usb_tx, DeviceCommand::ListDevices).await?;
            if devices.is_empty() {
                println!("No uDMX devices found");
            }
            for (index, label) in devices.iter().enumerate() {
                println!("  [{}] {}", index, label);
            }
        }
        ConsoleCommand::Ports => {
            let ports = request(usb_tx, DeviceCommand::ListPorts).await?;
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                println!("  {} ({})", port.path, port.description);
            }
        }
        ConsoleCommand::Connect(index) => {
            print_response(request(usb_tx, |tx| DeviceCommand::Connect(index, tx)).await?);
        }
        ConsoleCommand::Serial(path) => {
            let response = request(usb_tx, |tx| DeviceCommand::ConnectSerial(path, tx)).await?;
            print_response(response);
        }
        ConsoleCommand::Disconnect => {
            print_response(request(usb_tx, DeviceCommand::Disconnect).await?);
        }
        ConsoleCommand::Set(channel, value) => {
            let response =
                request(usb_tx, |tx| DeviceCommand::SetChannel(channel, value, tx)).await?;
            print_response(response);
        }
        ConsoleCommand::Get(channel) => {
            match request(usb_tx, |tx| DeviceCommand::GetChannel(channel, tx)).await? {
                Some(value) => match FixtureChannel::from_number(channel) {
                    Some(fixture) => println!(
                        "Ch{} ({}) = {}  {}",
                        channel,
                        fixture,
                        value,
                        fixture.describe(value).unwrap_or("")
                    ),
                    None => println!("Ch{} = {}", channel, value),
                },
                None => println!("Error: Invalid channel {}", channel),
            }
        }
        ConsoleCommand::Stick(x, y) => {
            for (channel, value) in pan_tilt(x, y, DEFAULT_DEADZONE) {
                let channel_number = channel.number();
                let response = request(usb_tx, |tx| {
                    DeviceCommand::SetChannel(channel_number, value as u16, tx)
                })
                .await?;
                if let DaemonResponse::Error(message) = response {
                    println!("Error: {}", message);
                    return Ok(());
                }
                println!("{} = {}", channel, value);
            }
        }
        ConsoleCommand::Action(action) => {
            print_response(request(usb_tx, |tx| DeviceCommand::RunAction(action, tx)).await?);
        }
        ConsoleCommand::Status => {
            let status = request(usb_tx, DeviceCommand::SendDaemonStatus).await?;
            match &status.device {
                Some(device) => println!("{:?}: {}", status.state, device),
                None => println!("{:?}", status.state),
            }
            match status.fps {
                Some(fps) => println!(
                    "  {}, FPS: {:.1} ({}ms interval)",
                    status.statistics, fps, status.interval_ms
                ),
                None => println!("  {}", status.statistics),
            }
            for (channel, value) in status.channels.iter() {
                println!(
                    "  Ch{} {:<16} {:>3}  {}",
                    channel.number(),
                    channel.to_string(),
                    value,
                    channel.describe(*value).unwrap_or("")
                );
            }
        }
        ConsoleCommand::Json => {
            let status = request(usb_tx, DeviceCommand::SendDaemonStatus).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        ConsoleCommand::Verbose(enabled) => {
            let response =
                request(usb_tx, |tx| DeviceCommand::SetVerboseLogging(enabled, tx)).await?;
            print_response(response);
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("list"), Ok(ConsoleCommand::List));
        assert_eq!(parse_command("  connect  "), Ok(ConsoleCommand::Connect(None)));
        assert_eq!(parse_command("connect 2"), Ok(ConsoleCommand::Connect(Some(2))));
        assert_eq!(parse_command("SET 6 255"), Ok(ConsoleCommand::Set(6, 255)));
        assert_eq!(parse_command("get 512"), Ok(ConsoleCommand::Get(512)));
        assert_eq!(
            parse_command("serial /dev/ttyUSB0"),
            Ok(ConsoleCommand::Serial(String::from("/dev/ttyUSB0")))
        );
        assert_eq!(
            parse_command("reposition"),
            Ok(ConsoleCommand::Action(QuickAction::Reposition))
        );
        assert_eq!(parse_command("stick -1 0.5"), Ok(ConsoleCommand::Stick(-1.0, 0.5)));
        assert_eq!(parse_command("exit"), Ok(ConsoleCommand::Quit));
        assert_eq!(parse_command("verbose on"), Ok(ConsoleCommand::Verbose(true)));
        assert_eq!(parse_command("Verbose off"), Ok(ConsoleCommand::Verbose(false)));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("set 6").is_err());
        assert!(parse_command("set six 255").is_err());
        assert!(parse_command("set -1 255").is_err());
        assert!(parse_command("connect a").is_err());
        assert!(parse_command("stick 1.5 0").is_err());
        assert!(parse_command("dance").is_err());
        assert!(parse_command("verbose").is_err());
        assert!(parse_command("verbose maybe").is_err());
    }
}
