use crate::cli::{effective_level, LevelFilter};
use crate::{SettingsHandle, Shutdown};
use enum_map::EnumMap;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot};
use tokio::task::block_in_place;
use tokio::time::{sleep, Instant};
use udmx_types::{ConnectionState, FixtureChannel, StatisticsSnapshot};
use udmx_usb::device::base::DeviceProvider;
use udmx_usb::device::{find_ports, SerialPortEntry};
use udmx_usb::statistics::SessionStatistics;
use udmx_usb::transmitter::lock;
use udmx_usb::{Connector, FrameSender, SharedTransmitter, Transmitter, Universe};

const REPOSITION_TIME: Duration = Duration::from_secs(5);
const REPORT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuickAction {
    /// All fixture channels to 0
    AllOff,
    /// Dimmer to full
    FullBrightness,
    /// Trigger the reposition, reset after 5 seconds
    Reposition,
    /// The whole universe to 0
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonResponse {
    Ok,
    Error(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub state: ConnectionState,
    pub device: Option<String>,
    pub statistics: StatisticsSnapshot,
    pub interval_ms: u64,
    pub fps: Option<f64>,
    pub channels: EnumMap<FixtureChannel, u8>,
}

pub enum DeviceCommand {
    ListDevices(oneshot::Sender<Vec<String>>),
    ListPorts(oneshot::Sender<Vec<SerialPortEntry>>),
    Connect(Option<usize>, oneshot::Sender<DaemonResponse>),
    ConnectSerial(String, oneshot::Sender<DaemonResponse>),
    Disconnect(oneshot::Sender<DaemonResponse>),
    SetChannel(u16, u16, oneshot::Sender<DaemonResponse>),
    GetChannel(u16, oneshot::Sender<Option<u8>>),
    RunAction(QuickAction, oneshot::Sender<DaemonResponse>),
    SetVerboseLogging(bool, oneshot::Sender<DaemonResponse>),
    SendDaemonStatus(oneshot::Sender<DaemonStatus>),
}

pub type DeviceSender = mpsc::Sender<DeviceCommand>;
pub type DeviceReceiver = mpsc::Receiver<DeviceCommand>;

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub interval: Duration,
    pub auto_connect: bool,
    pub serial: Option<String>,

    /// The level asked for on the command line, verbose logging raises it from here.
    pub log_level: LevelFilter,
}

// Opening a device and joining the sender both block, a libusb transfer can take up to a second.
// On a multi threaded runtime let the other tasks carry on while that happens.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => block_in_place(f),
        _ => f(),
    }
}

/// Owns the connector, the shared transmitter, and the sender thread feeding it.
pub struct DeviceWorker<P: DeviceProvider> {
    connector: Connector<P>,
    transmitter: SharedTransmitter,
    universe: Universe,
    statistics: Arc<SessionStatistics>,
    sender: Option<FrameSender>,
    interval: Duration,
}

impl<P: DeviceProvider> DeviceWorker<P> {
    pub fn new(provider: P, interval: Duration) -> Self {
        let transmitter = Transmitter::new(Universe::new());
        let universe = transmitter.universe().clone();
        let statistics = transmitter.statistics();

        Self {
            connector: Connector::new(provider),
            transmitter: transmitter.shared(),
            universe,
            statistics,
            sender: None,
            interval,
        }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn device_labels(&self) -> Vec<String> {
        self.connector
            .enumerate()
            .iter()
            .map(|device| device.label())
            .collect()
    }

    pub fn connect(&mut self, index: usize) -> Option<String> {
        let connected = run_blocking(|| {
            let mut transmitter = lock(&self.transmitter);
            self.connector.connect(&mut transmitter, index)
        });
        self.after_connect(connected)
    }

    /// Connects to the device with the matching label, or the first one if it's gone.
    pub fn connect_label(&mut self, label: Option<&str>) -> Option<String> {
        let index = label
            .and_then(|label| self.connector.index_of(label))
            .unwrap_or(0);
        self.connect(index)
    }

    pub fn connect_serial(&mut self, path: &str) -> Option<String> {
        let connected = run_blocking(|| {
            let mut transmitter = lock(&self.transmitter);
            self.connector.connect_serial(&mut transmitter, path)
        });
        self.after_connect(connected)
    }

    fn after_connect(&mut self, connected: bool) -> Option<String> {
        if !connected {
            // The old session is gone either way, nothing left for the sender to do
            if let Some(mut sender) = self.sender.take() {
                run_blocking(|| sender.stop());
            }
            return None;
        }

        if !self.sender.as_ref().is_some_and(FrameSender::is_running) {
            match FrameSender::spawn(self.transmitter.clone(), self.interval) {
                Ok(sender) => self.sender = Some(sender),
                Err(e) => {
                    error!("Unable to start the frame sender: {}", e);
                    self.disconnect();
                    return None;
                }
            }
        }
        lock(&self.transmitter).device().map(String::from)
    }

    /// Stops the sender (waiting on any transfer in flight), then releases the device.
    pub fn disconnect(&mut self) {
        let sender = self.sender.take();
        run_blocking(|| {
            if let Some(mut sender) = sender {
                sender.stop();
            }
            let mut transmitter = lock(&self.transmitter);
            self.connector.disconnect(&mut transmitter);
        });
    }

    pub fn set_channel(&self, channel: u16, value: u16) -> bool {
        self.universe.set_channel(channel, value)
    }

    pub fn run_action(&self, action: QuickAction) {
        match action {
            QuickAction::AllOff => {
                info!("All channels off command");
                for channel in FixtureChannel::iter() {
                    self.universe.set_channel(channel.number(), 0);
                }
            }
            QuickAction::FullBrightness => {
                info!("Full brightness command");
                self.universe
                    .set_channel(FixtureChannel::Dimmer.number(), u8::MAX as u16);
            }
            QuickAction::Reposition => {
                info!("Reposition command initiated (5 seconds)");
                self.universe
                    .set_channel(FixtureChannel::Reposition.number(), u8::MAX as u16);
            }
            QuickAction::Reset => {
                info!("Resetting the universe");
                self.universe.clear();
            }
        }
    }

    pub fn finish_reposition(&self) {
        self.universe
            .set_channel(FixtureChannel::Reposition.number(), 0);
        info!("Reposition completed");
    }

    pub fn status(&self) -> DaemonStatus {
        let transmitter = lock(&self.transmitter);
        let statistics = self.statistics.snapshot();
        DaemonStatus {
            state: transmitter.state(),
            device: transmitter.device().map(String::from),
            statistics,
            interval_ms: u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            fps: statistics.estimated_fps(self.interval),
            channels: EnumMap::from_fn(|channel: FixtureChannel| {
                self.universe.get_channel(channel.number()).unwrap_or(0)
            }),
        }
    }
}

pub async fn handle_changes<P: DeviceProvider>(
    mut command_rx: DeviceReceiver,
    mut shutdown: Shutdown,
    settings: SettingsHandle,
    provider: P,
    options: WorkerOptions,
) {
    let mut worker = DeviceWorker::new(provider, options.interval);

    if let Some(path) = &options.serial {
        if worker.connect_serial(path).is_none() {
            warn!("Unable to start on serial port {}", path);
        }
    } else if options.auto_connect {
        let last_device = settings.get_last_device().await;
        if let Some(label) = worker.connect_label(last_device.as_deref()) {
            settings.set_last_device(label).await;
            settings.save().await;
        }
    }

    // Periodic summary of the session, so long runs leave something in the log..
    let report_sleep = sleep(REPORT_INTERVAL);
    tokio::pin!(report_sleep);

    // Handles putting channel 9 back after a reposition..
    let reposition_sleep = sleep(Duration::from_millis(0));
    tokio::pin!(reposition_sleep);
    let mut reposition_pending = false;

    loop {
        tokio::select! {
            () = &mut report_sleep => {
                let status = worker.status();
                if status.state == ConnectionState::Connected {
                    match status.fps {
                        Some(fps) => debug!("Session: {}, FPS: {:.1}", status.statistics, fps),
                        None => debug!("Session: {}", status.statistics),
                    }
                }
                report_sleep.as_mut().reset(Instant::now() + REPORT_INTERVAL);
            },
            () = &mut reposition_sleep, if reposition_pending => {
                worker.finish_reposition();
                reposition_pending = false;
            },
            () = shutdown.recv() => {
                info!("Shutting down device worker");
                worker.disconnect();
                settings.save().await;
                return;
            },
            Some(command) = command_rx.recv() => {
                match command {
                    DeviceCommand::ListDevices(sender) => {
                        let _ = sender.send(worker.device_labels());
                    }
                    DeviceCommand::ListPorts(sender) => {
                        let _ = sender.send(find_ports());
                    }
                    DeviceCommand::Connect(index, sender) => {
                        let result = match index {
                            Some(index) => worker.connect(index),
                            None => {
                                let last_device = settings.get_last_device().await;
                                worker.connect_label(last_device.as_deref())
                            }
                        };
                        let _ = sender.send(match result {
                            Some(label) => {
                                settings.set_last_device(label).await;
                                settings.save().await;
                                DaemonResponse::Ok
                            }
                            None => DaemonResponse::Error(String::from(
                                "Failed to connect to a uDMX device",
                            )),
                        });
                    }
                    DeviceCommand::ConnectSerial(path, sender) => {
                        let _ = sender.send(match worker.connect_serial(&path) {
                            Some(_) => DaemonResponse::Ok,
                            None => DaemonResponse::Error(format!("Failed to open {}", path)),
                        });
                    }
                    DeviceCommand::Disconnect(sender) => {
                        worker.disconnect();
                        let _ = sender.send(DaemonResponse::Ok);
                    }
                    DeviceCommand::SetChannel(channel, value, sender) => {
                        let _ = sender.send(match worker.set_channel(channel, value) {
                            true => DaemonResponse::Ok,
                            false => DaemonResponse::Error(format!(
                                "Invalid channel/value: Ch{}={}",
                                channel, value
                            )),
                        });
                    }
                    DeviceCommand::GetChannel(channel, sender) => {
                        let _ = sender.send(worker.universe().get_channel(channel));
                    }
                    DeviceCommand::RunAction(action, sender) => {
                        worker.run_action(action);
                        if action == QuickAction::Reposition {
                            reposition_sleep.as_mut().reset(Instant::now() + REPOSITION_TIME);
                            reposition_pending = true;
                        }
                        let _ = sender.send(DaemonResponse::Ok);
                    }
                    DeviceCommand::SetVerboseLogging(enabled, sender) => {
                        let level = effective_level(options.log_level, enabled);
                        log::set_max_level(level);
                        info!("Log level set to {}", level);

                        settings.set_verbose_logging(enabled).await;
                        settings.save().await;
                        let _ = sender.send(DaemonResponse::Ok);
                    }
                    DeviceCommand::SendDaemonStatus(sender) => {
                        let _ = sender.send(worker.status());
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udmx_usb::device::base::ControlTransport;
    use udmx_usb::devices::{DeviceDescriptor, SUPPORTED_DEVICES};
    use udmx_usb::error::ConnectError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use udmx_usb::rusb;

    const ANYMA: &str = "Anyma uDMX (VID:16C0 PID:05DC)";
    const DMXCONTROL: &str = "DMXControl uDMX (VID:03EB PID:8888)";

    struct NullTransport;

    impl ControlTransport for NullTransport {
        fn write_control(&mut self, _: u8, _: u16, _: u16, _: &[u8]) -> Result<(), rusb::Error> {
            Ok(())
        }

        fn detach_kernel_driver(&mut self) -> Result<bool, rusb::Error> {
            Ok(false)
        }

        fn set_configuration(&mut self) -> Result<(), rusb::Error> {
            Ok(())
        }
    }

    struct SingleDevice;

    impl DeviceProvider for SingleDevice {
        fn find_devices(&self) -> Vec<DeviceDescriptor> {
            vec![DeviceDescriptor::new(&SUPPORTED_DEVICES[1], 1, 2)]
        }

        fn open(&self, _: &DeviceDescriptor) -> Result<Box<dyn ControlTransport>, ConnectError> {
            Ok(Box::new(NullTransport))
        }
    }

    // Keeps count of the handles currently held open
    struct CountedTransport {
        open: Arc<AtomicUsize>,
    }

    impl Drop for CountedTransport {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl ControlTransport for CountedTransport {
        fn write_control(&mut self, _: u8, _: u16, _: u16, _: &[u8]) -> Result<(), rusb::Error> {
            Ok(())
        }

        fn detach_kernel_driver(&mut self) -> Result<bool, rusb::Error> {
            Ok(false)
        }

        fn set_configuration(&mut self) -> Result<(), rusb::Error> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct TwoDevices {
        open: Arc<AtomicUsize>,
    }

    impl DeviceProvider for TwoDevices {
        fn find_devices(&self) -> Vec<DeviceDescriptor> {
            vec![
                DeviceDescriptor::new(&SUPPORTED_DEVICES[0], 1, 2),
                DeviceDescriptor::new(&SUPPORTED_DEVICES[1], 1, 3),
            ]
        }

        fn open(&self, _: &DeviceDescriptor) -> Result<Box<dyn ControlTransport>, ConnectError> {
            self.open.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountedTransport {
                open: self.open.clone(),
            }))
        }
    }

    fn options(auto_connect: bool) -> WorkerOptions {
        WorkerOptions {
            interval: Duration::from_millis(5),
            auto_connect,
            serial: None,
            log_level: LevelFilter::Info,
        }
    }

    async fn request<T>(
        usb_tx: &DeviceSender,
        command: impl FnOnce(oneshot::Sender<T>) -> DeviceCommand,
    ) -> T {
        let (tx, rx) = oneshot::channel();
        usb_tx.send(command(tx)).await.unwrap();
        rx.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn worker_loop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = SettingsHandle::load(path.clone()).await.unwrap();
        settings.set_last_device(String::from(DMXCONTROL)).await;

        let provider = TwoDevices::default();
        let open = provider.open.clone();
        let shutdown = Shutdown::new();
        let (usb_tx, usb_rx) = mpsc::channel(8);
        let handle = tokio::spawn(handle_changes(
            usb_rx,
            shutdown.clone(),
            settings.clone(),
            provider,
            options(true),
        ));

        // Auto connect goes by label, not position
        let status = request(&usb_tx, DeviceCommand::SendDaemonStatus).await;
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.device.as_deref(), Some(DMXCONTROL));
        assert_eq!(status.interval_ms, 5);

        let response = request(&usb_tx, |tx| {
            DeviceCommand::RunAction(QuickAction::Reposition, tx)
        })
        .await;
        assert_eq!(response, DaemonResponse::Ok);
        let status = request(&usb_tx, DeviceCommand::SendDaemonStatus).await;
        assert_eq!(status.channels[FixtureChannel::Reposition], 255);

        sleep(Duration::from_secs(4)).await;
        let status = request(&usb_tx, DeviceCommand::SendDaemonStatus).await;
        assert_eq!(status.channels[FixtureChannel::Reposition], 255);

        sleep(Duration::from_secs(2)).await;
        let status = request(&usb_tx, DeviceCommand::SendDaemonStatus).await;
        assert_eq!(status.channels[FixtureChannel::Reposition], 0);

        // Switching device is remembered, and the old handle is released
        let response = request(&usb_tx, |tx| DeviceCommand::Connect(Some(0), tx)).await;
        assert_eq!(response, DaemonResponse::Ok);
        assert_eq!(settings.get_last_device().await.as_deref(), Some(ANYMA));
        assert_eq!(open.load(Ordering::SeqCst), 1);

        shutdown.trigger();
        handle.await.unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 0);

        let reloaded = SettingsHandle::load(path).await.unwrap();
        assert_eq!(reloaded.get_last_device().await.as_deref(), Some(ANYMA));
    }

    #[tokio::test]
    async fn verbose_logging_is_applied_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = SettingsHandle::load(path.clone()).await.unwrap();

        let shutdown = Shutdown::new();
        let (usb_tx, usb_rx) = mpsc::channel(8);
        let handle = tokio::spawn(handle_changes(
            usb_rx,
            shutdown.clone(),
            settings.clone(),
            TwoDevices::default(),
            options(false),
        ));

        let response = request(&usb_tx, |tx| DeviceCommand::SetVerboseLogging(true, tx)).await;
        assert_eq!(response, DaemonResponse::Ok);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);
        let reloaded = SettingsHandle::load(path.clone()).await.unwrap();
        assert!(reloaded.get_verbose_logging().await);

        request(&usb_tx, |tx| DeviceCommand::SetVerboseLogging(false, tx)).await;
        assert_eq!(log::max_level(), log::LevelFilter::Info);
        assert!(!settings.get_verbose_logging().await);

        // Nothing was connected, so nothing to release
        let status = request(&usb_tx, DeviceCommand::SendDaemonStatus).await;
        assert_eq!(status.state, ConnectionState::Disconnected);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[test]
    fn quick_actions() {
        let worker = DeviceWorker::new(SingleDevice, Duration::from_millis(25));
        for channel in 1..=9 {
            worker.set_channel(channel, 100);
        }
        worker.set_channel(100, 7);

        worker.run_action(QuickAction::AllOff);
        let status = worker.status();
        assert!(status.channels.values().all(|value| *value == 0));
        assert_eq!(worker.universe().get_channel(100), Some(7));

        worker.run_action(QuickAction::FullBrightness);
        assert_eq!(worker.status().channels[FixtureChannel::Dimmer], 255);

        worker.run_action(QuickAction::Reposition);
        assert_eq!(worker.status().channels[FixtureChannel::Reposition], 255);
        worker.finish_reposition();
        assert_eq!(worker.status().channels[FixtureChannel::Reposition], 0);

        worker.run_action(QuickAction::Reset);
        assert_eq!(worker.universe().get_channel(100), Some(0));
    }

    #[test]
    fn connect_starts_and_disconnect_stops_sending() {
        let mut worker = DeviceWorker::new(SingleDevice, Duration::from_millis(5));
        assert_eq!(worker.status().state, ConnectionState::Disconnected);

        let label = worker.connect_label(Some("Not Present"));
        assert_eq!(label.as_deref(), Some("DMXControl uDMX (VID:03EB PID:8888)"));
        assert_eq!(worker.status().state, ConnectionState::Connected);

        std::thread::sleep(Duration::from_millis(50));
        worker.disconnect();
        let status = worker.status();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(status.statistics.frames > 0);

        // A second disconnect is a no-op
        worker.disconnect();
        assert_eq!(worker.status().state, ConnectionState::Disconnected);
    }

    #[test]
    fn status_serialises() {
        let worker = DeviceWorker::new(SingleDevice, Duration::from_millis(25));
        worker.set_channel(6, 200);
        let json = serde_json::to_value(worker.status()).unwrap();
        assert_eq!(json["state"], "Disconnected");
        assert_eq!(json["interval_ms"], 25);
        assert!(json["fps"].is_null());
        assert_eq!(json["channels"]["Dimmer"], 200);
    }
}
