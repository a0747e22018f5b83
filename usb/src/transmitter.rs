use crate::device::base::{DmxOutput, SendPath};
use crate::statistics::SessionStatistics;
use crate::universe::Universe;
use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use udmx_types::{ConnectionState, StatisticsSnapshot};

pub type SharedTransmitter = Arc<Mutex<Transmitter>>;

/// Pushes the universe out to whatever output is currently attached. There's no clock in here,
/// whoever owns the transmitter calls `send_frame` on their own schedule (see `FrameSender`).
pub struct Transmitter {
    universe: Universe,
    statistics: Arc<SessionStatistics>,
    output: Option<Box<dyn DmxOutput>>,
    device: Option<String>,
    send_path: Option<SendPath>,
}

impl Transmitter {
    pub fn new(universe: Universe) -> Self {
        debug!("DMX Transmitter initialised, universe size: 512 channels");
        Self {
            universe,
            statistics: Arc::new(SessionStatistics::new()),
            output: None,
            device: None,
            send_path: None,
        }
    }

    pub fn shared(self) -> SharedTransmitter {
        Arc::new(Mutex::new(self))
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn statistics(&self) -> Arc<SessionStatistics> {
        self.statistics.clone()
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    pub fn state(&self) -> ConnectionState {
        match self.output {
            Some(_) => ConnectionState::Connected,
            None => ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Label of the device frames are currently going to.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn set_channel(&self, channel: u16, value: u16) -> bool {
        self.universe.set_channel(channel, value)
    }

    /// Starts a new session on the provided output, any previous session is ended first.
    pub(crate) fn attach(&mut self, device: String, output: Box<dyn DmxOutput>) {
        self.release();

        self.statistics.reset();
        self.send_path = None;
        self.output = Some(output);
        self.device = Some(device);
    }

    /// Ends the session and drops the output (and with it the device handle). Returns false if
    /// there was nothing to release.
    pub(crate) fn release(&mut self) -> bool {
        let Some(output) = self.output.take() else {
            return false;
        };

        let device = self.device.take().unwrap_or_default();
        info!("Disconnecting from {}", device);
        info!(
            "Session stats - Frames sent: {}, Errors: {}",
            self.statistics.frames(),
            self.statistics.errors()
        );

        drop(output);
        info!("Device disconnected successfully");
        true
    }

    pub fn send_frame(&mut self) {
        let Some(output) = self.output.as_mut() else {
            return;
        };

        let start = Instant::now();
        let universe = self.universe.snapshot();

        match output.send_universe(&universe) {
            Ok(path) => {
                let elapsed = start.elapsed();
                if self.send_path != Some(path) {
                    debug!("Sending frames using {:?}", path);
                    self.send_path = Some(path);
                }

                let frames = self.statistics.record_frame(elapsed);
                if frames % 1000 == 0 {
                    debug!(
                        "Frames sent: {}, Last frame time: {:.2}ms",
                        frames,
                        elapsed.as_secs_f64() * 1000.0
                    );
                }
            }
            Err(err) => {
                // A dead link fails every 25ms, only surface some of them..
                let errors = self.statistics.record_error();
                if errors % 10 == 1 {
                    error!("Send error ({} so far): {}", errors, err);
                }
            }
        }
    }
}

pub fn lock(transmitter: &SharedTransmitter) -> MutexGuard<'_, Transmitter> {
    transmitter.lock().unwrap_or_else(PoisonError::into_inner)
}
