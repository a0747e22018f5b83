use crate::transmitter::{lock, SharedTransmitter};
use log::{debug, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, sleep, JoinHandle};
use std::time::Duration;

/// Background thread calling `send_frame` on a fixed interval.
///
/// The transmitter lock is held for the duration of a send, so anyone disconnecting through the
/// same lock waits for the in-flight transfer to complete before the handle is dropped.
pub struct FrameSender {
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameSender {
    pub fn spawn(transmitter: SharedTransmitter, interval: Duration) -> io::Result<Self> {
        let stopping = Arc::new(AtomicBool::new(false));
        let thread_stopping = stopping.clone();

        let handle = thread::Builder::new()
            .name(String::from("dmx-sender"))
            .spawn(move || {
                debug!("Frame sender started, interval {:?}", interval);
                while !thread_stopping.load(Ordering::Relaxed) {
                    lock(&transmitter).send_frame();
                    sleep(interval);
                }
                debug!("Frame sender stopped");
            })?;

        Ok(Self {
            stopping,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Flags the loop to stop, and waits for it to do so.
    pub fn stop(&mut self) {
        self.stopping.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Frame sender thread panicked");
            }
        }
    }
}

impl Drop for FrameSender {
    fn drop(&mut self) {
        self.stop();
    }
}
