use log::{debug, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use udmx_types::UNIVERSE_SIZE;

/// The 512 channel values of a single DMX universe.
///
/// Cloning a `Universe` hands out another reference to the same channel values, so input
/// handling can write while the sender thread reads. Every channel is its own atomic, a reader
/// will always see a value that was written at some point, but a change spanning multiple
/// channels is not guaranteed to land in the same frame.
#[derive(Clone)]
pub struct Universe {
    channels: Arc<[AtomicU8; UNIVERSE_SIZE]>,
}

impl Universe {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(std::array::from_fn(|_| AtomicU8::new(0))),
        }
    }

    /// Sets a 1-based DMX channel. Out of range channels or values are logged and ignored,
    /// returns whether the value was written.
    pub fn set_channel(&self, channel: u16, value: u16) -> bool {
        if !(1..=UNIVERSE_SIZE as u16).contains(&channel) || value > u8::MAX as u16 {
            warn!("Invalid channel/value: Ch{}={}", channel, value);
            return false;
        }

        let value = value as u8;
        let old = self.channels[channel as usize - 1].swap(value, Ordering::Relaxed);
        if old != value {
            debug!("Channel {}: {} -> {}", channel, old, value);
        }
        true
    }

    pub fn get_channel(&self, channel: u16) -> Option<u8> {
        if !(1..=UNIVERSE_SIZE as u16).contains(&channel) {
            return None;
        }
        Some(self.channels[channel as usize - 1].load(Ordering::Relaxed))
    }

    /// Copies the current channel values out, this is what gets transmitted.
    pub fn snapshot(&self) -> [u8; UNIVERSE_SIZE] {
        std::array::from_fn(|index| self.channels[index].load(Ordering::Relaxed))
    }

    pub fn clear(&self) {
        debug!("Resetting all channels to 0");
        for channel in self.channels.iter() {
            channel.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Universe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.snapshot().iter().filter(|value| **value != 0).count();
        f.debug_struct("Universe")
            .field("active_channels", &active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_dark() {
        assert_eq!(Universe::new().snapshot(), [0; UNIVERSE_SIZE]);
    }

    #[test]
    fn set_channel_only_touches_its_own_slot() {
        let universe = Universe::new();
        for (channel, value) in [(1, 255), (6, 128), (512, 1), (300, 0)] {
            let before = universe.snapshot();
            assert!(universe.set_channel(channel, value));

            let after = universe.snapshot();
            for index in 0..UNIVERSE_SIZE {
                if index == channel as usize - 1 {
                    assert_eq!(after[index], value as u8);
                } else {
                    assert_eq!(after[index], before[index]);
                }
            }
        }
    }

    #[test]
    fn out_of_range_requests_are_ignored() {
        let universe = Universe::new();
        universe.set_channel(9, 42);
        let before = universe.snapshot();

        assert!(!universe.set_channel(0, 10));
        assert!(!universe.set_channel(513, 10));
        assert!(!universe.set_channel(5, 256));
        assert!(!universe.set_channel(u16::MAX, u16::MAX));

        assert_eq!(universe.snapshot(), before);
    }

    #[test]
    fn rewriting_the_same_value_is_accepted() {
        let universe = Universe::new();
        assert!(universe.set_channel(3, 77));
        assert!(universe.set_channel(3, 77));
        assert_eq!(universe.get_channel(3), Some(77));
    }

    #[test]
    fn clones_share_channels() {
        let universe = Universe::new();
        let writer = universe.clone();
        writer.set_channel(2, 99);
        assert_eq!(universe.get_channel(2), Some(99));
        assert_eq!(universe.get_channel(0), None);

        universe.clear();
        assert_eq!(writer.snapshot(), [0; UNIVERSE_SIZE]);
    }
}
