use enum_map::Enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use std::time::Duration;
use strum::{Display, EnumCount, EnumIter};

pub mod input;

/// Number of channels in a single DMX512 universe.
pub const UNIVERSE_SIZE: usize = 512;

/// The default period between two frames (~40Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(25);

// The channels exposed by the moving head this controller is built around. Channel numbers are
// 1-based DMX addresses, the layout is fixed by the fixture.
#[derive(Copy, Clone, Debug, Display, Enum, EnumIter, EnumCount, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FixtureChannel {
    #[strum(to_string = "Horizontal Rotation")]
    Pan,
    #[strum(to_string = "Vertical Rotation")]
    Tilt,
    Colour,
    Gobo,
    Strobe,
    Dimmer,
    #[strum(to_string = "Rotation Speed")]
    RotationSpeed,
    #[strum(to_string = "Auto-play Mode")]
    AutoPlay,
    Reposition,
}

impl FixtureChannel {
    pub fn number(&self) -> u16 {
        *self as u16 + 1
    }

    pub fn from_number(number: u16) -> Option<Self> {
        use strum::IntoEnumIterator;
        FixtureChannel::iter().find(|channel| channel.number() == number)
    }

    /// The documented value bands of this channel. These are informational only, every channel
    /// accepts the full 0-255 range.
    pub fn ranges(&self) -> &'static [ChannelRange] {
        match self {
            FixtureChannel::Pan => PAN_RANGES,
            FixtureChannel::Tilt => TILT_RANGES,
            FixtureChannel::Colour => COLOUR_RANGES,
            FixtureChannel::Gobo => GOBO_RANGES,
            FixtureChannel::Strobe => STROBE_RANGES,
            FixtureChannel::Dimmer => DIMMER_RANGES,
            FixtureChannel::RotationSpeed => ROTATION_SPEED_RANGES,
            FixtureChannel::AutoPlay => AUTO_PLAY_RANGES,
            FixtureChannel::Reposition => REPOSITION_RANGES,
        }
    }

    /// The band a value falls into, if the fixture documents one.
    pub fn describe(&self, value: u8) -> Option<&'static str> {
        self.ranges()
            .iter()
            .find(|range| range.contains(value))
            .map(|range| range.description)
    }
}

const PAN_RANGES: &[ChannelRange] = &[ChannelRange::new(0, 255, "Horizontal position")];
const TILT_RANGES: &[ChannelRange] = &[ChannelRange::new(0, 255, "Vertical position")];
const COLOUR_RANGES: &[ChannelRange] = &[
    ChannelRange::new(0, 139, "Colour selection"),
    ChannelRange::new(140, 255, "Auto colour switch"),
];
const GOBO_RANGES: &[ChannelRange] = &[
    ChannelRange::new(0, 63, "Fixed"),
    ChannelRange::new(64, 127, "Shaking"),
    ChannelRange::new(128, 255, "Auto switch"),
];
const STROBE_RANGES: &[ChannelRange] = &[ChannelRange::new(0, 255, "Strobe speed")];
const DIMMER_RANGES: &[ChannelRange] = &[ChannelRange::new(0, 255, "Brightness")];
const ROTATION_SPEED_RANGES: &[ChannelRange] =
    &[ChannelRange::new(0, 255, "Up = Clockwise, Down = Reverse")];
const AUTO_PLAY_RANGES: &[ChannelRange] = &[ChannelRange::new(0, 255, "Auto-play program")];
const REPOSITION_RANGES: &[ChannelRange] = &[
    ChannelRange::new(0, 249, "No function"),
    ChannelRange::new(250, 255, "Reposition (5 seconds)"),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChannelRange {
    pub start: u8,
    pub end: u8,
    pub description: &'static str,
}

impl ChannelRange {
    const fn new(start: u8, end: u8, description: &'static str) -> Self {
        Self {
            start,
            end,
            description,
        }
    }

    pub fn contains(&self, value: u8) -> bool {
        value >= self.start && value <= self.end
    }
}

#[derive(Copy, Clone, Debug, Display, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatisticsSnapshot {
    pub frames: u64,
    pub errors: u64,
    pub last_send: Duration,
}

impl StatisticsSnapshot {
    /// Approximate output rate for a sender running at `interval`, based on how long the last
    /// send took plus the wait between frames.
    pub fn estimated_fps(&self, interval: Duration) -> Option<f64> {
        if self.last_send.is_zero() {
            return None;
        }
        Some(1.0 / (self.last_send + interval).as_secs_f64())
    }
}

impl std::fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frames: {}, Errors: {}", self.frames, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn fixture_channels_are_numbered_from_one() {
        let numbers: Vec<u16> = FixtureChannel::iter().map(|c| c.number()).collect();
        assert_eq!(numbers, (1..=9).collect::<Vec<u16>>());
        assert_eq!(FixtureChannel::from_number(6), Some(FixtureChannel::Dimmer));
        assert_eq!(FixtureChannel::from_number(10), None);
        assert_eq!(FixtureChannel::from_number(0), None);
    }

    #[test]
    fn channel_ranges_cover_every_value() {
        for channel in FixtureChannel::iter() {
            for value in 0..=255u8 {
                let matches = channel.ranges().iter().filter(|r| r.contains(value)).count();
                assert_eq!(matches, 1, "{} value {}", channel, value);
            }
        }
    }

    #[test]
    fn gobo_bands() {
        let ranges = FixtureChannel::Gobo.ranges();
        assert_eq!((ranges[0].start, ranges[0].end), (0, 63));
        assert_eq!((ranges[1].start, ranges[1].end), (64, 127));
        assert_eq!((ranges[2].start, ranges[2].end), (128, 255));
    }

    #[test]
    fn describes_values_by_band() {
        assert_eq!(FixtureChannel::Gobo.describe(100), Some("Shaking"));
        assert_eq!(FixtureChannel::Reposition.describe(255), Some("Reposition (5 seconds)"));
        assert_eq!(FixtureChannel::Dimmer.describe(0), Some("Brightness"));
    }

    #[test]
    fn fps_needs_a_send() {
        let mut stats = StatisticsSnapshot::default();
        assert_eq!(stats.estimated_fps(FRAME_INTERVAL), None);

        stats.last_send = Duration::from_millis(15);
        let fps = stats.estimated_fps(FRAME_INTERVAL).unwrap();
        assert!((fps - 25.0).abs() < 0.001);
    }

    #[test]
    fn fps_follows_the_configured_interval() {
        let stats = StatisticsSnapshot {
            frames: 53,
            errors: 0,
            last_send: Duration::from_millis(1),
        };
        let fps = stats.estimated_fps(Duration::from_millis(99)).unwrap();
        assert!((fps - 10.0).abs() < 0.001);
        assert_eq!(stats.to_string(), "Frames: 53, Errors: 0");
    }
}
