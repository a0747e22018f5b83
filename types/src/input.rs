// Scaling of analogue stick input onto DMX values. The polling of the input device itself lives
// outside this crate, all that matters here is turning a -1.0..=1.0 axis into 0..=255.

use crate::FixtureChannel;

/// Axis values with a magnitude below this are treated as centred.
pub const DEFAULT_DEADZONE: f32 = 0.1;

pub fn apply_deadzone(axis: f32, deadzone: f32) -> f32 {
    if axis.abs() < deadzone {
        0.0
    } else {
        axis
    }
}

/// Maps an axis in -1.0..=1.0 onto a DMX value. Rounds half away from zero, so a centred stick
/// produces 128 rather than 127.
pub fn scale_axis(axis: f32, deadzone: f32) -> u8 {
    let axis = apply_deadzone(axis, deadzone);
    if axis.is_nan() {
        return scale_axis(0.0, deadzone);
    }

    let value = ((axis as f64 + 1.0) * 127.5).round();
    value.clamp(0.0, 255.0) as u8
}

/// Turns a stick position into (channel, value) pairs for pan and tilt, each axis gets its
/// deadzone applied independently.
pub fn pan_tilt(x: f32, y: f32, deadzone: f32) -> [(FixtureChannel, u8); 2] {
    [
        (FixtureChannel::Pan, scale_axis(x, deadzone)),
        (FixtureChannel::Tilt, scale_axis(y, deadzone)),
    ]
}
