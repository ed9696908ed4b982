/// Half-width of the window inside which two times address the same frame.
pub const FRAME_TOLERANCE: f32 = 0.0005;

/// Resolution used when a time is snapped without an explicit step.
pub const DEFAULT_TIME_RESOLUTION: f32 = 0.001;

#[must_use]
pub fn is_same_frame(a: f32, b: f32) -> bool {
    (a - b).abs() < FRAME_TOLERANCE
}

#[must_use]
pub fn snap(time: f32, step: f32) -> f32 {
    if !time.is_finite() {
        return 0.0;
    }

    let step = if step > 0.0 {
        step
    } else {
        DEFAULT_TIME_RESOLUTION
    };
    let snapped = (time / step).round() * step;
    if snapped < 0.0 { 0.0 } else { snapped }
}

#[must_use]
pub fn clamp_time(time: f32, length: f32) -> f32 {
    if !time.is_finite() || time <= 0.0 {
        return 0.0;
    }
    time.min(length.max(0.0))
}

/// Wraps `time` into `[0, length)`; non-positive lengths collapse to zero.
#[must_use]
pub fn wrap_time(time: f32, length: f32) -> f32 {
    if length <= 0.0 || !time.is_finite() {
        return 0.0;
    }
    let wrapped = time.rem_euclid(length);
    if is_same_frame(wrapped, length) {
        0.0
    } else {
        wrapped
    }
}
