//! Pixel and wheel-delta to physical distance conversions.

pub const DEFAULT_DPI: f64 = 96.0;
pub const DEFAULT_SENSITIVITY: f64 = 2.0;
pub const WHEEL_DELTA_PER_NOTCH: f64 = 120.0;
pub const DEFAULT_LINES_PER_NOTCH: f64 = 3.0;
pub const DEFAULT_LINE_HEIGHT_CM: f64 = 0.8;

const METERS_PER_INCH: f64 = 0.0254;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceCalculator {
    pub sensitivity: f64,
    pub dpi: f64,
    pub lines_per_notch: f64,
    pub line_height_cm: f64,
}

impl Default for DistanceCalculator {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            dpi: DEFAULT_DPI,
            lines_per_notch: DEFAULT_LINES_PER_NOTCH,
            line_height_cm: DEFAULT_LINE_HEIGHT_CM,
        }
    }
}

impl DistanceCalculator {
    pub fn from_settings(settings: &crate::models::Settings) -> Self {
        Self {
            sensitivity: settings.mouse_sensitivity,
            dpi: settings.screen_dpi,
            lines_per_notch: settings.scroll_lines_per_notch,
            line_height_cm: settings.scroll_line_height_cm,
        }
    }

    pub fn mouse_meters(&self, pixels: f64) -> f64 {
        pixels_to_meters(pixels, self.sensitivity, self.dpi)
    }

    pub fn scroll_meters(&self, wheel_delta: i32) -> f64 {
        wheel_delta_to_meters(wheel_delta, self.lines_per_notch, self.line_height_cm)
    }
}

/// Raw cursor travel is divided by `sensitivity` (pointer acceleration makes
/// on-screen travel exceed hand travel) and then measured at `dpi`.
pub fn pixels_to_meters(pixels: f64, sensitivity: f64, dpi: f64) -> f64 {
    if !(pixels.is_finite() && pixels > 0.0) {
        return 0.0;
    }
    if !(sensitivity.is_finite() && sensitivity > 0.0 && dpi.is_finite() && dpi > 0.0) {
        return 0.0;
    }
    let effective_px = pixels / sensitivity;
    effective_px / dpi * METERS_PER_INCH
}

/// Direction is ignored: scrolling up and down both count as travel.
pub fn wheel_delta_to_meters(wheel_delta: i32, lines_per_notch: f64, line_height_cm: f64) -> f64 {
    if wheel_delta == 0 {
        return 0.0;
    }
    if !(lines_per_notch.is_finite() && lines_per_notch > 0.0) {
        return 0.0;
    }
    if !(line_height_cm.is_finite() && line_height_cm > 0.0) {
        return 0.0;
    }
    let notches = f64::from(wheel_delta.unsigned_abs()) / WHEEL_DELTA_PER_NOTCH;
    notches * lines_per_notch * line_height_cm / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn one_notch_is_two_point_four_centimeters() {
        let calc = DistanceCalculator::default();
        assert!(close(calc.scroll_meters(120), 0.024));
        assert!(close(calc.scroll_meters(-120), 0.024));
        assert!(close(calc.scroll_meters(60), 0.012));
        assert_eq!(calc.scroll_meters(0), 0.0);
    }

    #[test]
    fn sensitivity_halves_pixels_before_dpi() {
        let calc = DistanceCalculator::default();
        // 1000px / 2.0 = 500px at 96 DPI
        let expected = 500.0 / 96.0 * 0.0254;
        assert!(close(calc.mouse_meters(1000.0), expected));
        assert!(close(pixels_to_meters(96.0, 1.0, 96.0), 0.0254));
    }

    #[test]
    fn invalid_inputs_yield_zero() {
        assert_eq!(pixels_to_meters(-5.0, 2.0, 96.0), 0.0);
        assert_eq!(pixels_to_meters(f64::NAN, 2.0, 96.0), 0.0);
        assert_eq!(pixels_to_meters(100.0, 0.0, 96.0), 0.0);
        assert_eq!(wheel_delta_to_meters(120, 0.0, 0.8), 0.0);
    }
}
