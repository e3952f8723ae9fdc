//! RGB to HSV conversion
//!
//! Two conventions are needed:
//! - 8-bit (hue 0-180, saturation/value 0-255) for range masks, matching the
//!   calibration constants
//! - unit (all components 0.0-1.0) for the hue strategy

use image::{Rgb, RgbImage};

/// Convert one pixel to 8-bit HSV (hue is degrees / 2)
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        ((diff * 255) as f64 / v as f64).round() as i32
    };

    let h = if diff == 0 {
        0
    } else {
        let sector = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        let mut h = 30.0 * sector as f64 / diff as f64;
        if h < 0.0 {
            h += 180.0;
        }
        (h.round() as i32) % 180
    };

    [h as u8, s.clamp(0, 255) as u8, v as u8]
}

/// Convert one pixel to unit HSV, hue as a fraction of a full turn
pub fn rgb_to_hsv_unit(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    if max == min {
        return (0.0, 0.0, v);
    }

    let span = max - min;
    let s = span / max;
    let rc = (max - r) / span;
    let gc = (max - g) / span;
    let bc = (max - b) / span;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    ((h / 6.0).rem_euclid(1.0), s, v)
}

/// Convert a frame to 8-bit HSV, stored channel-for-channel in an RGB buffer
pub(crate) fn to_hsv_image(frame: &RgbImage) -> RgbImage {
    let mut hsv = RgbImage::new(frame.width(), frame.height());
    for (src, dst) in frame.pixels().zip(hsv.pixels_mut()) {
        let [r, g, b] = src.0;
        *dst = Rgb(rgb_to_hsv(r, g, b));
    }
    hsv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries_on_eight_bit_scale() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
    }

    #[test]
    fn gray_has_no_hue_or_saturation() {
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
    }

    #[test]
    fn banana_yellow_lands_in_yellow_band() {
        // (230, 200, 40): hue ~50.5 degrees
        let [h, s, v] = rgb_to_hsv(230, 200, 40);
        assert!((18..=35).contains(&h), "hue {h}");
        assert!(s > 60 && v > 60);
    }

    #[test]
    fn unit_hue_matches_degrees() {
        let (h, s, v) = rgb_to_hsv_unit(0, 255, 0);
        assert!((h * 360.0 - 120.0).abs() < 1e-9);
        assert_eq!((s, v), (1.0, 1.0));

        let (h, _, _) = rgb_to_hsv_unit(255, 0, 255);
        assert!((h * 360.0 - 300.0).abs() < 1e-9);
    }
}
