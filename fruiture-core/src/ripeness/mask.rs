//! Binary mask operations
//!
//! Masks are `GrayImage`s where 255 marks foreground and 0 background; any
//! non-zero value reads as foreground. Morphology ignores out-of-bounds
//! neighbours, so the frame border neither grows nor erodes the object.

use crate::constants::ripeness::HsvRange;
use image::{imageops, GrayImage, Luma, RgbImage};

const ON: Luma<u8> = Luma([255]);
const OFF: Luma<u8> = Luma([0]);

/// Pixels of an HSV frame whose three channels all fall in `range` (inclusive)
pub(crate) fn in_range(hsv: &RgbImage, range: &HsvRange) -> GrayImage {
    let (lower, upper) = range;
    GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
        let px = hsv.get_pixel(x, y).0;
        let inside = (0..3).all(|c| lower[c] <= px[c] && px[c] <= upper[c]);
        if inside { ON } else { OFF }
    })
}

/// Pixels of an HSV frame with saturation at or below `max_saturation`, any hue
pub(crate) fn gray(hsv: &RgbImage, max_saturation: u8) -> GrayImage {
    GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
        if hsv.get_pixel(x, y).0[1] <= max_saturation { ON } else { OFF }
    })
}

pub(crate) fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    combine(a, b, |a, b| a || b)
}

/// `a` with every pixel of `b` removed
pub(crate) fn subtract(a: &GrayImage, b: &GrayImage) -> GrayImage {
    combine(a, b, |a, b| a && !b)
}

fn combine(a: &GrayImage, b: &GrayImage, op: impl Fn(bool, bool) -> bool) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        if op(a.get_pixel(x, y).0[0] > 0, b.get_pixel(x, y).0[0] > 0) { ON } else { OFF }
    })
}

pub(crate) fn count_nonzero(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p.0[0] > 0).count() as u64
}

/// Pixels set in both masks
pub(crate) fn count_overlap(a: &GrayImage, b: &GrayImage) -> u64 {
    a.pixels()
        .zip(b.pixels())
        .filter(|(a, b)| a.0[0] > 0 && b.0[0] > 0)
        .count() as u64
}

/// Structuring element as offsets from its anchor (the centre)
#[derive(Debug, Clone)]
pub(crate) struct Kernel {
    offsets: Vec<(i32, i32)>,
}

/// Elliptical structuring element inscribed in a `size` x `size` square
pub(crate) fn ellipse_kernel(size: u32) -> Kernel {
    let radius = (size / 2) as i32;
    let mut offsets = Vec::new();
    if radius == 0 {
        offsets.push((0, 0));
        return Kernel { offsets };
    }

    let r2 = (radius * radius) as f64;
    for dy in -radius..=radius {
        let half = (radius as f64 * ((r2 - (dy * dy) as f64) / r2).sqrt()).round() as i32;
        for dx in -half..=half {
            offsets.push((dx, dy));
        }
    }
    Kernel { offsets }
}

pub(crate) fn dilate(mask: &GrayImage, kernel: &Kernel, iterations: usize) -> GrayImage {
    repeat(mask, iterations, |m| morph(m, kernel, true))
}

pub(crate) fn erode(mask: &GrayImage, kernel: &Kernel, iterations: usize) -> GrayImage {
    repeat(mask, iterations, |m| morph(m, kernel, false))
}

/// Dilate then erode: fills gaps narrower than the kernel
pub(crate) fn close(mask: &GrayImage, kernel: &Kernel, iterations: usize) -> GrayImage {
    erode(&dilate(mask, kernel, iterations), kernel, iterations)
}

/// Erode then dilate: removes specks smaller than the kernel
pub(crate) fn open(mask: &GrayImage, kernel: &Kernel, iterations: usize) -> GrayImage {
    dilate(&erode(mask, kernel, iterations), kernel, iterations)
}

fn repeat(mask: &GrayImage, iterations: usize, step: impl Fn(&GrayImage) -> GrayImage) -> GrayImage {
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = step(&current);
    }
    current
}

fn morph(mask: &GrayImage, kernel: &Kernel, grow: bool) -> GrayImage {
    let (width, height) = (mask.width() as i32, mask.height() as i32);
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let neighbours = kernel.offsets.iter().filter_map(|&(dx, dy)| {
            let (nx, ny) = (x as i32 + dx, y as i32 + dy);
            (nx >= 0 && ny >= 0 && nx < width && ny < height)
                .then(|| mask.get_pixel(nx as u32, ny as u32).0[0] > 0)
        });
        let set = if grow {
            neighbours.into_iter().any(|on| on)
        } else {
            neighbours.into_iter().all(|on| on)
        };
        if set { ON } else { OFF }
    })
}

/// Blur the mask and re-binarize it, rounding off jagged edges
pub(crate) fn smooth_threshold(mask: &GrayImage, sigma: f32, threshold: u8) -> GrayImage {
    let blurred = imageops::blur(mask, sigma);
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if blurred.get_pixel(x, y).0[0] > threshold { ON } else { OFF }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn square(size: u32, from: u32, to: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) { ON } else { OFF }
        })
    }

    #[test]
    fn ellipse_kernel_matches_reference_shape() {
        let kernel = ellipse_kernel(7);
        let row_width = |dy: i32| kernel.offsets.iter().filter(|(_, y)| *y == dy).count();
        assert_eq!(row_width(-3), 1);
        assert_eq!(row_width(-2), 5);
        assert_eq!(row_width(-1), 7);
        assert_eq!(row_width(0), 7);
        assert_eq!(row_width(3), 1);
        assert_eq!(kernel.offsets.len(), 33);
    }

    #[test]
    fn in_range_is_inclusive() {
        let hsv = RgbImage::from_fn(3, 1, |x, _| Rgb([[30, 40, 40], [80, 255, 255], [81, 255, 255]][x as usize]));
        let mask = in_range(&hsv, &([30, 40, 40], [80, 255, 255]));
        let values: Vec<u8> = mask.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![255, 255, 0]);
    }

    #[test]
    fn open_removes_specks() {
        let mut mask = square(40, 10, 30);
        mask.put_pixel(2, 2, ON);
        let opened = open(&mask, &ellipse_kernel(7), 2);
        assert_eq!(opened.get_pixel(2, 2).0[0], 0);
        assert_eq!(opened.get_pixel(20, 20).0[0], 255);
    }

    #[test]
    fn close_fills_narrow_gaps() {
        let mut mask = square(40, 10, 30);
        for y in 10..30 {
            mask.put_pixel(20, y, OFF);
        }
        let closed = close(&mask, &ellipse_kernel(7), 2);
        assert_eq!(closed.get_pixel(20, 20).0[0], 255);
    }

    #[test]
    fn set_operations_and_counts() {
        let a = square(10, 0, 5);
        let b = square(10, 3, 8);
        assert_eq!(count_nonzero(&union(&a, &b)), 25 + 25 - 4);
        assert_eq!(count_nonzero(&subtract(&a, &b)), 21);
        assert_eq!(count_overlap(&a, &b), 4);
    }

    #[test]
    fn smoothing_keeps_large_blobs() {
        let mask = square(40, 10, 30);
        let smooth = smooth_threshold(&mask, 1.7, 127);
        assert_eq!(smooth.get_pixel(20, 20).0[0], 255);
        assert_eq!(smooth.get_pixel(2, 2).0[0], 0);
    }
}
