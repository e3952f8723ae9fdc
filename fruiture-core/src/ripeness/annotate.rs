//! Diagnostic overlay: bounding box and simplified outline drawn on a copy of
//! the frame.

use super::contour::{bounding_rect, line_points, Point};
use image::{Rgb, RgbImage};

const BOX_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);
const OUTLINE_COLOUR: Rgb<u8> = Rgb([0, 220, 0]);

pub(crate) fn annotate(frame: &RgbImage, polygon: &[Point]) -> RgbImage {
    let mut out = frame.clone();

    let (x, y, w, h) = bounding_rect(polygon);
    let corners = [(x, y), (x + w - 1, y), (x + w - 1, y + h - 1), (x, y + h - 1)];
    draw_closed(&mut out, &corners, BOX_COLOUR);
    draw_closed(&mut out, polygon, OUTLINE_COLOUR);

    out
}

fn draw_closed(image: &mut RgbImage, points: &[Point], colour: Rgb<u8>) {
    let (width, height) = image.dimensions();
    for (&a, &b) in points.iter().zip(points.iter().cycle().skip(1)) {
        for (x, y) in line_points(a, b) {
            if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                image.put_pixel(x as u32, y as u32, colour);
            }
        }
    }
}
