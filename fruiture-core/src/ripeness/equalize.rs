//! Contrast-limited adaptive histogram equalization
//!
//! Compensates uneven lighting on the value channel before thresholding.
//! The frame is split into a grid of tiles; each tile gets its own clipped
//! equalization table and pixels are bilinearly interpolated between the
//! tables of the four nearest tile centres.

use image::{GrayImage, Luma};

/// Equalize `channel` with a contrast limit relative to a flat histogram
pub(crate) fn clahe(channel: &GrayImage, clip_limit: f64, grid: (u32, u32)) -> GrayImage {
    let (width, height) = channel.dimensions();
    if width == 0 || height == 0 {
        return channel.clone();
    }

    let tile_w = width.div_ceil(grid.0.clamp(1, width));
    let tile_h = height.div_ceil(grid.1.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[channel.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts.push(tile_lut(histogram, area, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        let tyf = y as f64 / tile_h as f64 - 0.5;
        let ty1 = tyf.floor();
        let ya = tyf - ty1;
        let ty2 = ((ty1 as i64 + 1).min(tiles_y as i64 - 1)).max(0) as u32;
        let ty1 = (ty1 as i64).max(0) as u32;

        for x in 0..width {
            let txf = x as f64 / tile_w as f64 - 0.5;
            let tx1 = txf.floor();
            let xa = txf - tx1;
            let tx2 = ((tx1 as i64 + 1).min(tiles_x as i64 - 1)).max(0) as u32;
            let tx1 = (tx1 as i64).max(0) as u32;

            let v = channel.get_pixel(x, y).0[0] as usize;
            let top = lut_at(tx1, ty1)[v] as f64 * (1.0 - xa) + lut_at(tx2, ty1)[v] as f64 * xa;
            let bottom = lut_at(tx1, ty2)[v] as f64 * (1.0 - xa) + lut_at(tx2, ty2)[v] as f64 * xa;
            let value = top * (1.0 - ya) + bottom * ya;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Clip a tile histogram, redistribute the excess and build its mapping
fn tile_lut(mut histogram: [u32; 256], area: u32, clip_limit: f64) -> [u8; 256] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f64 / 256.0) as u32).max(1);
        let mut clipped = 0u32;
        for bin in histogram.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }

        let batch = clipped / 256;
        let mut residual = clipped - batch * 256;
        for bin in histogram.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1) as usize;
            for bin in histogram.iter_mut().step_by(step) {
                if residual == 0 {
                    break;
                }
                *bin += 1;
                residual -= 1;
            }
        }
    }

    let scale = 255.0 / area.max(1) as f64;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (value, &count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[value] = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
