//! Contour extraction and polygon geometry
//!
//! Foreground is 8-connected, background 4-connected. Only outer borders of
//! blobs that touch the outer background are returned; blobs nested inside
//! another blob's hole are ignored.

use image::{GrayImage, Luma};
use std::collections::VecDeque;

/// Pixel coordinate `(x, y)`
pub(crate) type Point = (i32, i32);

/// Neighbour offsets, counter-clockwise on screen starting east
const DIRECTIONS: [Point; 8] = [(1, 0), (1, -1), (0, -1), (-1, -1), (-1, 0), (-1, 1), (0, 1), (1, 1)];

/// Outer borders of all external blobs, in raster order of their first pixel
pub(crate) fn external_contours(mask: &GrayImage) -> Vec<Vec<Point>> {
    let (width, height) = (mask.width() as i32, mask.height() as i32);
    let on = |x: i32, y: i32| x >= 0 && y >= 0 && x < width && y < height && mask.get_pixel(x as u32, y as u32).0[0] > 0;

    let outside = outer_background(mask);
    let mut visited = vec![false; (width * height) as usize];
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            if visited[idx] || !on(x, y) {
                continue;
            }
            mark_component(mask, &mut visited, (x, y));

            let nested = x > 0 && !outside[idx - 1];
            if !nested {
                contours.push(trace_border((x, y), &on));
            }
        }
    }
    contours
}

/// Background pixels 4-connected to the frame border
fn outer_background(mask: &GrayImage) -> Vec<bool> {
    let (width, height) = (mask.width() as i32, mask.height() as i32);
    let mut outside = vec![false; (width * height) as usize];
    let mut queue = VecDeque::new();

    let seed = |x: i32, y: i32, outside: &mut Vec<bool>, queue: &mut VecDeque<Point>| {
        let idx = (y * width + x) as usize;
        if !outside[idx] && mask.get_pixel(x as u32, y as u32).0[0] == 0 {
            outside[idx] = true;
            queue.push_back((x, y));
        }
    };

    for x in 0..width {
        seed(x, 0, &mut outside, &mut queue);
        seed(x, height - 1, &mut outside, &mut queue);
    }
    for y in 0..height {
        seed(0, y, &mut outside, &mut queue);
        seed(width - 1, y, &mut outside, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let (nx, ny) = (x + dx, y + dy);
            if nx >= 0 && ny >= 0 && nx < width && ny < height {
                seed(nx, ny, &mut outside, &mut queue);
            }
        }
    }
    outside
}

fn mark_component(mask: &GrayImage, visited: &mut [bool], start: Point) {
    let (width, height) = (mask.width() as i32, mask.height() as i32);
    let mut queue = VecDeque::from([start]);
    visited[(start.1 * width + start.0) as usize] = true;

    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in DIRECTIONS {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            let idx = (ny * width + nx) as usize;
            if !visited[idx] && mask.get_pixel(nx as u32, ny as u32).0[0] > 0 {
                visited[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }
}

fn direction_index(from: Point, to: Point) -> usize {
    let delta = (to.0 - from.0, to.1 - from.1);
    DIRECTIONS.iter().position(|&d| d == delta).unwrap_or(0)
}

fn step(p: Point, dir: usize) -> Point {
    let (dx, dy) = DIRECTIONS[dir % 8];
    (p.0 + dx, p.1 + dy)
}

/// Follow the outer border of the blob whose first raster pixel is `start`.
///
/// The pixel west of `start` is background, which seeds the search.
fn trace_border(start: Point, on: &impl Fn(i32, i32) -> bool) -> Vec<Point> {
    let west = (start.0 - 1, start.1);
    let west_dir = direction_index(start, west);

    // clockwise from west for the first foreground neighbour
    let first = (0..8)
        .map(|k| step(start, (west_dir + 8 - k) % 8))
        .find(|&(x, y)| on(x, y));
    let Some(first) = first else {
        return vec![start];
    };

    let mut contour = Vec::new();
    let mut previous = first;
    let mut current = start;
    loop {
        let back = direction_index(current, previous);
        let next = (1..=8)
            .map(|k| step(current, back + k))
            .find(|&(x, y)| on(x, y))
            .unwrap_or(previous);

        contour.push(current);
        if next == start && current == first {
            break;
        }
        previous = current;
        current = next;
    }
    contour
}

/// Enclosed area of a closed polygon (shoelace, absolute)
pub(crate) fn contour_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.0 as i64 * b.1 as i64 - b.0 as i64 * a.1 as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Perimeter of a closed polygon
pub(crate) fn arc_length(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| distance(*a, *b))
        .sum()
}

fn distance(a: Point, b: Point) -> f64 {
    (((a.0 - b.0) as f64).powi(2) + ((a.1 - b.1) as f64).powi(2)).sqrt()
}

/// Douglas-Peucker simplification of a closed polygon.
///
/// The ring is split at the vertex farthest from the first one and each half
/// is simplified as an open chain.
pub(crate) fn approx_poly_dp(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 3 {
        return points.to_vec();
    }
    let origin = points[0];
    let split = points
        .iter()
        .enumerate()
        .max_by(|a, b| distance(origin, *a.1).total_cmp(&distance(origin, *b.1)))
        .map(|(i, _)| i)
        .unwrap_or(points.len() / 2);
    if split == 0 {
        return vec![origin];
    }

    let mut ring: Vec<Point> = points.to_vec();
    ring.push(origin);

    let mut result = simplify_chain(&ring[..=split], epsilon);
    let tail = simplify_chain(&ring[split..], epsilon);
    result.pop();
    result.extend(tail);
    result.pop();
    result
}

fn simplify_chain(chain: &[Point], epsilon: f64) -> Vec<Point> {
    let mut keep = vec![false; chain.len()];
    let last = chain.len() - 1;
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0, last)];
    while let Some((lo, hi)) = stack.pop() {
        if hi <= lo + 1 {
            continue;
        }
        let (a, b) = (chain[lo], chain[hi]);
        let (index, dist) = (lo + 1..hi)
            .map(|i| (i, segment_distance(chain[i], a, b)))
            .fold((lo, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if dist > epsilon {
            keep[index] = true;
            stack.push((lo, index));
            stack.push((index, hi));
        }
    }

    chain.iter().zip(keep).filter(|(_, k)| *k).map(|(p, _)| *p).collect()
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = ((b.0 - a.0) as f64, (b.1 - a.1) as f64);
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return distance(p, a);
    }
    (dx * (a.1 - p.1) as f64 - dy * (a.0 - p.0) as f64).abs() / length
}

/// Axis-aligned bounding box `(x, y, width, height)`
pub(crate) fn bounding_rect(points: &[Point]) -> (i32, i32, i32, i32) {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    if points.is_empty() {
        return (0, 0, 0, 0);
    }
    (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

/// Rasterize a closed polygon, boundary included
pub(crate) fn fill_polygon(width: u32, height: u32, polygon: &[Point]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if polygon.is_empty() {
        return mask;
    }

    for y in 0..height as i32 {
        let yc = y as f64;
        let mut crossings: Vec<f64> = polygon
            .iter()
            .zip(polygon.iter().cycle().skip(1))
            .filter_map(|(&(x0, y0), &(x1, y1))| {
                let (y0f, y1f) = (y0 as f64, y1 as f64);
                let spans = (y0f <= yc && yc < y1f) || (y1f <= yc && yc < y0f);
                spans.then(|| x0 as f64 + (yc - y0f) * (x1 - x0) as f64 / (y1f - y0f))
            })
            .collect();
        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks_exact(2) {
            let from = pair[0].ceil().max(0.0) as i32;
            let to = pair[1].floor().min(width as f64 - 1.0) as i32;
            for x in from..=to {
                mask.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }

    for (&a, &b) in polygon.iter().zip(polygon.iter().cycle().skip(1)) {
        for (x, y) in line_points(a, b) {
            if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                mask.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }
    mask
}

/// Bresenham line from `a` to `b`, both ends included
pub(crate) fn line_points(a: Point, b: Point) -> Vec<Point> {
    let (mut x, mut y) = a;
    let dx = (b.0 - a.0).abs();
    let dy = -(b.1 - a.1).abs();
    let sx = if a.0 < b.0 { 1 } else { -1 };
    let sy = if a.1 < b.1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut points = Vec::with_capacity((dx - dy + 1) as usize);

    loop {
        points.push((x, y));
        if (x, y) == b {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}
