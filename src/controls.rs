// SPDX-License-Identifier: Apache-2.0

//! Camera control helpers used around the preview surface: pinch-to-zoom
//! stepping and capture/preview size selection.

/// A capture or preview resolution offered by the camera.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Width over height of a preview, or `None` for a zero height.
pub fn preview_ratio(size: Size) -> Option<f64> {
    if size.height == 0 {
        return None;
    }
    Some(size.width as f64 / size.height as f64)
}

/// The size with the smallest area, first one wins ties.
///
/// Preview color sampling only reads a handful of pixels so it runs on the
/// cheapest preview the camera offers.
pub fn smallest_preview_size(sizes: &[Size]) -> Option<Size> {
    sizes.iter().copied().reduce(|best, size| {
        if size.area() < best.area() {
            size
        } else {
            best
        }
    })
}

/// The largest-area size that fits within `max_width` x `max_height`.
///
/// # Example
///
/// ```
/// use viewfinder::controls::{best_size, Size};
///
/// let sizes = [Size::new(640, 480), Size::new(4032, 3024), Size::new(1920, 1080)];
/// assert_eq!(best_size(&sizes, 2000, 2000), Some(Size::new(1920, 1080)));
/// assert_eq!(best_size(&sizes, u32::MAX, u32::MAX), Some(Size::new(4032, 3024)));
/// ```
pub fn best_size(sizes: &[Size], max_width: u32, max_height: u32) -> Option<Size> {
    sizes
        .iter()
        .copied()
        .filter(|s| s.width <= max_width && s.height <= max_height)
        .reduce(|best, size| {
            if size.area() > best.area() {
                size
            } else {
                best
            }
        })
}

/// Distance between two touch points.
pub fn finger_spacing(a: (f32, f32), b: (f32, f32)) -> f32 {
    let x = a.0 - b.0;
    let y = a.1 - b.1;
    (x * x + y * y).sqrt()
}

/// Tracks a two-finger pinch and turns it into single zoom steps.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PinchZoom {
    spacing: f32,
}

impl PinchZoom {
    /// Records the spacing when the second finger touches down.
    pub fn begin(&mut self, spacing: f32) {
        self.spacing = spacing;
    }

    /// Returns the zoom level for a new finger spacing.
    ///
    /// Spreading the fingers steps the zoom up by one, pinching steps it
    /// down by one, staying within `0..=max_zoom`.
    pub fn update(&mut self, spacing: f32, zoom: u32, max_zoom: u32) -> u32 {
        let zoom = if spacing > self.spacing && zoom < max_zoom {
            zoom + 1
        } else if spacing < self.spacing && zoom > 0 {
            zoom - 1
        } else {
            zoom
        };
        self.spacing = spacing;
        zoom
    }
}
