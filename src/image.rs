// SPDX-License-Identifier: Apache-2.0

use crate::error::{invalid, Result};
use core::fmt;
use tracing::trace;

/// Pixel layouts understood by the frame kernel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUV 4:2:0 semi-planar, chroma interleaved V then U (camera preview default)
    Nv21,
    /// YUV 4:2:0 semi-planar, chroma interleaved U then V
    Nv12,
    /// 8-bit luma only
    Grey,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PixelFormat::Nv21 => "NV21",
            PixelFormat::Nv12 => "NV12",
            PixelFormat::Grey => "GREY",
        };
        f.write_str(name)
    }
}

/// Number of bytes a frame of the given geometry occupies.
///
/// The semi-planar formats carry one chroma row of `width` bytes for every
/// two luma rows. An odd height still needs a full chroma row for its last
/// luma row, so the result can exceed `width * height * 3 / 2`.
pub const fn image_size(width: u32, height: u32, format: PixelFormat) -> usize {
    let luma = width as usize * height as usize;
    match format {
        PixelFormat::Nv21 | PixelFormat::Nv12 => {
            luma + width as usize * (height as usize).div_ceil(2)
        }
        PixelFormat::Grey => luma,
    }
}

/// Sample coordinate used by the preview color analysis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SamplePoint {
    /// A fixed pixel coordinate.
    Fixed { x: u32, y: u32 },
    /// The pixel at `(width / 2, height / 2)`.
    Center,
}

/// Near the center of the smallest preview size cameras offer (176x144).
pub const REFERENCE_SAMPLE_POINT: SamplePoint = SamplePoint::Fixed { x: 90, y: 90 };

impl Default for SamplePoint {
    fn default() -> Self {
        REFERENCE_SAMPLE_POINT
    }
}

impl SamplePoint {
    pub fn resolve(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            SamplePoint::Fixed { x, y } => (x, y),
            SamplePoint::Center => (width / 2, height / 2),
        }
    }
}

/// An RGB color with 8-bit channels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// An HSL color. Hue is in degrees `[0, 360)`, saturation and lightness are
/// percentages `[0, 100]`. All three are truncated, not rounded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Hsl {
    pub hue: u16,
    pub saturation: u8,
    pub lightness: u8,
}

/// Per-channel sums of every sampled point.
///
/// With a single sample point the sums are the color of that point, which is
/// what the preview color analysis reports.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RgbAccumulator {
    sum: [u32; 3],
    count: u32,
}

impl RgbAccumulator {
    fn add(&mut self, rgb: Rgb) {
        self.sum[0] += rgb.r as u32;
        self.sum[1] += rgb.g as u32;
        self.sum[2] += rgb.b as u32;
        self.count += 1;
    }

    /// Accumulated `[r, g, b]` sums.
    pub fn sum(&self) -> [u32; 3] {
        self.sum
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Average color of the sampled points, truncated.
    pub fn mean(&self) -> Rgb {
        if self.count == 0 {
            return Rgb::default();
        }
        Rgb {
            r: (self.sum[0] / self.count) as u8,
            g: (self.sum[1] / self.count) as u8,
            b: (self.sum[2] / self.count) as u8,
        }
    }
}

/// Converts one YUV sample to RGB.
///
/// Chroma is centered on zero before applying the BT.601 style coefficients,
/// each channel is truncated toward zero and clipped into `[0, 255]`.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> Rgb {
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let yf = 1.164 * y as f32 - 16.0;

    let r = (yf + 1.596 * v) as i32;
    let g = (yf - 0.813 * v - 0.391 * u) as i32;
    let b = (yf + 2.018 * u) as i32;

    Rgb {
        r: r.clamp(0, 255) as u8,
        g: g.clamp(0, 255) as u8,
        b: b.clamp(0, 255) as u8,
    }
}

/// Samples RGB colors from a YUV 4:2:0 semi-planar frame.
///
/// # Arguments
///
/// * `buf` - Luma plane followed by the interleaved chroma plane
/// * `width` - Frame width in pixels
/// * `height` - Frame height in pixels
/// * `format` - `Nv21` or `Nv12`, selecting the chroma byte order
/// * `points` - Pixel coordinates to sample
///
/// # Returns
///
/// The per-channel sums of every sampled point along with the sample count.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`](crate::error::Error::InvalidArgument)
/// if:
/// - The buffer is empty or shorter than the declared geometry requires
/// - Width or height is zero
/// - `format` is not a semi-planar YUV format
/// - No points are given, or a point lies outside the frame
///
/// No partial result is produced when any point is rejected.
///
/// With an odd width the chroma row is `width` bytes but holds only
/// `width / 2` complete pairs, so points in the last column have no chroma
/// and are rejected as out of range.
///
/// # Example
///
/// ```
/// use viewfinder::image::{decode_yuv420sp_to_rgb, PixelFormat};
///
/// # fn main() -> Result<(), viewfinder::error::Error> {
/// // 2x2 mid-grey frame: four luma bytes, then one V/U pair
/// let frame = [128, 128, 128, 128, 128, 128];
/// let rgb = decode_yuv420sp_to_rgb(&frame, 2, 2, PixelFormat::Nv21, &[(0, 0)])?;
/// assert_eq!(rgb.sum(), [132, 132, 132]);
/// # Ok(())
/// # }
/// ```
pub fn decode_yuv420sp_to_rgb(
    buf: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    points: &[(u32, u32)],
) -> Result<RgbAccumulator> {
    if buf.is_empty() {
        return Err(invalid("frame buffer is empty"));
    }
    check_geometry(width, height)?;
    if format == PixelFormat::Grey {
        return Err(invalid("GREY frames carry no chroma to sample"));
    }
    let expected = image_size(width, height, format);
    if buf.len() < expected {
        return Err(invalid(format!(
            "{}x{} {} frame needs {} bytes but buffer holds {}",
            width,
            height,
            format,
            expected,
            buf.len()
        )));
    }
    if points.is_empty() {
        return Err(invalid("no sample points given"));
    }
    if let Some(&(x, y)) = points.iter().find(|(x, y)| *x >= width || *y >= height) {
        return Err(invalid(format!(
            "sample point ({}, {}) outside {}x{} frame",
            x, y, width, height
        )));
    }

    let width = width as usize;
    let frame_size = width * height as usize;
    let mut acc = RgbAccumulator::default();

    for &(x, y) in points {
        let (x, y) = (x as usize, y as usize);
        let luma = buf[y * width + x];

        // one chroma pair per 2x2 block of pixels
        let offset = frame_size + 2 * (x / 2) + (y / 2) * width;
        let (first, second) = match (buf.get(offset), buf.get(offset + 1)) {
            (Some(a), Some(b)) => (*a, *b),
            _ => {
                return Err(invalid(format!(
                    "chroma for ({}, {}) lies past the end of the buffer",
                    x, y
                )))
            }
        };
        let (u, v) = match format {
            PixelFormat::Nv12 => (first, second),
            _ => (second, first),
        };

        acc.add(yuv_to_rgb(luma, u, v));
    }

    trace!(sum = ?acc.sum, count = acc.count, "sampled frame color");
    Ok(acc)
}

/// Converts an RGB color to HSL.
///
/// Channels are normalized in floating point. When the brightest and darkest
/// channels are equal the color is monochrome and both hue and saturation
/// are zero.
///
/// # Example
///
/// ```
/// use viewfinder::image::{convert_to_hsl, Hsl};
///
/// let hsl = convert_to_hsl(0, 255, 0);
/// assert_eq!(hsl, Hsl { hue: 120, saturation: 100, lightness: 50 });
/// ```
pub fn convert_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let red = r as f32 / 255.0;
    let green = g as f32 / 255.0;
    let blue = b as f32 / 255.0;

    let min = red.min(green).min(blue);
    let max = red.max(green).max(blue);
    let range = max - min;

    let l = (max + min) / 2.0;
    let (mut h, s) = if range == 0.0 {
        (0.0, 0.0)
    } else {
        let s = if l > 0.5 {
            range / (2.0 - range)
        } else {
            range / (max + min)
        };
        let h = if red == max {
            ((blue - green) / range) % 6.0
        } else if green == max {
            (blue - red) / range + 2.0
        } else {
            (red - green) / range + 4.0
        };
        (h, s)
    };

    h *= 60.0;
    if h < 0.0 {
        h += 360.0;
    }
    if h >= 360.0 {
        h -= 360.0;
    }

    Hsl {
        hue: h as u16,
        saturation: (s * 100.0).min(100.0) as u8,
        lightness: (l * 100.0).min(100.0) as u8,
    }
}

impl From<Rgb> for Hsl {
    fn from(rgb: Rgb) -> Self {
        convert_to_hsl(rgb.r, rgb.g, rgb.b)
    }
}

/// Rotates the luma plane of a frame by 90 degrees clockwise into `dst`.
///
/// Pixel `(x, y)` of the `width`x`height` source lands at row `x`, column
/// `height - y - 1` of the `height`x`width` result. Only the first
/// `width * height` bytes of `dst` are written.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`](crate::error::Error::InvalidArgument)
/// if:
/// - `dst` and `src` differ in length
/// - Width or height is zero
/// - `src` is shorter than `width * height`
pub fn rotate90_into(src: &[u8], dst: &mut [u8], width: u32, height: u32) -> Result<()> {
    if dst.len() != src.len() {
        return Err(invalid(format!(
            "rotation destination holds {} bytes but source holds {}",
            dst.len(),
            src.len()
        )));
    }
    check_geometry(width, height)?;
    let (width, height) = (width as usize, height as usize);
    if src.len() < width * height {
        return Err(invalid(format!(
            "{}x{} luma plane needs {} bytes but buffer holds {}",
            width,
            height,
            width * height,
            src.len()
        )));
    }

    for (y, row) in src[..width * height].chunks_exact(width).enumerate() {
        for (x, &pix) in row.iter().enumerate() {
            dst[x * height + height - y - 1] = pix;
        }
    }
    Ok(())
}

/// Rotates the luma plane of a frame by 90 degrees clockwise.
///
/// Used to present portrait frames to decoders that expect the sensor's
/// landscape orientation. The source is left untouched and the result is a
/// freshly allocated [`Frame`] in [`PixelFormat::Grey`] with width and
/// height swapped. Any chroma bytes after the luma plane are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`](crate::error::Error::InvalidArgument)
/// for a zero dimension or a source shorter than `width * height`.
///
/// # Example
///
/// ```
/// use viewfinder::image::rotate90;
///
/// # fn main() -> Result<(), viewfinder::error::Error> {
/// // 3x2 source
/// let rotated = rotate90(&[1, 2, 3, 4, 5, 6], 3, 2)?;
/// assert_eq!((rotated.width(), rotated.height()), (2, 3));
/// assert_eq!(rotated.data(), &[4, 1, 5, 2, 6, 3]);
/// # Ok(())
/// # }
/// ```
pub fn rotate90(src: &[u8], width: u32, height: u32) -> Result<Frame> {
    check_geometry(width, height)?;
    let luma = width as usize * height as usize;
    if src.len() < luma {
        return Err(invalid(format!(
            "{}x{} luma plane needs {} bytes but buffer holds {}",
            width,
            height,
            luma,
            src.len()
        )));
    }

    let mut data = vec![0; luma];
    rotate90_into(&src[..luma], &mut data, width, height)?;
    Ok(Frame {
        data,
        width: height,
        height: width,
        format: PixelFormat::Grey,
    })
}

fn check_geometry(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(invalid(format!("invalid frame geometry {}x{}", width, height)));
    }
    Ok(())
}

/// A single camera preview frame.
///
/// The buffer is validated against its declared geometry at construction,
/// so the kernel operations on a `Frame` only fail on bad sample points.
///
/// # Example
///
/// ```
/// use viewfinder::image::{Frame, PixelFormat, SamplePoint};
///
/// # fn main() -> Result<(), viewfinder::error::Error> {
/// let frame = Frame::new(vec![128; 176 * 144 * 3 / 2], 176, 144, PixelFormat::Nv21)?;
/// let rgb = frame.sample(SamplePoint::Center)?.mean();
/// assert_eq!((rgb.r, rgb.g, rgb.b), (132, 132, 132));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Frame {
    /// Wraps a frame buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::error::Error::InvalidArgument)
    /// if the buffer is empty, a dimension is zero, or the buffer is shorter
    /// than [`image_size`] for the geometry.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        if data.is_empty() {
            return Err(invalid("frame buffer is empty"));
        }
        check_geometry(width, height)?;
        let expected = image_size(width, height, format);
        if data.len() < expected {
            return Err(invalid(format!(
                "{}x{} {} frame needs {} bytes but buffer holds {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The full-resolution luma plane.
    pub fn luma(&self) -> &[u8] {
        &self.data[..self.width as usize * self.height as usize]
    }

    pub fn size(&self) -> usize {
        image_size(self.width, self.height, self.format)
    }

    /// Samples the color at a single point.
    pub fn sample(&self, point: SamplePoint) -> Result<RgbAccumulator> {
        let point = point.resolve(self.width, self.height);
        decode_yuv420sp_to_rgb(&self.data, self.width, self.height, self.format, &[point])
    }

    /// Rotated copy of the luma plane, see [`rotate90`].
    pub fn rotate90(&self) -> Result<Frame> {
        rotate90(&self.data, self.width, self.height)
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} len:{}",
            self.width,
            self.height,
            self.format,
            self.data.len()
        )
    }
}
