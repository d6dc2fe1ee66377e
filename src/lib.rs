// SPDX-License-Identifier: Apache-2.0

//! # Viewfinder Frame Analysis Library
//!
//! This library analyzes camera preview frames the way a viewfinder
//! component does while the preview is running: every frame can feed a
//! barcode scan and a preview color sample, each running in the background
//! and reporting results as events.
//!
//! ## Features
//!
//! - **Frame Color Kernel**: sample RGB from YUV 4:2:0 semi-planar (NV21,
//!   NV12) frames, convert RGB to HSL, rotate frames 90 degrees for portrait
//!   orientation.
//! - **Admission Gates**: one in-flight task per analysis kind, later frames
//!   are dropped rather than queued.
//! - **Barcode Decoding**: a decoder seam with a QR code decoder built on
//!   `rqrr`.
//! - **Camera Controls**: pinch zoom stepping and preview size selection.
//!
//! ## Example
//!
//! ```
//! use viewfinder::image::{convert_to_hsl, Frame, PixelFormat, SamplePoint};
//!
//! # fn main() -> Result<(), viewfinder::error::Error> {
//! let frame = Frame::new(vec![128; 176 * 144 * 3 / 2], 176, 144, PixelFormat::Nv21)?;
//! let rgb = frame.sample(SamplePoint::default())?.mean();
//! let hsl = convert_to_hsl(rgb.r, rgb.g, rgb.b);
//! assert_eq!(hsl.saturation, 0);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod barcode;
pub mod controls;
pub mod error;
pub mod gate;
pub mod image;
