// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::path::PathBuf;
use viewfinder::{
    analysis::{AnalyzerConfig, Orientation},
    barcode::BarcodeFormats,
    image::{PixelFormat, SamplePoint},
};

/// Raw frame layouts accepted on the command line.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum FrameFormat {
    /// YUV 4:2:0 semi-planar, V before U (camera preview default)
    Nv21,
    /// YUV 4:2:0 semi-planar, U before V
    Nv12,
}

impl From<FrameFormat> for PixelFormat {
    fn from(format: FrameFormat) -> Self {
        match format {
            FrameFormat::Nv21 => PixelFormat::Nv21,
            FrameFormat::Nv12 => PixelFormat::Nv12,
        }
    }
}

/// Command-line arguments for the viewfinder frame analyzer.
///
/// Each input file holds one or more raw preview frames back to back. Frames
/// are fed to the analyzer in order and every event is printed to stdout as
/// a JSON object per line.
///
/// # Example
///
/// ```bash
/// # Scan a dump of 640x480 NV21 preview frames for QR codes
/// viewfinder --frame-size 640 480 --barcode --barcode-types qr frames.nv21
///
/// # Via environment variables
/// export PREVIEW=true
/// viewfinder --sample-center frames.nv21
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Raw frame files
    #[arg(required = true)]
    pub frames: Vec<PathBuf>,

    /// Frame resolution in pixels (width height)
    #[arg(
        long,
        env = "FRAME_SIZE",
        default_value = "176 144",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub frame_size: Vec<u32>,

    /// Raw frame layout
    #[arg(long, env = "FRAME_FORMAT", default_value = "nv21", value_enum)]
    pub format: FrameFormat,

    /// Enable barcode scanning
    #[arg(long, env = "BARCODE")]
    pub barcode: bool,

    /// Barcode types to report (qr, ean13, code128, ...), all when empty
    #[arg(long, env = "BARCODE_TYPES", value_delimiter = ' ')]
    pub barcode_types: Vec<String>,

    /// Enable preview color sampling
    #[arg(long, env = "PREVIEW")]
    pub preview: bool,

    /// Preview color sample coordinate (x y)
    #[arg(
        long,
        default_value = "90 90",
        value_delimiter = ' ',
        num_args = 2,
        conflicts_with = "sample_center"
    )]
    pub sample: Vec<u32>,

    /// Sample the preview color at the frame center
    #[arg(long)]
    pub sample_center: bool,

    /// Frames come from a portrait-held device, rotate before decoding
    #[arg(long, env = "PORTRAIT")]
    pub portrait: bool,

    /// Delay between frames in milliseconds, simulating the preview rate
    #[arg(long, env = "INTERVAL_MS", default_value = "0")]
    pub interval_ms: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn width(&self) -> u32 {
        self.frame_size[0]
    }

    pub fn height(&self) -> u32 {
        self.frame_size[1]
    }
}

impl From<&Args> for AnalyzerConfig {
    fn from(args: &Args) -> Self {
        let sample_point = if args.sample_center {
            SamplePoint::Center
        } else {
            SamplePoint::Fixed {
                x: args.sample[0],
                y: args.sample[1],
            }
        };

        AnalyzerConfig {
            barcode_scanning: args.barcode,
            preview_mode: args.preview,
            barcode_types: BarcodeFormats::from_names(&args.barcode_types),
            sample_point,
            orientation: if args.portrait {
                Orientation::Portrait
            } else {
                Orientation::Landscape
            },
        }
    }
}
