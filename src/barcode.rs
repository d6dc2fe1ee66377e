// SPDX-License-Identifier: Apache-2.0

//! Barcode recognition seam.
//!
//! Symbol recognition itself is delegated to a decoding library. This module
//! defines the formats the scripting layer can request, the luminance view a
//! decoder consumes, and the [`BarcodeDecoder`] trait with a QR code decoder
//! backed by `rqrr`.

use crate::{
    error::{Error, Result},
    image::Frame,
};
use core::fmt;
use std::{collections::BTreeSet, str::FromStr};
use tracing::{debug, trace};

/// Symbologies the scripting layer may enable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BarcodeFormat {
    Aztec,
    Codabar,
    Code39,
    Code93,
    Code128,
    DataMatrix,
    Ean8,
    Ean13,
    Itf,
    MaxiCode,
    Pdf417,
    QrCode,
    Rss14,
    RssExpanded,
    UpcA,
    UpcE,
    UpcEanExtension,
}

impl BarcodeFormat {
    /// Name reported in barcode events.
    pub fn name(&self) -> &'static str {
        match self {
            BarcodeFormat::Aztec => "AZTEC",
            BarcodeFormat::Codabar => "CODABAR",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::Code93 => "CODE_93",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::MaxiCode => "MAXICODE",
            BarcodeFormat::Pdf417 => "PDF_417",
            BarcodeFormat::QrCode => "QR_CODE",
            BarcodeFormat::Rss14 => "RSS_14",
            BarcodeFormat::RssExpanded => "RSS_EXPANDED",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::UpcEanExtension => "UPC_EAN_EXTENSION",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses the type names used by the scripting layer (`"qr"`, `"ean13"`, ...).
impl FromStr for BarcodeFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s {
            "aztec" => BarcodeFormat::Aztec,
            "ean13" => BarcodeFormat::Ean13,
            "ean8" => BarcodeFormat::Ean8,
            "qr" => BarcodeFormat::QrCode,
            "pdf417" => BarcodeFormat::Pdf417,
            "upce" => BarcodeFormat::UpcE,
            "datamatrix" => BarcodeFormat::DataMatrix,
            "code39" => BarcodeFormat::Code39,
            "code93" => BarcodeFormat::Code93,
            "interleaved2of5" => BarcodeFormat::Itf,
            "codabar" => BarcodeFormat::Codabar,
            "code128" => BarcodeFormat::Code128,
            "maxicode" => BarcodeFormat::MaxiCode,
            "rss14" => BarcodeFormat::Rss14,
            "rssexpanded" => BarcodeFormat::RssExpanded,
            "upca" => BarcodeFormat::UpcA,
            "upceanextension" => BarcodeFormat::UpcEanExtension,
            _ => return Err(Error::UnsupportedBarcodeFormat(s.to_string())),
        };
        Ok(format)
    }
}

/// The set of symbologies a decoder should report.
///
/// An empty set places no restriction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BarcodeFormats(BTreeSet<BarcodeFormat>);

impl BarcodeFormats {
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds the set from type names, skipping names nobody supports.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for name in names {
            match name.as_ref().parse() {
                Ok(format) => {
                    set.insert(format);
                }
                Err(e) => debug!(error = %e, "skipping barcode type"),
            }
        }
        Self(set)
    }

    pub fn allows(&self, format: BarcodeFormat) -> bool {
        self.0.is_empty() || self.0.contains(&format)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = BarcodeFormat> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<BarcodeFormat> for BarcodeFormats {
    fn from_iter<T: IntoIterator<Item = BarcodeFormat>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A decoded symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Barcode {
    pub text: String,
    pub format: BarcodeFormat,
}

/// Read-only brightness view over a frame buffer.
#[derive(Copy, Clone, Debug)]
pub struct LuminanceSource<'a> {
    luma: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> LuminanceSource<'a> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a dimension is zero or `luma` is
    /// shorter than `width * height`. Bytes past the luma plane are ignored.
    pub fn new(luma: &'a [u8], width: u32, height: u32) -> Result<Self> {
        let len = width as usize * height as usize;
        if len == 0 || luma.len() < len {
            return Err(Error::InvalidArgument(format!(
                "{}x{} luminance source needs {} bytes but buffer holds {}",
                width,
                height,
                len,
                luma.len()
            )));
        }
        Ok(Self {
            luma: &luma[..len],
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma(&self) -> &'a [u8] {
        self.luma
    }

    /// Brightness at `(x, y)`, `None` outside the source.
    pub fn at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.luma
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

impl<'a> From<&'a Frame> for LuminanceSource<'a> {
    fn from(frame: &'a Frame) -> Self {
        // Frame construction already guarantees the luma plane is present
        Self {
            luma: frame.luma(),
            width: frame.width(),
            height: frame.height(),
        }
    }
}

/// A barcode recognition backend.
///
/// Finding nothing is `Ok(None)`; `Err` is reserved for the decoder failing.
pub trait BarcodeDecoder: Send + Sync {
    fn decode(&self, source: &LuminanceSource<'_>) -> Result<Option<Barcode>>;

    /// Formats this decoder can recognize at all.
    fn supported(&self) -> BarcodeFormats;
}

/// QR code decoder backed by `rqrr`.
#[derive(Clone, Debug, Default)]
pub struct QrDecoder {
    formats: BarcodeFormats,
}

impl QrDecoder {
    pub fn new(formats: BarcodeFormats) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &BarcodeFormats {
        &self.formats
    }
}

impl BarcodeDecoder for QrDecoder {
    fn decode(&self, source: &LuminanceSource<'_>) -> Result<Option<Barcode>> {
        if !self.formats.allows(BarcodeFormat::QrCode) {
            return Ok(None);
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            source.width() as usize,
            source.height() as usize,
            |x, y| source.at(x as u32, y as u32).unwrap_or(u8::MAX),
        );

        let grids = prepared.detect_grids();
        trace!(grids = grids.len(), "qr grid detection");

        let mut failure = None;
        for grid in grids {
            match grid.decode() {
                Ok((_, text)) => {
                    return Ok(Some(Barcode {
                        text,
                        format: BarcodeFormat::QrCode,
                    }))
                }
                Err(e) => {
                    debug!(error = ?e, "qr grid decode failed");
                    failure = Some(e);
                }
            }
        }

        // a located grid that cannot be read is a decoder failure, no grid at
        // all means nothing in view
        match failure {
            Some(e) => Err(Error::Decoder(format!("{:?}", e))),
            None => Ok(None),
        }
    }

    fn supported(&self) -> BarcodeFormats {
        [BarcodeFormat::QrCode].into_iter().collect()
    }
}
