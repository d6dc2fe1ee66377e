// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors reported by the frame kernel, the barcode layer and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    /// Empty buffer, zero geometry, size mismatch or out-of-bounds sample.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A barcode type name that no decoder knows about.
    #[error("unsupported barcode format: {0}")]
    UnsupportedBarcodeFormat(String),

    /// The barcode library failed for a reason other than "nothing found".
    #[error("barcode decoder failed: {0}")]
    Decoder(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidArgument(msg.into())
}
