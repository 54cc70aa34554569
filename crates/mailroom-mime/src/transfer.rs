//! Content-Transfer-Encoding handling.

use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use std::fmt;

/// Content transfer encoding of a body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a transfer encoding name. Unknown names map to 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }

    /// Decodes a body according to this encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a Base64 body is not valid Base64 or is not
    /// ASCII text.
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => {
                let text = std::str::from_utf8(data)
                    .map_err(|_| Error::InvalidEncoding("non-ASCII byte in base64 body".into()))?;
                decode_base64(text)
            }
            Self::QuotedPrintable => Ok(decode_quoted_printable(data)),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(data.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}
