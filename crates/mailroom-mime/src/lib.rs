//! # mailroom-mime
//!
//! Decoding helpers for the message data an IMAP client pulls off the wire.
//!
//! ## Features
//!
//! - **Header blocks**: Parse RFC 5322 header sections, preserving order
//! - **Encoded words**: RFC 2047 `=?charset?B|Q?...?=` decoding, never failing
//! - **Transfer encodings**: Base64 and Quoted-Printable bodies
//! - **Charsets**: UTF-8, US-ASCII, ISO-8859-1 and Windows-1252
//!
//! ## Quick Start
//!
//! ```
//! use mailroom_mime::{Headers, TransferEncoding};
//! use mailroom_mime::encoding::decode_rfc2047;
//!
//! assert_eq!(decode_rfc2047("=?UTF-8?B?amFzb24=?="), "jason");
//!
//! let headers = Headers::parse("Subject: =?utf-8?Q?caf=C3=A9?=\r\n\r\n");
//! assert_eq!(headers.decoded().get("subject"), Some("café"));
//!
//! let body = TransferEncoding::parse("base64").decode(b"aGVsbG8=").unwrap();
//! assert_eq!(body, b"hello");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod header;
mod transfer;

pub mod encoding;

pub use error::{Error, Result};
pub use header::Headers;
pub use transfer::TransferEncoding;
