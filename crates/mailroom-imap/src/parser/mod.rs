//! IMAP protocol parser.
//!
//! This module provides a sans-I/O parser for IMAP server responses. It does
//! no reading itself: the transport hands it one complete response (the line
//! plus any literal payloads) at a time.
//!
//! # Architecture
//!
//! - **Lexer**: Tokenizes raw bytes into IMAP tokens (atoms, strings, numbers, etc.)
//! - **Values**: Builds a generic tree of atoms, strings, literals, NIL and lists
//! - **Response Parser**: Interprets the tree into typed responses
//! - **Body structure**: Turns a `BODYSTRUCTURE` tree into numbered [`BodyPart`]s
//!
//! # Example
//!
//! ```
//! use mailroom_imap::parser::{ResponseParser, Response, UntaggedResponse};
//!
//! let input = b"* OK IMAP4rev1 server ready\r\n";
//! let response = ResponseParser::parse(input).unwrap();
//!
//! match response {
//!     Response::Untagged(UntaggedResponse::Ok { text, .. }) => {
//!         assert!(text.contains("IMAP4rev1"));
//!     }
//!     _ => panic!("Expected untagged OK"),
//! }
//! ```

mod bodystructure;
pub mod lexer;
pub mod response;
pub mod value;

pub use bodystructure::{BodyPart, Disposition, PartFilter};
pub use lexer::{Lexer, Token};
pub use response::{
    Address, Envelope, FetchData, Response, ResponseParser, UntaggedResponse, parse_envelope,
};
pub use value::{Value, parse_line};
