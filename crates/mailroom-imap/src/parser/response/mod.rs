//! IMAP response parser.
//!
//! Each server line (with its literals already attached) is tokenized by the
//! [`Lexer`], turned into a [`Value`] tree, and then interpreted into a typed
//! [`Response`]. Data the parser does not recognise is kept as
//! [`UntaggedResponse::Other`] instead of failing the whole exchange.

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use fetch::parse_envelope;
pub use types::{Address, Envelope, FetchData, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::parser::value::{Value, parse_value, parse_values};
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

use helpers::{
    atoms, flags_from, parse_esearch, parse_id, parse_id_list, parse_list, parse_namespace,
    parse_quota, parse_response_code, parse_status,
};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: String,
        /// Response status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Optional text/data.
        text: Option<String>,
    },
}

impl Response {
    /// Returns true for an untagged BYE.
    #[must_use]
    pub const fn is_bye(&self) -> bool {
        matches!(self, Self::Untagged(UntaggedResponse::Bye { .. }))
    }
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response line.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer, input),
            Token::Plus => Ok(Self::parse_continuation(&mut lexer)),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag.to_string()),
            Token::Number(n) => Self::parse_tagged(&mut lexer, n.to_string()),
            token => Err(lexer.error(&format!("Expected *, +, or tag, got {token:?}"))),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: String) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag,
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>, input: &[u8]) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Number(n) => Self::parse_message_data(lexer, n)?,
            Token::Atom(keyword) => Self::parse_keyword_data(lexer, keyword, input)?,
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected token in untagged response: {token:?}"
                )));
            }
        };

        Ok(Response::Untagged(untagged))
    }

    /// `* n EXISTS`, `* n FETCH (...)`, ...
    fn parse_message_data(lexer: &mut Lexer<'_>, n: u32) -> Result<UntaggedResponse> {
        lexer.expect_space()?;
        let keyword = lexer.read_atom_string()?.to_ascii_uppercase();

        let data = match keyword.as_str() {
            "EXISTS" => UntaggedResponse::Exists(n),
            "RECENT" => UntaggedResponse::Recent(n),
            "EXPUNGE" => UntaggedResponse::Expunge(n),
            "FETCH" => {
                lexer.skip_spaces();
                let items = parse_value(lexer)?;
                UntaggedResponse::Fetch(Box::new(fetch::parse_fetch(n, &items)?))
            }
            _ => {
                lexer.skip_spaces();
                let rest = lexer.read_text_until_crlf();
                UntaggedResponse::Other {
                    text: if rest.is_empty() {
                        n.to_string()
                    } else {
                        format!("{n} {rest}")
                    },
                    keyword,
                }
            }
        };

        Ok(data)
    }

    fn parse_keyword_data(
        lexer: &mut Lexer<'_>,
        keyword: &str,
        input: &[u8],
    ) -> Result<UntaggedResponse> {
        let upper = keyword.to_ascii_uppercase();

        if let Some(status) = Status::parse(&upper) {
            let (code, text) = Self::parse_resp_text(lexer)?;
            return Ok(match status {
                Status::Ok => UntaggedResponse::Ok { code, text },
                Status::No => UntaggedResponse::No { code, text },
                Status::Bad => UntaggedResponse::Bad { code, text },
                Status::PreAuth => UntaggedResponse::PreAuth { code, text },
                Status::Bye => UntaggedResponse::Bye { code, text },
            });
        }

        lexer.skip_spaces();
        let raw = lexer.remaining();

        // Unknown keywords keep their text; their payload may not be valid
        // value syntax.
        let known = matches!(
            upper.as_str(),
            "CAPABILITY"
                | "ENABLED"
                | "FLAGS"
                | "LIST"
                | "LSUB"
                | "SEARCH"
                | "SORT"
                | "ESEARCH"
                | "STATUS"
                | "NAMESPACE"
                | "QUOTA"
                | "QUOTAROOT"
                | "ID"
        );
        if !known {
            return Ok(UntaggedResponse::Other {
                keyword: upper,
                text: lexer.read_text_until_crlf(),
            });
        }

        let values = parse_values(lexer)?;
        let data = match upper.as_str() {
            "CAPABILITY" => UntaggedResponse::Capability(atoms(&values)),
            "ENABLED" => UntaggedResponse::Enabled(atoms(&values)),
            "FLAGS" => UntaggedResponse::Flags(values.first().map(flags_from).unwrap_or_default()),
            "LIST" | "LSUB" => UntaggedResponse::List(parse_list(&values, input)?),
            "SEARCH" => UntaggedResponse::Search(parse_id_list(&values)),
            "SORT" => UntaggedResponse::Sort(parse_id_list(&values)),
            "ESEARCH" => parse_esearch(&values),
            "STATUS" => {
                let (mailbox, status) = parse_status(&values).ok_or_else(|| Error::Parse {
                    position: lexer.position(),
                    message: "Malformed STATUS response".to_string(),
                    raw: crate::parser::lexer::raw_excerpt(input),
                })?;
                UntaggedResponse::Status { mailbox, status }
            }
            "NAMESPACE" => UntaggedResponse::Namespace(parse_namespace(&values)),
            "QUOTA" => UntaggedResponse::Quota(parse_quota(&values)),
            "QUOTAROOT" => {
                let mut names = values.iter().filter_map(Value::to_text);
                UntaggedResponse::QuotaRoot {
                    mailbox: names.next().unwrap_or_default(),
                    roots: names.collect(),
                }
            }
            "ID" => UntaggedResponse::Id(parse_id(&values)),
            _ => UntaggedResponse::Other {
                keyword: upper,
                text: String::from_utf8_lossy(raw).trim_end().to_string(),
            },
        };

        Ok(data)
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        lexer.skip_spaces();
        let text = lexer.read_text_until_crlf();

        Response::Continuation {
            text: if text.is_empty() { None } else { Some(text) },
        }
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        Status::parse(s).ok_or_else(|| lexer.error(&format!("Invalid status: {s}")))
    }

    /// Parses `[code] text`; both parts are optional.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        lexer.skip_spaces();

        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };

        lexer.skip_spaces();
        let text = lexer.read_text_until_crlf();

        Ok((code, text))
    }
}
