//! Interpreters that turn value trees into typed response data.

use std::collections::BTreeMap;

use crate::parser::lexer::Lexer;
use crate::parser::value::{Value, parse_until_bracket};
use crate::types::{
    ExtendedResult, Flag, Flags, MailboxAttribute, MailboxDescriptor, MailboxStatus, Namespace,
    NamespaceClass, Quota, QuotaResource, ResponseCode,
};
use crate::{Error, Result};

use super::types::UntaggedResponse;

/// Parses `[CODE args]`; the lexer must be on the `[`.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.advance();
    let name = lexer.read_atom_string()?.to_ascii_uppercase();

    let before = lexer.remaining();
    let args = parse_until_bracket(lexer)?;
    let consumed = before.len() - lexer.remaining().len();
    let raw = String::from_utf8_lossy(&before[..consumed.saturating_sub(1)])
        .trim()
        .to_string();

    let first_u32 = args.first().and_then(Value::as_u32);
    let first_u64 = args.first().and_then(Value::as_u64);
    let code = match (name.as_str(), first_u32) {
        ("ALERT", _) => ResponseCode::Alert,
        ("PARSE", _) => ResponseCode::Parse,
        ("READ-ONLY", _) => ResponseCode::ReadOnly,
        ("READ-WRITE", _) => ResponseCode::ReadWrite,
        ("TRYCREATE", _) => ResponseCode::TryCreate,
        ("NOMODSEQ", _) => ResponseCode::NoModSeq,
        ("CLOSED", _) => ResponseCode::Closed,
        ("CAPABILITY", _) => ResponseCode::Capability(atoms(&args)),
        ("PERMANENTFLAGS", _) => ResponseCode::PermanentFlags(
            args.first()
                .map(|list| flags_from(list).iter().cloned().collect())
                .unwrap_or_default(),
        ),
        ("UIDNEXT", Some(n)) => ResponseCode::UidNext(n),
        ("UIDVALIDITY", Some(n)) => ResponseCode::UidValidity(n),
        ("UNSEEN", Some(n)) => ResponseCode::Unseen(n),
        ("HIGHESTMODSEQ", _) if first_u64.is_some() => {
            ResponseCode::HighestModSeq(first_u64.unwrap_or_default())
        }
        _ => ResponseCode::Other {
            name,
            data: (!raw.is_empty()).then_some(raw),
        },
    };

    Ok(code)
}

/// String forms of every scalar in `values`.
pub fn atoms(values: &[Value]) -> Vec<String> {
    values.iter().filter_map(Value::to_text).collect()
}

/// Parses `(\Seen \Answered ...)`; anything else yields no flags.
pub fn flags_from(value: &Value) -> Flags {
    value
        .as_list()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(Flag::parse)
                .collect()
        })
        .unwrap_or_default()
}

/// Numbers from a SEARCH or SORT line; a trailing `(MODSEQ n)` is skipped.
pub fn parse_id_list(values: &[Value]) -> Vec<u32> {
    values.iter().filter_map(Value::as_u32).collect()
}

/// `LIST (attrs) delim name [extended]`.
pub fn parse_list(values: &[Value], raw: &[u8]) -> Result<MailboxDescriptor> {
    let malformed = || Error::Parse {
        position: 0,
        message: "Malformed LIST response".to_string(),
        raw: crate::parser::lexer::raw_excerpt(raw),
    };

    let attributes = values
        .first()
        .and_then(Value::as_list)
        .ok_or_else(malformed)?
        .iter()
        .filter_map(Value::as_str)
        .map(MailboxAttribute::parse)
        .collect();

    let delimiter = match values.get(1) {
        Some(Value::Nil) => None,
        Some(v) => v.as_str().and_then(|s| s.chars().next()),
        None => return Err(malformed()),
    };

    let mut name = values.get(2).and_then(Value::to_text).ok_or_else(malformed)?;
    if name.eq_ignore_ascii_case("INBOX") {
        name = "INBOX".to_string();
    }

    Ok(MailboxDescriptor {
        name,
        delimiter,
        attributes,
        ..MailboxDescriptor::default()
    })
}

/// `STATUS name (MESSAGES n UNSEEN n ...)`.
pub fn parse_status(values: &[Value]) -> Option<(String, MailboxStatus)> {
    let mailbox = values.first()?.to_text()?;
    let mut status = MailboxStatus::default();

    for pair in values.get(1)?.as_list()?.chunks_exact(2) {
        let Some(name) = pair[0].as_str() else {
            continue;
        };
        let value = &pair[1];
        match name.to_ascii_uppercase().as_str() {
            "MESSAGES" => status.messages = value.as_u32().unwrap_or_default(),
            "RECENT" => status.recent = value.as_u32(),
            "UIDNEXT" => status.uid_next = value.as_u32(),
            "UIDVALIDITY" => status.uid_validity = value.as_u32(),
            "UNSEEN" => status.unseen = value.as_u32(),
            "HIGHESTMODSEQ" => status.highest_modseq = value.as_u64(),
            _ => {}
        }
    }

    Some((mailbox, status))
}

/// `ESEARCH [(TAG "x")] [UID] (name value)*`.
pub fn parse_esearch(values: &[Value]) -> UntaggedResponse {
    let mut rest = values;
    let mut tag = None;
    let mut uid = false;

    if let Some(Value::List(correlator)) = rest.first() {
        if correlator.first().is_some_and(|v| v.is_atom("TAG")) {
            tag = correlator.get(1).and_then(Value::to_text);
        }
        rest = &rest[1..];
    }
    if rest.first().is_some_and(|v| v.is_atom("UID")) {
        uid = true;
        rest = &rest[1..];
    }

    let mut result = ExtendedResult::default();
    for pair in rest.chunks_exact(2) {
        let Some(name) = pair[0].as_str() else {
            continue;
        };
        match name.to_ascii_uppercase().as_str() {
            "MIN" => result.min = pair[1].as_u32(),
            "MAX" => result.max = pair[1].as_u32(),
            "COUNT" => result.count = pair[1].as_u32(),
            "ALL" => result.all = pair[1].to_text(),
            _ => {}
        }
    }

    UntaggedResponse::ESearch { tag, uid, result }
}

/// Three NAMESPACE sections, each NIL or `((prefix delim ...) ...)`.
pub fn parse_namespace(values: &[Value]) -> Vec<Namespace> {
    const CLASSES: [NamespaceClass; 3] = [
        NamespaceClass::Personal,
        NamespaceClass::OtherUsers,
        NamespaceClass::Shared,
    ];

    let mut namespaces = Vec::new();
    for (class, section) in CLASSES.into_iter().zip(values) {
        let Some(entries) = section.as_list() else {
            continue;
        };
        for entry in entries.iter().filter_map(Value::as_list) {
            let Some(prefix) = entry.first().and_then(Value::to_text) else {
                continue;
            };
            namespaces.push(Namespace {
                class,
                prefix,
                delimiter: entry
                    .get(1)
                    .and_then(Value::as_str)
                    .and_then(|d| d.chars().next()),
            });
        }
    }
    namespaces
}

/// `QUOTA root (name usage limit ...)`.
pub fn parse_quota(values: &[Value]) -> Quota {
    let root = values.first().and_then(Value::to_text).unwrap_or_default();
    let resources = values
        .get(1)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .chunks_exact(3)
                .filter_map(|triple| {
                    Some(QuotaResource {
                        name: triple[0].to_text()?.to_ascii_uppercase(),
                        usage: triple[1].as_u64()?,
                        limit: triple[2].as_u64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Quota { root, resources }
}

/// `ID NIL` or `ID ("name" "value" ...)`.
pub fn parse_id(values: &[Value]) -> BTreeMap<String, Option<String>> {
    values
        .first()
        .and_then(Value::as_list)
        .map(|items| {
            items
                .chunks_exact(2)
                .filter_map(|pair| Some((pair[0].to_text()?, pair[1].to_text())))
                .collect()
        })
        .unwrap_or_default()
}
