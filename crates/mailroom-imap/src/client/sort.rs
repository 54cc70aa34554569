//! Client-side ordering for servers without SORT.

use std::cmp::Ordering;

use chrono::DateTime;

use crate::command::FetchAttribute;
use crate::parser::{Address, FetchData};
use crate::types::SortKey;

/// Value a message is ordered by. Messages lacking the field sort first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum SortValue {
    Missing,
    Time(i64),
    Number(u64),
    Text(String),
}

/// FETCH items needed to compute `key`.
pub(super) fn fetch_items_for(key: SortKey) -> Vec<FetchAttribute> {
    let item = match key {
        SortKey::Arrival => FetchAttribute::InternalDate,
        SortKey::Size => FetchAttribute::Rfc822Size,
        SortKey::Date | SortKey::From | SortKey::To | SortKey::Cc | SortKey::Subject => {
            FetchAttribute::Envelope
        }
    };
    vec![FetchAttribute::Uid, item]
}

pub(super) fn sort_value(key: SortKey, data: &FetchData) -> SortValue {
    let envelope = data.envelope.as_ref();
    match key {
        SortKey::Arrival => data
            .internal_date
            .as_deref()
            .and_then(parse_internal_date)
            .map_or(SortValue::Missing, SortValue::Time),
        SortKey::Size => data
            .size
            .map_or(SortValue::Missing, |size| SortValue::Number(u64::from(size))),
        SortKey::Date => envelope
            .and_then(|e| e.date.as_deref())
            .and_then(parse_header_date)
            .map_or(SortValue::Missing, SortValue::Time),
        SortKey::From => address_value(envelope.map(|e| e.from.as_slice())),
        SortKey::To => address_value(envelope.map(|e| e.to.as_slice())),
        SortKey::Cc => address_value(envelope.map(|e| e.cc.as_slice())),
        SortKey::Subject => envelope
            .and_then(|e| e.subject.as_deref())
            .map_or(SortValue::Missing, |s| SortValue::Text(base_subject(s))),
    }
}

/// Orders `(id, value)` pairs by value, then id, and returns the ids.
pub(super) fn order(mut pairs: Vec<(u32, SortValue)>, descending: bool) -> Vec<u32> {
    pairs.sort_by(|a, b| match a.1.cmp(&b.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    let ids = pairs.into_iter().map(|(id, _)| id);
    if descending {
        ids.rev().collect()
    } else {
        ids.collect()
    }
}

/// `17-Jul-1996 02:44:25 -0700`, day possibly space-padded.
fn parse_internal_date(text: &str) -> Option<i64> {
    DateTime::parse_from_str(text.trim(), "%d-%b-%Y %H:%M:%S %z")
        .ok()
        .map(|dt| dt.timestamp())
}

fn parse_header_date(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp());
    }
    // trailing zone comment, e.g. "+0000 (UTC)"
    let (head, _) = text.rsplit_once(" (")?;
    DateTime::parse_from_rfc2822(head.trim_end())
        .ok()
        .map(|dt| dt.timestamp())
}

fn address_value(addresses: Option<&[Address]>) -> SortValue {
    addresses
        .and_then(<[Address]>::first)
        .and_then(|a| a.mailbox.as_deref())
        .map_or(SortValue::Missing, |mailbox| {
            SortValue::Text(mailbox.to_lowercase())
        })
}

/// Subject with reply and forward markers removed, lowercased.
fn base_subject(subject: &str) -> String {
    let mut subject = mailroom_mime::encoding::decode_rfc2047(subject)
        .trim()
        .to_lowercase();

    loop {
        let trimmed = subject
            .strip_suffix("(fwd)")
            .map(str::trim_end)
            .unwrap_or(&subject);
        let trimmed = ["re:", "fwd:", "fw:"]
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
            .map_or(trimmed, str::trim_start);
        if trimmed.len() == subject.len() {
            return subject;
        }
        subject = trimmed.to_string();
    }
}
