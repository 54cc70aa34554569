//! FETCH response parsing.

use crate::Result;
use crate::parser::BodyPart;
use crate::parser::value::Value;

use super::helpers::flags_from;
use super::types::{Address, Envelope, FetchData};

/// Interprets the parenthesized item list of `* n FETCH (...)`.
pub fn parse_fetch(seq: u32, value: &Value) -> Result<FetchData> {
    let mut data = FetchData {
        seq,
        ..FetchData::default()
    };

    let Some(items) = value.as_list() else {
        return Ok(data);
    };

    for pair in items.chunks(2) {
        let Some(name) = pair[0].as_str() else {
            continue;
        };
        let Some(item) = pair.get(1) else {
            data.other.push((name.to_string(), Value::Nil));
            break;
        };

        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "UID" => data.uid = item.as_u32(),
            "FLAGS" => data.flags = Some(flags_from(item)),
            "INTERNALDATE" => data.internal_date = item.to_text(),
            "RFC822.SIZE" => data.size = item.as_u32(),
            "ENVELOPE" => data.envelope = parse_envelope(item),
            "BODYSTRUCTURE" | "BODY" => data.body_structure = Some(BodyPart::from_value(item)?),
            "RFC822" => insert_section(&mut data, String::new(), item),
            "RFC822.HEADER" => insert_section(&mut data, "HEADER".to_string(), item),
            "RFC822.TEXT" => insert_section(&mut data, "TEXT".to_string(), item),
            "MODSEQ" => {
                data.modseq = item
                    .as_list()
                    .and_then(|l| l.first())
                    .and_then(Value::as_u64);
            }
            _ => match section_name(&upper, name) {
                Some(section) => insert_section(&mut data, section, item),
                None => data.other.push((name.to_string(), item.clone())),
            },
        }
    }

    Ok(data)
}

/// Section text of `BODY[...]<n>` or `BINARY[...]`, without the origin.
fn section_name(upper: &str, name: &str) -> Option<String> {
    if !(upper.starts_with("BODY[") || upper.starts_with("BINARY[")) {
        return None;
    }
    let open = name.find('[')?;
    let close = name.rfind(']')?;
    (close > open).then(|| name[open + 1..close].to_string())
}

fn insert_section(data: &mut FetchData, section: String, item: &Value) {
    let bytes = match item {
        Value::Nil => None,
        other => other.as_bytes().map(<[u8]>::to_vec),
    };
    data.sections.insert(section, bytes);
}

/// Parses an ENVELOPE list; anything that is not a ten-item list is None.
#[must_use]
pub fn parse_envelope(value: &Value) -> Option<Envelope> {
    let items = value.as_list()?;
    if items.len() < 10 {
        return None;
    }

    let text = |i: usize| items[i].to_text();
    Some(Envelope {
        date: text(0),
        subject: text(1),
        from: parse_address_list(&items[2]),
        sender: parse_address_list(&items[3]),
        reply_to: parse_address_list(&items[4]),
        to: parse_address_list(&items[5]),
        cc: parse_address_list(&items[6]),
        bcc: parse_address_list(&items[7]),
        in_reply_to: text(8),
        message_id: text(9),
    })
}

fn parse_address_list(value: &Value) -> Vec<Address> {
    let Some(items) = value.as_list() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_list)
        .filter(|fields| fields.len() >= 4)
        .map(|fields| Address {
            name: fields[0].to_text(),
            adl: fields[1].to_text(),
            mailbox: fields[2].to_text(),
            host: fields[3].to_text(),
        })
        .collect()
}
