//! Message-level operations on the selected mailbox.

use std::collections::{BTreeMap, BTreeSet};

use mailroom_mime::Headers;
use mailroom_mime::encoding::decode_rfc2047;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::sort::{fetch_items_for, order, sort_value};
use super::{MailboxClient, command_args};
use crate::cache::{CacheKey, CachedValue};
use crate::command::{Command, FetchAttribute, StoreAction};
use crate::parser::{Address, BodyPart, FetchData, UntaggedResponse};
use crate::types::{
    Flag, MessageAction, MessageContent, MessageSummary, SearchQuery, SearchResult, SearchReturn,
    SortKey, sequence,
};
use crate::{Error, Result};

impl<S> MailboxClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Searches the selected mailbox.
    ///
    /// With return options and ESEARCH, the result is
    /// [`SearchResult::Extended`]; otherwise it is the matching ids in the
    /// order the server reported them.
    pub async fn search(&mut self, query: &SearchQuery) -> Result<SearchResult> {
        let mailbox = self.require_selected()?;
        let extended =
            !query.return_options().is_empty() && self.engine.has_capability("ESEARCH");

        let header = query
            .header_term()
            .map(|(field, value)| (field.to_string(), value.to_string()));
        let mut criteria = query.criteria().trim().to_string();
        if criteria.is_empty() && header.is_none() && query.sequence_set().is_none() {
            criteria = "ALL".to_string();
        }
        let non_ascii = !criteria.is_ascii()
            || header
                .as_ref()
                .is_some_and(|(field, value)| !field.is_ascii() || !value.is_ascii());

        let command = Command::Search {
            uid: self.use_uids,
            returning: if extended {
                query.return_options().to_vec()
            } else {
                Vec::new()
            },
            charset: non_ascii.then(|| "UTF-8".to_string()),
            sequence: query.sequence_set().map(str::to_string),
            criteria,
            header,
        };
        let key = CacheKey::new(Some(&mailbox), "SEARCH", command_args(&command));
        if let Some(CachedValue::Search(result)) = self.cached(&key) {
            return Ok(result.clone());
        }

        let responses = self.engine.execute(&command).await?.responses;
        let result = if extended {
            SearchResult::Extended(
                responses
                    .into_iter()
                    .find_map(|response| match response {
                        UntaggedResponse::ESearch { result, .. } => Some(result),
                        _ => None,
                    })
                    .unwrap_or_default(),
            )
        } else {
            SearchResult::Simple(
                responses
                    .into_iter()
                    .filter_map(|response| match response {
                        UntaggedResponse::Search(ids) => Some(ids),
                        _ => None,
                    })
                    .flatten()
                    .collect(),
            )
        };

        self.remember(key, CachedValue::Search(result.clone()));
        Ok(result)
    }

    /// Fetches summaries for `ids`. Ids the server does not know are absent.
    pub async fn get_message_list(&mut self, ids: &[u32]) -> Result<BTreeMap<u32, MessageSummary>> {
        let mailbox = self.require_selected()?;
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let command = Command::Fetch {
            sequence: sequence::compress(ids),
            items: vec![
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::InternalDate,
                FetchAttribute::Rfc822Size,
                FetchAttribute::Envelope,
            ],
            uid: self.use_uids,
        };
        let key = CacheKey::new(Some(&mailbox), "FETCH", command_args(&command));
        if let Some(CachedValue::Messages(list)) = self.cached(&key) {
            return Ok(list.clone());
        }

        let wanted: BTreeSet<u32> = ids.iter().copied().collect();
        let mut list = BTreeMap::new();
        for data in self.fetch(&command).await? {
            let id = data.id(self.use_uids);
            if wanted.contains(&id) {
                list.insert(id, summarize(data));
            }
        }

        debug!(requested = wanted.len(), found = list.len(), "message summaries");
        self.remember(key, CachedValue::Messages(list.clone()));
        Ok(list)
    }

    /// Fetches and parses a message's BODYSTRUCTURE.
    pub async fn get_message_structure(&mut self, id: u32) -> Result<BodyPart> {
        let mailbox = self.require_selected()?;
        let command = Command::Fetch {
            sequence: id.to_string(),
            items: vec![FetchAttribute::Uid, FetchAttribute::BodyStructure],
            uid: self.use_uids,
        };
        let key = CacheKey::new(Some(&mailbox), "FETCH", command_args(&command));
        if let Some(CachedValue::Structure(tree)) = self.cached(&key) {
            return Ok(tree.clone());
        }

        let tree = self
            .fetch_one(id, &command)
            .await?
            .body_structure
            .ok_or_else(|| Error::Protocol(format!("no BODYSTRUCTURE for message {id}")))?;

        self.remember(key, CachedValue::Structure(tree.clone()));
        Ok(tree)
    }

    /// Fetches and decodes the header block of a part.
    ///
    /// The top-level part (`""`, `"0"` or the root's own number) gives the
    /// message header; an encapsulated `message/rfc822` part, or the
    /// multipart `<p>.0` body inside it, gives that message's header; any
    /// other part gives its MIME header. A `Flags` field holds the
    /// message's current flags.
    pub async fn get_message_headers(&mut self, id: u32, part: &str) -> Result<Headers> {
        let mailbox = self.require_selected()?;
        let tree = self.get_message_structure(id).await?;
        let section = header_section(&tree, part)?;

        let command = Command::Fetch {
            sequence: id.to_string(),
            items: vec![
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::peek(section.clone()),
            ],
            uid: self.use_uids,
        };
        let key = CacheKey::new(Some(&mailbox), "FETCH", command_args(&command));
        if let Some(CachedValue::Headers(headers)) = self.cached(&key) {
            return Ok(headers.clone());
        }

        let data = self.fetch_one(id, &command).await?;
        let raw = data.section(&section).unwrap_or_default();
        let mut headers = Headers::parse(&String::from_utf8_lossy(raw)).decoded();
        headers.set(
            "Flags",
            data.flags.map(|flags| flags.to_string()).unwrap_or_default(),
        );

        self.remember(key, CachedValue::Headers(headers.clone()));
        Ok(headers)
    }

    /// Fetches a part and reverses its transfer encoding.
    ///
    /// An empty part or `"0"` means the whole message body.
    pub async fn get_message_content(&mut self, id: u32, part: &str) -> Result<MessageContent> {
        let tree = self.get_message_structure(id).await?;
        let node = find_part(&tree, part)?.clone();
        self.fetch_content(id, &node).await
    }

    /// Content of the first leaf of `media_type/subtype`, depth-first, or
    /// `None` if the message has no such part.
    pub async fn get_first_message_part(
        &mut self,
        id: u32,
        media_type: &str,
        subtype: &str,
    ) -> Result<Option<MessageContent>> {
        let tree = self.get_message_structure(id).await?;
        let Some(node) = tree.find_first(media_type, subtype).cloned() else {
            return Ok(None);
        };
        self.fetch_content(id, &node).await.map(Some)
    }

    /// Starts streaming a part's raw bytes and returns their length.
    ///
    /// `None` means the server sent no body (for example, no such message).
    /// After `Some(n)`, call [`read_stream_line`](Self::read_stream_line)
    /// until it returns `None`; no other command can be sent meanwhile.
    pub async fn start_message_stream(&mut self, id: u32, part: &str) -> Result<Option<usize>> {
        self.require_selected()?;
        let section = if part.is_empty() || part == "0" {
            String::new()
        } else {
            part.to_string()
        };
        let command = Command::Fetch {
            sequence: id.to_string(),
            items: vec![FetchAttribute::peek(section)],
            uid: self.use_uids,
        };
        self.engine.start_stream(&command).await
    }

    /// Next raw line of the streamed part, or `None` once it is exhausted.
    pub async fn read_stream_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.engine.read_stream_line().await
    }

    /// One page of ids from `mailbox` in sort order.
    ///
    /// The mailbox is selected first unless it already is.
    pub async fn get_mailbox_page(
        &mut self,
        mailbox: &str,
        key: SortKey,
        descending: bool,
        criteria: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<u32>> {
        self.require_connected()?;
        if self.engine.state().selected_mailbox() != Some(mailbox) {
            self.select_mailbox(mailbox).await?;
        }
        let ids = self
            .get_message_sort_order(key, descending, criteria, &[])
            .await?
            .ids();
        Ok(ids.into_iter().skip(offset).take(limit).collect())
    }

    /// Sorts the messages matching `criteria` on the client.
    pub async fn sort_by_fetch(
        &mut self,
        key: SortKey,
        descending: bool,
        criteria: &str,
    ) -> Result<Vec<u32>> {
        let ids = self.search(&SearchQuery::new(criteria)).await?.ids();
        if ids.is_empty() {
            return Ok(ids);
        }

        let command = Command::Fetch {
            sequence: sequence::compress(&ids),
            items: fetch_items_for(key),
            uid: self.use_uids,
        };
        let wanted: BTreeSet<u32> = ids.into_iter().collect();
        let pairs = self
            .fetch(&command)
            .await?
            .iter()
            .map(|data| (data.id(self.use_uids), data))
            .filter(|(id, _)| wanted.contains(id))
            .map(|(id, data)| (id, sort_value(key, data)))
            .collect();
        Ok(order(pairs, descending))
    }

    /// Sorts with SORT (or ESORT for return options) when the server has
    /// it, and on the client otherwise.
    pub async fn get_message_sort_order(
        &mut self,
        key: SortKey,
        descending: bool,
        criteria: &str,
        returning: &[SearchReturn],
    ) -> Result<SearchResult> {
        let mailbox = self.require_selected()?;
        let criteria = match criteria.trim() {
            "" => "ALL",
            c => c,
        };

        if !self.engine.has_capability("SORT") {
            debug!(key = key.as_str(), "no SORT, sorting on the client");
            let ids = self.sort_by_fetch(key, descending, criteria).await?;
            return Ok(if returning.is_empty() {
                SearchResult::Simple(ids)
            } else {
                SearchResult::summarize(&ids, returning)
            });
        }

        let extended = !returning.is_empty() && self.engine.has_capability("ESORT");
        let command = Command::Sort {
            uid: self.use_uids,
            returning: if extended { returning.to_vec() } else { Vec::new() },
            key,
            reverse: descending,
            charset: if criteria.is_ascii() { "US-ASCII" } else { "UTF-8" }.to_string(),
            criteria: criteria.to_string(),
        };
        let cache_key = CacheKey::new(Some(&mailbox), "SORT", command_args(&command));
        if let Some(CachedValue::Search(result)) = self.cached(&cache_key) {
            return Ok(result.clone());
        }

        let responses = self.engine.execute(&command).await?.responses;
        let result = if extended {
            SearchResult::Extended(
                responses
                    .into_iter()
                    .find_map(|response| match response {
                        UntaggedResponse::ESearch { result, .. } => Some(result),
                        _ => None,
                    })
                    .unwrap_or_default(),
            )
        } else {
            let ids: Vec<u32> = responses
                .into_iter()
                .filter_map(|response| match response {
                    UntaggedResponse::Sort(ids) => Some(ids),
                    _ => None,
                })
                .flatten()
                .collect();
            if returning.is_empty() {
                SearchResult::Simple(ids)
            } else {
                SearchResult::summarize(&ids, returning)
            }
        };

        self.remember(cache_key, CachedValue::Search(result.clone()));
        Ok(result)
    }

    /// Applies an action to `ids`.
    ///
    /// Flag actions use a silent STORE. `Expunge` removes every message
    /// marked `\Deleted`, not only `ids`. `Move` falls back to COPY, STORE
    /// and EXPUNGE when the server lacks MOVE. That EXPUNGE is limited to
    /// `ids` with UIDPLUS in UID mode; otherwise it also removes any other
    /// message already marked `\Deleted`.
    pub async fn message_action(&mut self, action: &MessageAction, ids: &[u32]) -> Result<()> {
        self.require_selected()?;
        if ids.is_empty() && *action != MessageAction::Expunge {
            return Err(Error::InvalidArgument(format!("{action}: no message ids")));
        }
        let set = sequence::compress(ids);
        let uid = self.use_uids;

        if let Some((verb, flag)) = action.store() {
            self.store(&set, verb, flag).await?;
        } else {
            match action {
                MessageAction::Copy(target) => {
                    self.engine
                        .execute(&Command::Copy {
                            sequence: set,
                            mailbox: target.clone(),
                            uid,
                        })
                        .await?;
                }
                MessageAction::Move(target) if self.engine.has_capability("MOVE") => {
                    self.engine
                        .execute(&Command::Move {
                            sequence: set,
                            mailbox: target.clone(),
                            uid,
                        })
                        .await?;
                }
                MessageAction::Move(target) => {
                    self.engine
                        .execute(&Command::Copy {
                            sequence: set.clone(),
                            mailbox: target.clone(),
                            uid,
                        })
                        .await?;
                    self.store(&set, '+', Flag::Deleted).await?;
                    let expunge = if uid && self.engine.has_capability("UIDPLUS") {
                        Command::UidExpunge { sequence: set }
                    } else {
                        warn!("no UIDPLUS, EXPUNGE also removes other deleted messages");
                        Command::Expunge
                    };
                    self.engine.execute(&expunge).await?;
                }
                _ => {
                    self.engine.execute(&Command::Expunge).await?;
                }
            }
        }

        self.bust_all(&["FETCH", "SEARCH", "SORT", "STATUS"]);
        Ok(())
    }

    async fn store(&mut self, set: &str, verb: char, flag: Flag) -> Result<()> {
        self.engine
            .execute(&Command::Store {
                sequence: set.to_string(),
                action: StoreAction::from_verb(verb, vec![flag]),
                uid: self.use_uids,
                silent: true,
            })
            .await?;
        Ok(())
    }

    async fn fetch(&mut self, command: &Command) -> Result<Vec<FetchData>> {
        let responses = self.engine.execute(command).await?.responses;
        Ok(responses
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::Fetch(data) => Some(*data),
                _ => None,
            })
            .collect())
    }

    async fn fetch_one(&mut self, id: u32, command: &Command) -> Result<FetchData> {
        let use_uids = self.use_uids;
        self.fetch(command)
            .await?
            .into_iter()
            .find(|data| data.id(use_uids) == id)
            .ok_or_else(|| Error::No(format!("message {id} does not exist")))
    }

    async fn fetch_content(&mut self, id: u32, node: &BodyPart) -> Result<MessageContent> {
        let section = content_section(node);
        let command = Command::Fetch {
            sequence: id.to_string(),
            items: vec![FetchAttribute::Uid, FetchAttribute::peek(section.clone())],
            uid: self.use_uids,
        };
        let mailbox = self.require_selected()?;
        let key = CacheKey::new(Some(&mailbox), "FETCH", command_args(&command));
        if let Some(CachedValue::Content(content)) = self.cached(&key) {
            return Ok(content.clone());
        }

        let data = self.fetch_one(id, &command).await?;
        let raw = data.section(&section).unwrap_or_default();
        let content = MessageContent {
            part_number: node.part_number.clone(),
            media_type: node.media_type.clone(),
            subtype: node.subtype.clone(),
            charset: node.charset().map(str::to_string),
            data: node.transfer_encoding().decode(raw)?,
        };

        self.remember(key, CachedValue::Content(content.clone()));
        Ok(content)
    }
}

fn find_part<'a>(tree: &'a BodyPart, part: &str) -> Result<&'a BodyPart> {
    if part.is_empty() || part == "0" {
        return Ok(tree);
    }
    tree.part(part)
        .ok_or_else(|| Error::InvalidArgument(format!("no part {part:?} in message")))
}

/// The message a multipart `<p>.0` node is the body of.
fn encapsulating_part(node: &BodyPart) -> Option<&str> {
    if node.is_multipart() {
        node.part_number.strip_suffix(".0")
    } else {
        None
    }
}

/// Multipart bodies have no section number of their own; their content is
/// the TEXT of the enclosing message.
fn content_section(node: &BodyPart) -> String {
    if node.is_multipart() && node.part_number == "0" {
        "TEXT".to_string()
    } else if let Some(parent) = encapsulating_part(node) {
        format!("{parent}.TEXT")
    } else {
        node.part_number.clone()
    }
}

fn header_section(tree: &BodyPart, part: &str) -> Result<String> {
    let node = find_part(tree, part)?;
    if node.part_number == tree.part_number {
        Ok("HEADER".to_string())
    } else if let Some(parent) = encapsulating_part(node) {
        Ok(format!("{parent}.HEADER"))
    } else if node.media_type == "message" && node.subtype == "rfc822" {
        Ok(format!("{}.HEADER", node.part_number))
    } else {
        Ok(format!("{}.MIME", node.part_number))
    }
}

fn summarize(data: FetchData) -> MessageSummary {
    let envelope = data.envelope.unwrap_or_default();
    MessageSummary {
        seq: data.seq,
        uid: data.uid,
        flags: data.flags.unwrap_or_default(),
        size: data.size,
        internal_date: data.internal_date,
        date: envelope.date,
        subject: envelope
            .subject
            .as_deref()
            .map(decode_rfc2047)
            .unwrap_or_default(),
        from: format_addresses(&envelope.from),
        to: format_addresses(&envelope.to),
        cc: format_addresses(&envelope.cc),
        message_id: envelope.message_id,
        in_reply_to: envelope.in_reply_to,
    }
}

fn format_addresses(addresses: &[Address]) -> String {
    addresses
        .iter()
        .filter_map(|address| {
            let email = address.email()?;
            Some(match address.name.as_deref().map(decode_rfc2047) {
                Some(name) if !name.is_empty() => format!("{name} <{email}>"),
                _ => email,
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::Config;
    use crate::types::ExtendedResult;
    use tokio_test::io::{Builder, Mock};

    const SINGLE_PART: &[u8] =
        b"* 1 FETCH (UID 3 BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"utf-8\") NIL NIL \"QUOTED-PRINTABLE\" 10 1 NIL NIL NIL))\r\n";

    fn login<'a>(builder: &'a mut Builder, extra: &str) -> &'a mut Builder {
        let caps = format!("IMAP4rev1 {extra}");
        let caps = caps.trim_end();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(format!("* CAPABILITY {caps}\r\n").as_bytes())
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 LOGIN jason secret\r\n")
            .read(format!("A0002 OK [CAPABILITY {caps}] done\r\n").as_bytes())
            .write(b"A0003 SELECT INBOX\r\n")
            .read(b"* 25 EXISTS\r\n")
            .read(b"A0003 OK [READ-WRITE] done\r\n")
    }

    async fn selected(mock: Mock) -> MailboxClient<Mock> {
        let mut client = MailboxClient::new();
        let config = Config::new("imap.example.com", "jason", "secret");
        client.connect_with(mock, &config).await.unwrap();
        client.select_mailbox("INBOX").await.unwrap();
        client
    }

    #[test]
    fn test_format_addresses() {
        let addresses = vec![
            Address {
                name: Some("=?UTF-8?B?amFzb24=?=".to_string()),
                mailbox: Some("jason".to_string()),
                host: Some("shop.localdomain".to_string()),
                adl: None,
            },
            Address {
                name: None,
                mailbox: Some("root".to_string()),
                host: Some("localhost".to_string()),
                adl: None,
            },
        ];
        assert_eq!(
            format_addresses(&addresses),
            "jason <jason@shop.localdomain>, root@localhost"
        );
    }

    #[test]
    fn test_header_section_rules() {
        let single = BodyPart {
            part_number: "1".to_string(),
            media_type: "text".to_string(),
            subtype: "plain".to_string(),
            ..BodyPart::default()
        };
        assert_eq!(header_section(&single, "1").unwrap(), "HEADER");
        assert_eq!(header_section(&single, "").unwrap(), "HEADER");

        let attached = BodyPart {
            part_number: "2".to_string(),
            media_type: "message".to_string(),
            subtype: "rfc822".to_string(),
            ..BodyPart::default()
        };
        let multi = BodyPart {
            part_number: "0".to_string(),
            media_type: "multipart".to_string(),
            subtype: "mixed".to_string(),
            parts: vec![
                BodyPart {
                    part_number: "1".to_string(),
                    ..single.clone()
                },
                attached,
            ],
            ..BodyPart::default()
        };
        assert_eq!(header_section(&multi, "0").unwrap(), "HEADER");
        assert_eq!(header_section(&multi, "1").unwrap(), "1.MIME");
        assert_eq!(header_section(&multi, "2").unwrap(), "2.HEADER");
        assert!(matches!(
            header_section(&multi, "9"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_encapsulated_multipart_sections() {
        let leaf = |number: &str| BodyPart {
            part_number: number.to_string(),
            media_type: "text".to_string(),
            subtype: "plain".to_string(),
            ..BodyPart::default()
        };
        let inner = BodyPart {
            part_number: "2.0".to_string(),
            media_type: "multipart".to_string(),
            subtype: "mixed".to_string(),
            parts: vec![leaf("2.1"), leaf("2.2")],
            ..BodyPart::default()
        };
        let attached = BodyPart {
            part_number: "2".to_string(),
            media_type: "message".to_string(),
            subtype: "rfc822".to_string(),
            parts: vec![inner.clone()],
            ..BodyPart::default()
        };
        let tree = BodyPart {
            part_number: "0".to_string(),
            media_type: "multipart".to_string(),
            subtype: "mixed".to_string(),
            parts: vec![leaf("1"), attached],
            ..BodyPart::default()
        };

        assert_eq!(header_section(&tree, "2.0").unwrap(), "2.HEADER");
        assert_eq!(header_section(&tree, "2.1").unwrap(), "2.1.MIME");
        assert_eq!(content_section(&inner), "2.TEXT");
        assert_eq!(content_section(&tree), "TEXT");
        assert_eq!(content_section(&leaf("2.1")), "2.1");
    }

    #[tokio::test]
    async fn test_encapsulated_multipart_fetches() {
        let structure = concat!(
            r#"* 1 FETCH (UID 3 BODYSTRUCTURE (("TEXT" "PLAIN" NIL NIL NIL "7BIT" 10 1)"#,
            r#"("MESSAGE" "RFC822" NIL NIL NIL "7BIT" 900"#,
            r#" ("Mon, 7 Feb 1994 21:52:25 -0800" "inner" NIL NIL NIL NIL NIL NIL NIL "<m@x>")"#,
            r#" (("TEXT" "PLAIN" NIL NIL NIL "7BIT" 5 1)("IMAGE" "PNG" NIL NIL NIL "BASE64" 50) "MIXED")"#,
            " 30) \"MIXED\"))\r\n"
        );
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID FETCH 3 (UID BODYSTRUCTURE)\r\n")
            .read(structure.as_bytes())
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID FETCH 3 (UID FLAGS BODY.PEEK[2.HEADER])\r\n")
            .read(b"* 1 FETCH (UID 3 FLAGS () BODY[2.HEADER] {18}\r\n")
            .read(b"Subject: inner\r\n\r\n")
            .read(b")\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 UID FETCH 3 (UID BODY.PEEK[2.TEXT])\r\n")
            .read(b"* 1 FETCH (UID 3 BODY[2.TEXT] {5}\r\n")
            .read(b"hello")
            .read(b")\r\n")
            .read(b"A0006 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let headers = client.get_message_headers(3, "2.0").await.unwrap();
        assert_eq!(headers.get("Subject"), Some("inner"));

        let content = client.get_message_content(3, "2.0").await.unwrap();
        assert_eq!(content.part_number, "2.0");
        assert_eq!(content.data, b"hello");
    }

    #[tokio::test]
    async fn test_search_requires_selection() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1] hi\r\n")
            .build();
        let mut client = MailboxClient::new();
        let config = Config::new("imap.example.com", "jason", "secret");
        client.connect_with(mock, &config).await.unwrap();

        assert!(matches!(
            client.search(&SearchQuery::new("UNSEEN")).await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            client.get_message_list(&[1]).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_search_simple_and_cached() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 18 4 9\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let query = SearchQuery::new("UNSEEN");
        assert_eq!(
            client.search(&query).await.unwrap(),
            SearchResult::Simple(vec![18, 4, 9])
        );
        assert_eq!(client.search(&query).await.unwrap().ids(), [18, 4, 9]);
    }

    #[tokio::test]
    async fn test_search_with_header_and_sequence() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID SEARCH 1:100 ALL HEADER To jason\r\n")
            .read(b"* SEARCH 3\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let query = SearchQuery::new("ALL").sequence("1:100").header("To", "jason");
        assert_eq!(client.search(&query).await.unwrap().ids(), [3]);
    }

    #[tokio::test]
    async fn test_extended_search() {
        let mock = login(&mut Builder::new(), "ESEARCH")
            .write(b"A0004 UID SEARCH RETURN (MIN MAX COUNT ALL) ALL\r\n")
            .read(b"* ESEARCH (TAG \"A0004\") UID MIN 1 MAX 25 COUNT 25 ALL 1:25\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let query = SearchQuery::new("ALL").returning(&[
            SearchReturn::Min,
            SearchReturn::Max,
            SearchReturn::Count,
            SearchReturn::All,
        ]);
        assert_eq!(
            client.search(&query).await.unwrap(),
            SearchResult::Extended(ExtendedResult {
                min: Some(1),
                max: Some(25),
                count: Some(25),
                all: Some("1:25".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_message_list_keeps_requested_ids() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID FETCH 3 (UID FLAGS INTERNALDATE RFC822.SIZE ENVELOPE)\r\n")
            .read(
                b"* 1 FETCH (UID 3 FLAGS (\\Seen) INTERNALDATE \" 5-Jan-2024 10:00:00 +0000\" \
RFC822.SIZE 512 ENVELOPE (\"Fri, 5 Jan 2024 10:00:00 +0000\" \"=?UTF-8?B?amFzb24=?=\" \
((\"Root\" NIL \"root\" \"localhost\")) NIL NIL ((NIL NIL \"jason\" \"shop.localdomain\")) \
NIL NIL NIL \"<1@localhost>\"))\r\n",
            )
            .read(b"* 2 FETCH (FLAGS (\\Seen))\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let list = client.get_message_list(&[3]).await.unwrap();
        assert_eq!(list.len(), 1);
        let summary = &list[&3];
        assert_eq!(summary.subject, "jason");
        assert_eq!(summary.from, "Root <root@localhost>");
        assert_eq!(summary.to, "jason@shop.localdomain");
        assert_eq!(summary.size, Some(512));
        assert_eq!(summary.message_id.as_deref(), Some("<1@localhost>"));
    }

    #[tokio::test]
    async fn test_structure_headers_and_content() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID FETCH 3 (UID BODYSTRUCTURE)\r\n")
            .read(SINGLE_PART)
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID FETCH 3 (UID FLAGS BODY.PEEK[HEADER])\r\n")
            .read(b"* 1 FETCH (UID 3 FLAGS (\\Flagged) BODY[HEADER] {61}\r\n")
            .read(b"To: jason@shop.localdomain\r\nSubject: =?UTF-8?B?amFzb24=?=\r\n\r\n")
            .read(b")\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 UID FETCH 3 (UID BODY.PEEK[1])\r\n")
            .read(b"* 1 FETCH (UID 3 BODY[1] {11}\r\n")
            .read(b"caf=C3=A9\r\n")
            .read(b")\r\n")
            .read(b"A0006 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let tree = client.get_message_structure(3).await.unwrap();
        assert_eq!(tree.flatten(), [("1".to_string(), "text/plain".to_string())]);

        let headers = client.get_message_headers(3, "1").await.unwrap();
        assert_eq!(headers.get("To"), Some("jason@shop.localdomain"));
        assert_eq!(headers.get("Subject"), Some("jason"));
        assert_eq!(headers.get("Flags"), Some("\\Flagged"));

        let content = client.get_first_message_part(3, "text", "plain").await.unwrap().unwrap();
        assert_eq!(content.text(), "caf\u{e9}\r\n");
        assert_eq!(content.charset.as_deref(), Some("utf-8"));

        // the structure came from the cache
        assert!(client.get_first_message_part(3, "text", "html").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_message() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID FETCH 99 (UID BODYSTRUCTURE)\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        assert!(matches!(
            client.get_message_structure(99).await,
            Err(Error::No(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_message() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID FETCH 3 BODY.PEEK[1]\r\n")
            .read(b"* 1 FETCH (UID 3 BODY[1] {10}\r\n")
            .read(b"line one\r\n")
            .read(b")\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        assert_eq!(client.start_message_stream(3, "1").await.unwrap(), Some(10));
        assert_eq!(
            client.read_stream_line().await.unwrap().as_deref(),
            Some(&b"line one\r\n"[..])
        );
        assert_eq!(client.read_stream_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sort_by_fetch_descending() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 4 18 9\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID FETCH 4,9,18 (UID INTERNALDATE)\r\n")
            .read(b"* 1 FETCH (UID 4 INTERNALDATE \"01-Jan-2024 10:00:00 +0000\")\r\n")
            .read(b"* 2 FETCH (UID 9 INTERNALDATE \"02-Jan-2024 10:00:00 +0000\")\r\n")
            .read(b"* 3 FETCH (UID 18 INTERNALDATE \"03-Jan-2024 10:00:00 +0000\")\r\n")
            .read(b"A0005 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let ids = client
            .sort_by_fetch(SortKey::Arrival, true, "UNSEEN")
            .await
            .unwrap();
        assert_eq!(ids, [18, 9, 4]);
    }

    #[tokio::test]
    async fn test_server_sort_and_page() {
        let mock = login(&mut Builder::new(), "SORT")
            .write(b"A0004 UID SORT (REVERSE ARRIVAL) US-ASCII ALL\r\n")
            .read(b"* SORT 25 24 23 22 21 20\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let page = client
            .get_mailbox_page("INBOX", SortKey::Arrival, true, "ALL", 1, 3)
            .await
            .unwrap();
        assert_eq!(page, [24, 23, 22]);
    }

    #[tokio::test]
    async fn test_sort_summarized_without_esort() {
        let mock = login(&mut Builder::new(), "SORT")
            .write(b"A0004 UID SORT (SIZE) US-ASCII ALL\r\n")
            .read(b"* SORT 5 2 7\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let result = client
            .get_message_sort_order(SortKey::Size, false, "", &[SearchReturn::Count])
            .await
            .unwrap();
        assert_eq!(
            result,
            SearchResult::Extended(ExtendedResult {
                count: Some(3),
                ..ExtendedResult::default()
            })
        );
    }

    #[tokio::test]
    async fn test_flag_action() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID STORE 3 +FLAGS.SILENT (\\Flagged)\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID STORE 3 -FLAGS.SILENT (\\Flagged)\r\n")
            .read(b"A0005 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        client.message_action(&MessageAction::Flag, &[3]).await.unwrap();
        client.message_action(&MessageAction::Unflag, &[3]).await.unwrap();
        assert!(matches!(
            client.message_action(&MessageAction::Read, &[]).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_move_falls_back_to_copy() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID COPY 3:4 Archive\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID STORE 3:4 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 EXPUNGE\r\n")
            .read(b"* 2 EXPUNGE\r\n")
            .read(b"* 1 EXPUNGE\r\n")
            .read(b"A0006 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        client
            .message_action(&MessageAction::Move("Archive".to_string()), &[4, 3])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_move_fallback_expunges_only_moved_uids() {
        let mock = login(&mut Builder::new(), "UIDPLUS")
            .write(b"A0004 UID COPY 3:4 Archive\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID STORE 3:4 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 UID EXPUNGE 3:4\r\n")
            .read(b"* 2 EXPUNGE\r\n")
            .read(b"* 1 EXPUNGE\r\n")
            .read(b"A0006 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        client
            .message_action(&MessageAction::Move("Archive".to_string()), &[4, 3])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_poll_flag_update_refreshes_headers() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0004 UID FETCH 3 (UID BODYSTRUCTURE)\r\n")
            .read(SINGLE_PART)
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID FETCH 3 (UID FLAGS BODY.PEEK[HEADER])\r\n")
            .read(b"* 1 FETCH (UID 3 FLAGS () BODY[HEADER] {18}\r\n")
            .read(b"Subject: hello\r\n\r\n")
            .read(b")\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 NOOP\r\n")
            .read(b"* 1 FETCH (UID 3 FLAGS (\\Seen))\r\n")
            .read(b"A0006 OK done\r\n")
            .write(b"A0007 UID FETCH 3 (UID BODYSTRUCTURE)\r\n")
            .read(SINGLE_PART)
            .read(b"A0007 OK done\r\n")
            .write(b"A0008 UID FETCH 3 (UID FLAGS BODY.PEEK[HEADER])\r\n")
            .read(b"* 1 FETCH (UID 3 FLAGS (\\Seen) BODY[HEADER] {18}\r\n")
            .read(b"Subject: hello\r\n\r\n")
            .read(b")\r\n")
            .read(b"A0008 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let headers = client.get_message_headers(3, "1").await.unwrap();
        assert_eq!(headers.get("Flags"), Some(""));

        let updates = client.poll().await.unwrap();
        assert!(matches!(updates.as_slice(), [UntaggedResponse::Fetch(_)]));

        let headers = client.get_message_headers(3, "1").await.unwrap();
        assert_eq!(headers.get("Flags"), Some("\\Seen"));
    }
}
