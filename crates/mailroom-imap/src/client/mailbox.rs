//! Mailbox-level operations: listing, status, selection and hierarchy.

use std::collections::BTreeMap;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::{MailboxClient, command_args};
use crate::cache::{CacheKey, CachedValue};
use crate::command::{Command, StatusAttribute};
use crate::parser::UntaggedResponse;
use crate::types::{MailboxDescriptor, MailboxStatus, SelectedMailbox, validate_mailbox_name};
use crate::{Error, Result};

/// Mailbox names grouped by depth below a prefix; depth 1 holds the direct
/// children.
pub type FolderLevels = BTreeMap<usize, Vec<String>>;

impl<S> MailboxClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Lists every mailbox, keyed by name.
    ///
    /// Counters are filled in when the server supports LIST-STATUS.
    pub async fn get_mailbox_list(&mut self) -> Result<BTreeMap<String, MailboxDescriptor>> {
        let command = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
            return_status: self.engine.has_capability("LIST-STATUS"),
        };
        let key = CacheKey::new(None, "LIST", command_args(&command));
        if let Some(CachedValue::Mailboxes(list)) = self.cached(&key) {
            return Ok(list.clone());
        }

        self.require_connected()?;
        let result = self.engine.execute(&command).await?;

        let mut mailboxes = BTreeMap::new();
        let mut counters = Vec::new();
        for response in result.responses {
            match response {
                UntaggedResponse::List(descriptor) => {
                    mailboxes.insert(descriptor.name.clone(), descriptor);
                }
                UntaggedResponse::Status { mailbox, status } => counters.push((mailbox, status)),
                _ => {}
            }
        }
        for (name, status) in counters {
            if let Some(descriptor) = mailboxes.get_mut(&name) {
                descriptor.messages = Some(status.messages);
                descriptor.unseen = status.unseen;
                descriptor.uid_validity = status.uid_validity;
            }
        }

        debug!(count = mailboxes.len(), "mailboxes listed");
        self.remember(key, CachedValue::Mailboxes(mailboxes.clone()));
        Ok(mailboxes)
    }

    /// Reads a mailbox's counters with STATUS.
    pub async fn get_mailbox_status(&mut self, name: &str) -> Result<MailboxStatus> {
        let key = CacheKey::new(None, "STATUS", name);
        if let Some(CachedValue::Status(status)) = self.cached(&key) {
            return Ok(status.clone());
        }

        self.require_connected()?;
        let command = Command::Status {
            mailbox: name.to_string(),
            items: StatusAttribute::DEFAULT.to_vec(),
        };
        let result = self.engine.execute(&command).await?;

        let status = result
            .responses
            .into_iter()
            .find_map(|response| match response {
                UntaggedResponse::Status { status, .. } => Some(status),
                _ => None,
            })
            .ok_or_else(|| Error::Protocol(format!("no STATUS data for {name:?}")))?;

        self.remember(key, CachedValue::Status(status.clone()));
        Ok(status)
    }

    /// Opens a mailbox read-write.
    pub async fn select_mailbox(&mut self, name: &str) -> Result<SelectedMailbox> {
        self.require_connected()?;
        self.engine.select(name, false).await
    }

    /// Opens a mailbox read-only with EXAMINE.
    pub async fn examine_mailbox(&mut self, name: &str) -> Result<SelectedMailbox> {
        self.require_connected()?;
        self.engine.select(name, true).await
    }

    /// Leaves the selected mailbox without expunging.
    pub async fn unselect_mailbox(&mut self) -> Result<()> {
        self.require_selected()?;
        self.engine.unselect().await
    }

    /// Creates a mailbox. A trailing delimiter asks for a parent-only node.
    pub async fn create_mailbox(&mut self, path: &str) -> Result<()> {
        self.require_connected()?;
        let delimiter = self.delimiter().await?;
        validate_mailbox_name(path, delimiter)?;

        self.engine
            .execute(&Command::Create {
                mailbox: path.to_string(),
            })
            .await?;
        self.bust_all(&["LIST", "STATUS"]);
        Ok(())
    }

    /// Deletes a mailbox.
    pub async fn delete_mailbox(&mut self, path: &str) -> Result<()> {
        self.require_connected()?;
        let delimiter = self.delimiter().await?;
        validate_mailbox_name(path, delimiter)?;

        self.engine
            .execute(&Command::Delete {
                mailbox: path.to_string(),
            })
            .await?;
        self.bust_all(&["LIST", "STATUS"]);
        Ok(())
    }

    /// Renames a mailbox.
    pub async fn rename_mailbox(&mut self, from: &str, to: &str) -> Result<()> {
        self.require_connected()?;
        let delimiter = self.delimiter().await?;
        validate_mailbox_name(from, delimiter)?;
        validate_mailbox_name(to, delimiter)?;

        self.engine
            .execute(&Command::Rename {
                from: from.to_string(),
                to: to.to_string(),
            })
            .await?;
        self.bust_all(&["LIST", "STATUS"]);
        Ok(())
    }

    /// Lists the mailboxes below `prefix`, grouped by depth.
    ///
    /// `prefix` may end with the delimiter or not; either way only mailboxes
    /// inside it are listed, so `Work` never picks up `Workshop`. The prefix
    /// mailbox itself is not included. An empty prefix lists the whole hierarchy, with
    /// top-level mailboxes at depth 1.
    pub async fn get_folder_list_by_level(&mut self, prefix: &str) -> Result<FolderLevels> {
        self.require_connected()?;
        let delimiter = self.delimiter().await?;
        let prefix = branch_prefix(prefix, delimiter);

        let result = self
            .engine
            .execute(&Command::List {
                reference: String::new(),
                pattern: format!("{prefix}*"),
                return_status: false,
            })
            .await?;

        let names: Vec<String> = result
            .responses
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::List(descriptor) => Some(descriptor.name),
                _ => None,
            })
            .collect();
        Ok(group_by_level(&prefix, delimiter, names))
    }

    /// The hierarchy delimiter, asked for once per connection.
    async fn delimiter(&mut self) -> Result<Option<char>> {
        if let Some(delimiter) = self.delimiter {
            return Ok(delimiter);
        }

        let result = self
            .engine
            .execute(&Command::List {
                reference: String::new(),
                pattern: String::new(),
                return_status: false,
            })
            .await?;
        let delimiter = result.responses.iter().find_map(|response| match response {
            UntaggedResponse::List(descriptor) => Some(descriptor.delimiter),
            _ => None,
        });
        let delimiter = delimiter.flatten();
        debug!(?delimiter, "hierarchy delimiter");
        self.delimiter = Some(delimiter);
        Ok(delimiter)
    }
}

/// `prefix` with a trailing delimiter, unless it is empty.
fn branch_prefix(prefix: &str, delimiter: Option<char>) -> String {
    match delimiter {
        Some(d) if !prefix.is_empty() && !prefix.ends_with(d) => format!("{prefix}{d}"),
        _ => prefix.to_string(),
    }
}

fn group_by_level(prefix: &str, delimiter: Option<char>, names: Vec<String>) -> FolderLevels {
    let prefix = branch_prefix(prefix, delimiter);
    let mut levels = FolderLevels::new();
    for name in names {
        let Some(rest) = name.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let rest = match delimiter {
            Some(d) => rest.trim_start_matches(d).trim_end_matches(d),
            None => rest,
        };
        if rest.is_empty() {
            continue;
        }
        let depth = delimiter.map_or(1, |d| rest.split(d).count());
        levels.entry(depth).or_default().push(name);
    }
    for names in levels.values_mut() {
        names.sort();
    }
    levels
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::Config;
    use crate::protocol::ConnectionState;
    use tokio_test::io::{Builder, Mock};

    const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 UNSELECT] ready\r\n";

    fn config() -> Config {
        Config::new("imap.example.com", "jason", "secret")
    }

    fn login(builder: &mut Builder) -> &mut Builder {
        builder
            .read(GREETING)
            .write(b"A0001 LOGIN jason secret\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 UNSELECT LIST-STATUS] done\r\n")
    }

    async fn connected(mock: Mock) -> MailboxClient<Mock> {
        let mut client = MailboxClient::new();
        client.connect_with(mock, &config()).await.unwrap();
        client
    }

    #[test]
    fn test_group_by_level() {
        let names = vec![
            "Work".to_string(),
            "Work/2024".to_string(),
            "Work/2024/Q1".to_string(),
            "Work/Archive".to_string(),
        ];
        let levels = group_by_level("Work/", Some('/'), names);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[&1], ["Work/2024", "Work/Archive"]);
        assert_eq!(levels[&2], ["Work/2024/Q1"]);
    }

    #[test]
    fn test_group_by_level_skips_siblings_sharing_text() {
        let names = vec![
            "Work/2024".to_string(),
            "Workshop".to_string(),
            "Workshop/Tools".to_string(),
        ];
        let levels = group_by_level("Work", Some('/'), names);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[&1], ["Work/2024"]);
    }

    #[test]
    fn test_group_by_level_without_delimiter() {
        let levels = group_by_level("", None, vec!["INBOX".to_string(), "Sent".to_string()]);
        assert_eq!(levels[&1], ["INBOX", "Sent"]);
    }

    #[tokio::test]
    async fn test_mailbox_list_with_status() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 LIST \"\" \"*\" RETURN (STATUS (MESSAGES UNSEEN UIDVALIDITY))\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
            .read(b"* STATUS INBOX (MESSAGES 12 UNSEEN 3 UIDVALIDITY 7)\r\n")
            .read(b"* LIST (\\Noselect \\HasChildren) \"/\" Work\r\n")
            .read(b"A0002 OK LIST done\r\n")
            .build();
        let mut client = connected(mock).await;

        let list = client.get_mailbox_list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list["INBOX"].messages, Some(12));
        assert_eq!(list["INBOX"].unseen, Some(3));
        assert!(!list["Work"].is_selectable());

        // served from the cache, no traffic
        let again = client.get_mailbox_list().await.unwrap();
        assert_eq!(again, list);
    }

    #[tokio::test]
    async fn test_mailbox_status_is_cached() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 STATUS INBOX (MESSAGES RECENT UIDNEXT UIDVALIDITY UNSEEN)\r\n")
            .read(b"* STATUS INBOX (MESSAGES 4 RECENT 0 UIDNEXT 20 UIDVALIDITY 1 UNSEEN 1)\r\n")
            .read(b"A0002 OK STATUS done\r\n")
            .build();
        let mut client = connected(mock).await;

        let status = client.get_mailbox_status("INBOX").await.unwrap();
        assert_eq!(status.messages, 4);
        assert_eq!(status.uid_next, Some(20));
        assert_eq!(client.get_mailbox_status("INBOX").await.unwrap(), status);
    }

    #[tokio::test]
    async fn test_select_and_unselect() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\n")
            .read(b"* OK [UIDVALIDITY 9] ok\r\n")
            .read(b"A0002 OK [READ-WRITE] SELECT done\r\n")
            .write(b"A0003 UNSELECT\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let mut client = connected(mock).await;

        let selected = client.select_mailbox("INBOX").await.unwrap();
        assert!(selected.selected);
        assert_eq!(selected.exists, 3);
        assert_eq!(selected.uid_validity, Some(9));
        assert_eq!(client.get_state().selected_mailbox(), Some("INBOX"));

        client.unselect_mailbox().await.unwrap();
        assert_eq!(client.get_state(), &ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn test_create_validates_and_busts_list() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 LIST \"\" \"\"\r\n")
            .read(b"* LIST (\\Noselect) \"/\" \"\"\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 CREATE Work/\r\n")
            .read(b"A0003 OK created\r\n")
            .build();
        let mut client = connected(mock).await;

        assert!(matches!(
            client.create_mailbox("Work//Q1").await,
            Err(Error::InvalidArgument(_))
        ));
        client.create_mailbox("Work/").await.unwrap();
        assert!(matches!(
            client.create_mailbox("a*b").await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_delete_keeps_state() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 LIST \"\" \"\"\r\n")
            .read(b"* LIST (\\Noselect) \".\" \"\"\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 DELETE Missing\r\n")
            .read(b"A0003 NO no such mailbox\r\n")
            .build();
        let mut client = connected(mock).await;

        assert!(matches!(
            client.delete_mailbox("Missing").await,
            Err(Error::No(_))
        ));
        assert_eq!(client.get_state(), &ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn test_folder_levels() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 LIST \"\" \"\"\r\n")
            .read(b"* LIST (\\Noselect) \"/\" \"\"\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 LIST \"\" \"Work/*\"\r\n")
            .read(b"* LIST () \"/\" Work/2024\r\n")
            .read(b"* LIST () \"/\" Work/2024/Q1\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let mut client = connected(mock).await;

        let levels = client.get_folder_list_by_level("Work/").await.unwrap();
        assert_eq!(levels[&1], ["Work/2024"]);
        assert_eq!(levels[&2], ["Work/2024/Q1"]);
    }

    #[tokio::test]
    async fn test_folder_levels_prefix_without_delimiter() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 LIST \"\" \"\"\r\n")
            .read(b"* LIST (\\Noselect) \"/\" \"\"\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 LIST \"\" \"Work/*\"\r\n")
            .read(b"* LIST () \"/\" Work/2024\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let mut client = connected(mock).await;

        let levels = client.get_folder_list_by_level("Work").await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[&1], ["Work/2024"]);
    }

    #[tokio::test]
    async fn test_mailbox_ops_need_login() {
        let mut client: MailboxClient<Mock> = MailboxClient::new();
        assert!(matches!(
            client.select_mailbox("INBOX").await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            client.unselect_mailbox().await,
            Err(Error::NotConnected)
        ));
    }
}
