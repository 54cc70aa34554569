//! Extension commands. Each one is refused unless the server advertised it.

use std::collections::BTreeMap;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::MailboxClient;
use crate::cache::{CacheKey, CachedValue};
use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::types::{Namespace, Quota, QuotaRoot};
use crate::Result;

/// Extensions asked for by [`MailboxClient::enable`] when none are given.
pub const DEFAULT_ENABLE: [&str; 2] = ["QRESYNC", "CONDSTORE"];

/// Name sent in the ID command.
const CLIENT_NAME: &str = "mailroom";

impl<S> MailboxClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends ENABLE and returns what the server switched on.
    ///
    /// An empty slice asks for [`DEFAULT_ENABLE`].
    pub async fn enable(&mut self, extensions: &[&str]) -> Result<Vec<String>> {
        self.require_capability("ENABLE")?;
        let extensions = if extensions.is_empty() {
            &DEFAULT_ENABLE[..]
        } else {
            extensions
        };

        let result = self
            .engine
            .execute(&Command::Enable {
                capabilities: extensions.iter().map(|e| e.to_ascii_uppercase()).collect(),
            })
            .await?;
        let enabled: Vec<String> = result
            .responses
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::Enabled(list) => Some(list),
                _ => None,
            })
            .flatten()
            .collect();
        debug!(?enabled, "extensions enabled");
        Ok(enabled)
    }

    /// Exchanges ID information and returns the server's fields.
    pub async fn id(&mut self) -> Result<BTreeMap<String, Option<String>>> {
        self.require_capability("ID")?;
        let result = self
            .engine
            .execute(&Command::Id {
                parameters: Some(vec![
                    ("name".to_string(), CLIENT_NAME.to_string()),
                    ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
                ]),
            })
            .await?;

        Ok(result
            .responses
            .into_iter()
            .find_map(|response| match response {
                UntaggedResponse::Id(fields) => Some(fields),
                _ => None,
            })
            .unwrap_or_default())
    }

    /// Personal, other-users and shared namespaces, in that order.
    pub async fn get_namespaces(&mut self) -> Result<Vec<Namespace>> {
        let key = CacheKey::new(None, "NAMESPACE", "");
        if let Some(CachedValue::Namespaces(namespaces)) = self.cached(&key) {
            return Ok(namespaces.clone());
        }

        self.require_capability("NAMESPACE")?;
        let result = self.engine.execute(&Command::Namespace).await?;
        let namespaces = result
            .responses
            .into_iter()
            .find_map(|response| match response {
                UntaggedResponse::Namespace(namespaces) => Some(namespaces),
                _ => None,
            })
            .unwrap_or_default();

        self.remember(key, CachedValue::Namespaces(namespaces.clone()));
        Ok(namespaces)
    }

    /// Usage and limits under a quota root; `""` is the default root.
    pub async fn get_quota(&mut self, root: &str) -> Result<Vec<Quota>> {
        self.require_capability("QUOTA")?;
        let result = self
            .engine
            .execute(&Command::GetQuota {
                root: root.to_string(),
            })
            .await?;
        Ok(quotas(result.responses))
    }

    /// The quota roots governing `mailbox`, with their usage.
    pub async fn get_quota_root(&mut self, mailbox: &str) -> Result<QuotaRoot> {
        self.require_capability("QUOTA")?;
        let result = self
            .engine
            .execute(&Command::GetQuotaRoot {
                mailbox: mailbox.to_string(),
            })
            .await?;

        let roots = result
            .responses
            .iter()
            .find_map(|response| match response {
                UntaggedResponse::QuotaRoot { roots, .. } => Some(roots.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(QuotaRoot {
            mailbox: mailbox.to_string(),
            roots,
            quotas: quotas(result.responses),
        })
    }

    /// Runs a Gmail `X-GM-RAW` search in the selected mailbox.
    pub async fn google_search(&mut self, query: &str) -> Result<Vec<u32>> {
        self.require_capability("X-GM-EXT-1")?;
        self.require_selected()?;
        let result = self
            .engine
            .execute(&Command::GmailSearch {
                uid: self.use_uids,
                query: query.to_string(),
            })
            .await?;

        Ok(result
            .responses
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::Search(ids) => Some(ids),
                _ => None,
            })
            .flatten()
            .collect())
    }
}

fn quotas(responses: Vec<UntaggedResponse>) -> Vec<Quota> {
    responses
        .into_iter()
        .filter_map(|response| match response {
            UntaggedResponse::Quota(quota) => Some(quota),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::connection::Config;
    use crate::types::NamespaceClass;
    use tokio_test::io::{Builder, Mock};

    async fn preauth(mock: Mock) -> MailboxClient<Mock> {
        let mut client = MailboxClient::new();
        let config = Config::new("imap.example.com", "jason", "secret");
        client.connect_with(mock, &config).await.unwrap();
        client
    }

    fn greeting(caps: &str) -> Vec<u8> {
        format!("* PREAUTH [CAPABILITY IMAP4rev1 {caps}] ready\r\n").into_bytes()
    }

    #[tokio::test]
    async fn test_enable_defaults() {
        let mock = Builder::new()
            .read(&greeting("ENABLE"))
            .write(b"A0001 ENABLE QRESYNC CONDSTORE\r\n")
            .read(b"* ENABLED QRESYNC CONDSTORE\r\n")
            .read(b"A0001 OK enabled\r\n")
            .build();
        let mut client = preauth(mock).await;

        let enabled = client.enable(&[]).await.unwrap();
        assert!(enabled.contains(&"QRESYNC".to_string()));
    }

    #[tokio::test]
    async fn test_gated_commands_are_refused() {
        let mock = Builder::new().read(&greeting("NAMESPACE")).build();
        let mut client = preauth(mock).await;

        assert!(matches!(client.enable(&[]).await, Err(Error::Unsupported(_))));
        assert!(matches!(client.id().await, Err(Error::Unsupported(_))));
        assert!(matches!(client.get_quota("").await, Err(Error::Unsupported(_))));
        assert!(matches!(
            client.google_search("in:unread").await,
            Err(Error::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_before_selection() {
        let mock = Builder::new().read(&greeting("X-GM-EXT-1")).build();
        let mut client = preauth(mock).await;

        assert!(matches!(
            client.google_search("in:unread").await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_id() {
        let line = format!(
            "A0001 ID (\"name\" \"mailroom\" \"version\" \"{}\")\r\n",
            env!("CARGO_PKG_VERSION")
        );
        let mock = Builder::new()
            .read(&greeting("ID"))
            .write(line.as_bytes())
            .read(b"* ID (\"name\" \"Dovecot\" \"support-url\" NIL)\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut client = preauth(mock).await;

        let fields = client.id().await.unwrap();
        assert_eq!(fields["name"].as_deref(), Some("Dovecot"));
        assert_eq!(fields["support-url"], None);
    }

    #[tokio::test]
    async fn test_namespaces_are_cached() {
        let mock = Builder::new()
            .read(&greeting("NAMESPACE"))
            .write(b"A0001 NAMESPACE\r\n")
            .read(b"* NAMESPACE ((\"\" \"/\")) NIL ((\"Shared/\" \"/\"))\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut client = preauth(mock).await;

        let namespaces = client.get_namespaces().await.unwrap();
        assert_eq!(namespaces[0].class, NamespaceClass::Personal);
        assert_eq!(namespaces[0].delimiter, Some('/'));
        assert_eq!(namespaces[1].prefix, "Shared/");
        assert_eq!(client.get_namespaces().await.unwrap(), namespaces);
    }

    #[tokio::test]
    async fn test_quota_root() {
        let mock = Builder::new()
            .read(&greeting("QUOTA"))
            .write(b"A0001 GETQUOTAROOT INBOX\r\n")
            .read(b"* QUOTAROOT INBOX \"\"\r\n")
            .read(b"* QUOTA \"\" (STORAGE 10 512)\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut client = preauth(mock).await;

        let root = client.get_quota_root("INBOX").await.unwrap();
        assert_eq!(root.roots, [""]);
        assert_eq!(root.quotas[0].resources[0].limit, 512);
    }
}
