//! Integration tests for the mailbox client.
//!
//! These tests script a whole server conversation through an in-memory
//! stream and check both the client's results and the bytes it sent.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailroom_imap::{
    Config, ConnectionState, Error, ErrorKind, MailboxClient, MessageAction, ResponseParser,
    SearchQuery, SearchResult, UntaggedResponse,
};

/// Stream that replays a server script and records what the client wrote.
struct MockStream {
    /// Server bytes, handed out in order.
    script: Cursor<Vec<u8>>,
    /// Everything the client wrote.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(script: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            script: Cursor::new(script.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.script.get_ref();
        let pos = usize::try_from(self.script.position()).unwrap_or(usize::MAX);

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.script.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn config() -> Config {
    Config::new("127.0.0.1", "jason", "123456")
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&sent.lock().unwrap()).into_owned()
}

const SESSION: &[u8] = b"\
* OK [CAPABILITY IMAP4rev1 SORT ESEARCH NAMESPACE UNSELECT] Dovecot ready.\r\n\
A0001 OK [CAPABILITY IMAP4rev1 SORT ESEARCH NAMESPACE UNSELECT ENABLE] Logged in\r\n\
* LIST (\\HasNoChildren) \"/\" INBOX\r\n\
* LIST (\\HasNoChildren) \"/\" Sent\r\n\
A0002 OK List completed\r\n\
* STATUS INBOX (MESSAGES 25 RECENT 0 UIDNEXT 26 UIDVALIDITY 1 UNSEEN 2)\r\n\
A0003 OK Status completed\r\n\
* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
* 25 EXISTS\r\n\
* 0 RECENT\r\n\
* OK [UIDVALIDITY 1] UIDs valid\r\n\
* OK [UIDNEXT 26] Predicted next UID\r\n\
A0004 OK [READ-WRITE] Select completed\r\n\
A0005 OK NOOP completed\r\n\
* SEARCH 3 18\r\n\
A0006 OK Search completed\r\n\
* 3 FETCH (UID 3 BODYSTRUCTURE (\"text\" \"plain\" (\"charset\" \"us-ascii\") NIL NIL \"7bit\" 10 1 NIL NIL NIL))\r\n\
A0007 OK Fetch completed\r\n\
* 3 FETCH (UID 3 BODY[1] {10}\r\n\
line one\r\n\
)\r\n\
A0008 OK Fetch completed\r\n\
A0009 OK Store completed\r\n\
A0010 OK Unselect completed\r\n\
* BYE Logging out\r\n\
A0011 OK Logout completed\r\n";

#[tokio::test]
async fn test_full_session() {
    let (stream, sent) = MockStream::new(SESSION);
    let mut client: MailboxClient<MockStream> = MailboxClient::new();

    client.connect_with(stream, &config()).await.unwrap();
    assert_eq!(client.get_state().as_str(), "authenticated");
    assert!(client.is_supported("ENABLE"));

    let mailboxes = client.get_mailbox_list().await.unwrap();
    assert!(mailboxes.contains_key("INBOX"));

    let status = client.get_mailbox_status("INBOX").await.unwrap();
    assert_eq!(status.messages, 25);

    let selected = client.select_mailbox("INBOX").await.unwrap();
    assert!(selected.selected);
    assert_eq!(selected.exists, 25);
    assert_eq!(client.get_state().as_str(), "selected");

    assert!(client.poll().await.unwrap().is_empty());

    let unseen = client.search(&SearchQuery::new("UNSEEN")).await.unwrap();
    assert_eq!(unseen, SearchResult::Simple(vec![3, 18]));

    let tree = client.get_message_structure(3).await.unwrap();
    assert_eq!(
        mailroom_imap::flatten_bodystructure(&tree),
        [("1".to_string(), "text/plain".to_string())]
    );

    assert_eq!(client.start_message_stream(3, "1").await.unwrap(), Some(10));
    let mut lines = Vec::new();
    while let Some(line) = client.read_stream_line().await.unwrap() {
        lines.push(line);
    }
    assert_eq!(lines, [b"line one\r\n".to_vec()]);

    client.message_action(&MessageAction::Flag, &[3]).await.unwrap();
    client.unselect_mailbox().await.unwrap();
    assert_eq!(client.get_state(), &ConnectionState::Authenticated);

    client.disconnect().await;
    assert_eq!(client.get_state().as_str(), "disconnected");

    let sent = sent_text(&sent);
    let expected = [
        "A0001 LOGIN jason 123456\r\n",
        "A0002 LIST \"\" \"*\"\r\n",
        "A0003 STATUS INBOX (MESSAGES RECENT UIDNEXT UIDVALIDITY UNSEEN)\r\n",
        "A0004 SELECT INBOX\r\n",
        "A0005 NOOP\r\n",
        "A0006 UID SEARCH UNSEEN\r\n",
        "A0007 UID FETCH 3 (UID BODYSTRUCTURE)\r\n",
        "A0008 UID FETCH 3 BODY.PEEK[1]\r\n",
        "A0009 UID STORE 3 +FLAGS.SILENT (\\Flagged)\r\n",
        "A0010 UNSELECT\r\n",
        "A0011 LOGOUT\r\n",
    ]
    .concat();
    assert_eq!(sent, expected);

    // credentials never reach the transcript
    assert!(
        client
            .transcript()
            .iter()
            .all(|entry| !entry.line.contains("123456"))
    );
}

const SHORT_SESSION: &[u8] = b"\
* OK [CAPABILITY IMAP4rev1] ready\r\n\
A0001 OK [CAPABILITY IMAP4rev1] Logged in\r\n\
* LIST () \"/\" INBOX\r\n\
A0002 OK done\r\n\
* BYE bye\r\n\
A0003 OK done\r\n";

#[tokio::test]
async fn test_cache_survives_reconnect() {
    let (stream, sent) = MockStream::new(SHORT_SESSION);
    let mut client: MailboxClient<MockStream> = MailboxClient::new();
    client.connect_with(stream, &config()).await.unwrap();

    let listed = client.get_mailbox_list().await.unwrap();
    client.disconnect().await;
    let blob = client.dump_cache().unwrap();
    let sent_before = sent_text(&sent);

    let mut warm: MailboxClient<MockStream> = MailboxClient::new();
    warm.load_cache(&blob).unwrap();
    assert_eq!(warm.get_mailbox_list().await.unwrap(), listed);
    assert_eq!(warm.dump_cache().unwrap(), blob);

    assert_eq!(warm.bust_cache("ALL"), 1);
    let err = warm.get_mailbox_list().await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(sent_text(&sent), sent_before);
}

#[tokio::test]
async fn test_bust_cache_resends_list() {
    let script = b"\
* OK [CAPABILITY IMAP4rev1] ready\r\n\
A0001 OK [CAPABILITY IMAP4rev1] Logged in\r\n\
* LIST () \"/\" INBOX\r\n\
A0002 OK done\r\n\
* LIST () \"/\" INBOX\r\n\
* LIST () \"/\" Sent\r\n\
A0003 OK done\r\n";
    let (stream, sent) = MockStream::new(script);
    let mut client: MailboxClient<MockStream> = MailboxClient::new();
    client.connect_with(stream, &config()).await.unwrap();

    let first = client.get_mailbox_list().await.unwrap();
    assert_eq!(first.len(), 1);
    // served from the cache, nothing sent
    assert_eq!(client.get_mailbox_list().await.unwrap(), first);

    assert_eq!(client.bust_cache("ALL"), 1);
    let second = client.get_mailbox_list().await.unwrap();
    assert_eq!(second.len(), 2);
    assert!(second.contains_key("Sent"));

    let text = sent_text(&sent);
    assert_eq!(text.matches("LIST \"\" \"*\"").count(), 2);
    assert!(text.contains("A0003 LIST \"\" \"*\"\r\n"));
}

#[tokio::test]
async fn test_rejected_login() {
    let script = b"\
* OK [CAPABILITY IMAP4rev1] ready\r\n\
A0001 NO [AUTHENTICATIONFAILED] Authentication failed.\r\n\
* BYE bye\r\n\
A0002 OK done\r\n";
    let (stream, _sent) = MockStream::new(script);
    let mut client: MailboxClient<MockStream> = MailboxClient::new();

    let err = client.connect_with(stream, &config()).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(client.get_state(), &ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_mailbox_scope_needs_selection() {
    let script = b"* PREAUTH [CAPABILITY IMAP4rev1] ready\r\n";
    let (stream, sent) = MockStream::new(script);
    let mut client: MailboxClient<MockStream> = MailboxClient::new();
    client.connect_with(stream, &config()).await.unwrap();
    assert_eq!(client.get_state().as_str(), "authenticated");

    let err = client.search(&SearchQuery::new("UNSEEN")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert!(client.get_message_structure(1).await.is_err());
    assert!(client.message_action(&MessageAction::Read, &[1]).await.is_err());
    assert!(sent_text(&sent).is_empty());
}

#[tokio::test]
async fn test_connection_drop_disconnects() {
    let script = b"* OK [CAPABILITY IMAP4rev1] ready\r\nA0001 OK [CAPABILITY IMAP4rev1] in\r\n";
    let (stream, _sent) = MockStream::new(script);
    let mut client: MailboxClient<MockStream> = MailboxClient::new();
    client.connect_with(stream, &config()).await.unwrap();

    let err = client.get_mailbox_status("INBOX").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(client.get_state(), &ConnectionState::Disconnected);
}

#[test]
fn test_parser_status() {
    let parsed =
        ResponseParser::parse(b"* STATUS \"Sent Items\" (MESSAGES 4 UNSEEN 1)\r\n").unwrap();

    match parsed {
        mailroom_imap::Response::Untagged(UntaggedResponse::Status { mailbox, status }) => {
            assert_eq!(mailbox, "Sent Items");
            assert_eq!(status.messages, 4);
            assert_eq!(status.unseen, Some(1));
        }
        other => panic!("Expected STATUS response, got {other:?}"),
    }
}
