#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: browse a mailbox end to end
//!
//! Connects, lists mailboxes, shows the newest messages in INBOX with the
//! first lines of one body, then logs out.
//!
//! ## Running
//!
//! The account is read from a JSON file with the keys `server`, `port`,
//! `username`, `password` and optionally `tls` or `starttls`:
//!
//! ```bash
//! echo '{"server": "127.0.0.1", "port": 143, "tls": false,
//!        "username": "jason", "password": "123456"}' > account.json
//! RUST_LOG=mailroom_imap=debug cargo run --package mailroom-imap --example session -- account.json
//! ```

use mailroom_imap::{Config, MailboxClient, SortKey};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .expect("usage: session <account.json>");
    let config = Config::from_json(&std::fs::read_to_string(path)?)?;

    let mut client: MailboxClient = MailboxClient::new();
    println!("Connecting to {}:{}...", config.host, config.port);
    client.connect(&config).await?;
    println!("✓ Authenticated ({})", client.get_state().as_str());

    println!("\nMailboxes:");
    for (name, mailbox) in client.get_mailbox_list().await? {
        println!("  - {} {:?}", name, mailbox.attributes);
    }

    let page = client
        .get_mailbox_page("INBOX", SortKey::Arrival, true, "ALL", 0, 10)
        .await?;
    println!("\nNewest messages in INBOX:");
    let summaries = client.get_message_list(&page).await?;
    for id in &page {
        if let Some(summary) = summaries.get(id) {
            println!("  {:>6}  {:<30}  {}", id, summary.from, summary.subject);
        }
    }

    if let Some(&newest) = page.first() {
        println!("\nFirst lines of message {}:", newest);
        if let Some(size) = client.start_message_stream(newest, "1").await? {
            println!("  ({} bytes)", size);
            let mut shown = 0;
            while let Some(line) = client.read_stream_line().await? {
                if shown < 5 {
                    print!("  | {}", String::from_utf8_lossy(&line));
                    shown += 1;
                }
            }
        }
    }

    for entry in client.transcript().iter().take(5) {
        println!("{}", entry);
    }

    client.disconnect().await;
    println!("\n✓ Disconnected");
    Ok(())
}
