//! Settings, transports and framing for a server connection.

mod config;
mod framed;
mod stream;

pub use config::{AuthMechanism, Config, ConfigBuilder, Security};
pub use framed::{FramedStream, parse_literal_length};
pub(crate) use framed::MAX_LITERAL_SIZE;
pub use stream::{ImapStream, connect, create_tls_connector};
