//! The connection state machine.
//!
//! [`ProtocolEngine`] owns one framed connection and runs exactly one tagged
//! command at a time. For each command it:
//!
//! - writes the command, pausing for the server's `+` before every literal
//! - reads lines until the command's tag comes back with OK, NO or BAD
//! - hands every untagged line to the [`ResponseHandler`] and collects it
//!   into the [`CommandResult`]
//!
//! A FETCH can instead be started as a *stream*. The engine then stops at
//! the first body literal and hands the literal out one line at a time, so
//! a large message is never held in memory. While a stream is open no other
//! command can be issued.
//!
//! Transport failures and timeouts drop the connection and move the engine
//! to [`ConnectionState::Disconnected`].

#![allow(clippy::missing_errors_doc)]

mod state;
mod transcript;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

pub use state::{ConnectionState, SelectedState};
pub use transcript::{Direction, TRANSCRIPT_CAPACITY, Transcript, TranscriptEntry};

use state::Phase;

use crate::command::{Command, TagGenerator};
use crate::connection::{
    AuthMechanism, FramedStream, ImapStream, MAX_LITERAL_SIZE, parse_literal_length,
};
use crate::handler::{LoggingHandler, ResponseHandler};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{CapabilitySet, ResponseCode, SelectedMailbox, Status};
use crate::{Error, Result};

/// The outcome of one tagged command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Tag the command was sent with.
    pub tag: String,
    /// Completion status; always OK for a returned result.
    pub status: Status,
    /// Response code on the tagged line.
    pub code: Option<ResponseCode>,
    /// Text of the tagged line.
    pub text: String,
    /// Untagged responses received while the command ran, in order.
    pub responses: Vec<UntaggedResponse>,
}

/// Tagged completion line.
struct Completion {
    status: Status,
    code: Option<ResponseCode>,
    text: String,
}

/// What a read loop stopped on.
enum Reply {
    Continuation,
    Done(Completion),
}

/// Per-command scratch state.
#[derive(Default)]
struct Exchange {
    responses: Vec<UntaggedResponse>,
    bye: Option<String>,
    parse_error: Option<Error>,
}

impl Exchange {
    /// A transport error after BYE is reported as the BYE.
    fn explain(&mut self, error: Error) -> Error {
        self.bye.take().map_or(error, Error::Bye)
    }
}

/// Async IMAP protocol engine over any byte stream.
pub struct ProtocolEngine<S> {
    stream: Option<FramedStream<S>>,
    state: ConnectionState,
    phase: Phase,
    tags: TagGenerator,
    capabilities: CapabilitySet,
    handler: Box<dyn ResponseHandler>,
    transcript: Transcript,
    io_timeout: Duration,
}

impl<S> std::fmt::Debug for ProtocolEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("capabilities", &self.capabilities)
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl<S> ProtocolEngine<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a disconnected engine.
    #[must_use]
    pub fn new(io_timeout: Duration) -> Self {
        Self {
            stream: None,
            state: ConnectionState::Disconnected,
            phase: Phase::Idle,
            tags: TagGenerator::default(),
            capabilities: CapabilitySet::new(),
            handler: Box::new(LoggingHandler),
            transcript: Transcript::default(),
            io_timeout,
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Capabilities captured from the server.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Returns true if the server advertised `token`.
    #[must_use]
    pub fn has_capability(&self, token: &str) -> bool {
        self.capabilities.contains(token)
    }

    /// Returns true while a message stream is open.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self.phase, Phase::StreamingLiteral { .. })
    }

    /// Recent commands and completions.
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Empties the transcript.
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    /// Changes the per-read/write timeout.
    pub const fn set_io_timeout(&mut self, io_timeout: Duration) {
        self.io_timeout = io_timeout;
    }

    /// Replaces the handler for unsolicited responses.
    pub fn set_handler(&mut self, handler: Box<dyn ResponseHandler>) {
        self.handler = handler;
    }

    /// Takes ownership of a fresh transport and reads the greeting.
    ///
    /// An OK greeting gives [`ConnectionState::Connected`] and PREAUTH gives
    /// [`ConnectionState::Authenticated`]. A BYE greeting fails with
    /// [`Error::Bye`].
    pub async fn attach(&mut self, stream: S) -> Result<()> {
        self.stream = Some(FramedStream::new(stream));
        self.phase = Phase::Idle;
        self.capabilities = CapabilitySet::new();

        let line = self.read_response().await?;
        self.transcript
            .push(Direction::Received, String::from_utf8_lossy(&line).trim_end());

        let (next, code) = match ResponseParser::parse(&line) {
            Ok(Response::Untagged(UntaggedResponse::Ok { code, .. })) => {
                (ConnectionState::Connected, code)
            }
            Ok(Response::Untagged(UntaggedResponse::PreAuth { code, .. })) => {
                (ConnectionState::Authenticated, code)
            }
            Ok(Response::Untagged(UntaggedResponse::Bye { text, .. })) => {
                let err = Error::Bye(text);
                self.drop_connection(&err);
                return Err(err);
            }
            Ok(other) => {
                let err = Error::Protocol(format!("unexpected greeting: {other:?}"));
                self.drop_connection(&err);
                return Err(err);
            }
            Err(err) => {
                self.drop_connection(&err);
                return Err(err);
            }
        };

        if let Some(ResponseCode::Capability(tokens)) = &code {
            self.capabilities = tokens.iter().collect();
        }
        self.set_state(next);
        Ok(())
    }

    /// Runs one command to its tagged completion.
    ///
    /// NO and BAD completions are returned as [`Error::No`] and
    /// [`Error::Bad`]; the connection state is left alone. Untagged data
    /// that failed to parse is reported once the tagged line has been read,
    /// so the connection stays in step.
    pub async fn execute(&mut self, command: &Command) -> Result<CommandResult> {
        let tag = self.begin(command)?;
        let mut exchange = Exchange::default();

        let completion = match self.send(&tag, command, &mut exchange).await? {
            Some(early) => early,
            None => self.read_completion(&tag, &mut exchange).await?,
        };
        self.finish(tag, command.name(), completion, exchange)
    }

    /// Re-issues CAPABILITY.
    pub async fn refresh_capabilities(&mut self) -> Result<&CapabilitySet> {
        let result = self.execute(&Command::Capability).await?;
        let advertised = result.responses.iter().any(|r| matches!(r, UntaggedResponse::Capability(_)));
        if !advertised {
            return Err(Error::Protocol("CAPABILITY returned no capability list".to_string()));
        }
        Ok(&self.capabilities)
    }

    /// Presents credentials.
    ///
    /// A rejected login drops the connection and returns [`Error::Auth`].
    /// Capabilities are refreshed from the OK code, or by re-issuing
    /// CAPABILITY when the server sent none.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
        mechanism: AuthMechanism,
    ) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(self.wrong_state("login"));
        }

        let command = match mechanism {
            AuthMechanism::Login => {
                if self.has_capability("LOGINDISABLED") {
                    return Err(Error::Auth("server has disabled LOGIN".to_string()));
                }
                Command::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                }
            }
            AuthMechanism::Plain => {
                let blob = format!("\0{username}\0{password}");
                Command::Authenticate {
                    mechanism: "PLAIN".to_string(),
                    response: mailroom_mime::encoding::encode_base64(blob.as_bytes()),
                }
            }
        };

        let result = match self.execute(&command).await {
            Ok(result) => result,
            Err(Error::No(text) | Error::Bad(text)) => {
                warn!(user = username, "login rejected");
                self.disconnect().await;
                return Err(Error::Auth(text));
            }
            Err(err) => {
                self.disconnect().await;
                return Err(err);
            }
        };

        self.set_state(ConnectionState::Authenticated);
        if !matches!(result.code, Some(ResponseCode::Capability(_))) {
            self.refresh_capabilities().await?;
        }
        Ok(())
    }

    /// Opens a mailbox with SELECT, or EXAMINE when `read_only`.
    ///
    /// The state changes only on a tagged OK.
    pub async fn select(&mut self, mailbox: &str, read_only: bool) -> Result<SelectedMailbox> {
        if !self.state.is_authenticated() {
            return Err(self.wrong_state("select a mailbox"));
        }

        let command = if read_only {
            Command::Examine {
                mailbox: mailbox.to_string(),
            }
        } else {
            Command::Select {
                mailbox: mailbox.to_string(),
            }
        };
        let result = self.execute(&command).await?;

        let mut selected = SelectedMailbox {
            name: mailbox.to_string(),
            selected: true,
            read_only,
            ..SelectedMailbox::default()
        };
        for response in &result.responses {
            match response {
                UntaggedResponse::Exists(n) => selected.exists = *n,
                UntaggedResponse::Recent(n) => selected.recent = *n,
                UntaggedResponse::Flags(flags) => selected.flags = flags.clone(),
                UntaggedResponse::Ok {
                    code: Some(code), ..
                } => apply_select_code(&mut selected, code),
                _ => {}
            }
        }
        if let Some(code) = &result.code {
            apply_select_code(&mut selected, code);
        }

        self.set_state(ConnectionState::Selected(SelectedState {
            mailbox: mailbox.to_string(),
            read_only: selected.read_only,
        }));
        Ok(selected)
    }

    /// Leaves the selected mailbox with UNSELECT, or CLOSE when the server
    /// lacks UNSELECT.
    pub async fn unselect(&mut self) -> Result<()> {
        if !self.state.is_selected() {
            return Err(self.wrong_state("unselect"));
        }
        let command = if self.has_capability("UNSELECT") {
            Command::Unselect
        } else {
            Command::Close
        };
        self.execute(&command).await?;
        self.set_state(ConnectionState::Authenticated);
        Ok(())
    }

    /// Sends a FETCH and stops at the first body literal.
    ///
    /// Returns the literal's length, or `None` when the command completed
    /// without one (for example, the message does not exist). After
    /// `Some(n)`, call [`read_stream_line`](Self::read_stream_line) until it
    /// returns `None`.
    pub async fn start_stream(&mut self, command: &Command) -> Result<Option<usize>> {
        let tag = self.begin(command)?;
        let mut exchange = Exchange::default();

        if let Some(early) = self.send(&tag, command, &mut exchange).await? {
            self.finish(tag, command.name(), early, exchange)?;
            return Ok(None);
        }

        loop {
            let line = match self.read_line().await {
                Ok(line) => line,
                Err(err) => return Err(exchange.explain(err)),
            };

            if line.starts_with(b"* ")
                && let Some(len) = parse_literal_length(&line)
                && contains_keyword(&line, b" FETCH ")
            {
                if len > MAX_LITERAL_SIZE {
                    let err = Error::Protocol(format!(
                        "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                    ));
                    self.drop_connection(&err);
                    return Err(err);
                }
                debug!(tag = %tag, len, "streaming literal");
                self.phase = Phase::StreamingLiteral {
                    tag,
                    remaining: len,
                };
                return Ok(Some(len));
            }

            let response = match self.complete_response(line).await {
                Ok(response) => response,
                Err(err) => return Err(exchange.explain(err)),
            };
            if let Some(Reply::Done(completion)) =
                self.handle_line(&tag, &response, &mut exchange, false)
            {
                self.finish(tag, command.name(), completion, exchange)?;
                return Ok(None);
            }
        }
    }

    /// Returns the next line of an open stream.
    ///
    /// Lines keep their line ending. Once the literal is used up the next
    /// call reads the tagged completion and returns `None`; so does any call
    /// with no stream open.
    pub async fn read_stream_line(&mut self) -> Result<Option<Vec<u8>>> {
        let (tag, remaining) = match &self.phase {
            Phase::Idle => return Ok(None),
            Phase::InFlight { tag } => {
                return Err(Error::InvalidState(format!(
                    "command {tag} is in flight, not streaming"
                )));
            }
            Phase::StreamingLiteral { tag, remaining } => (tag.clone(), *remaining),
        };

        if remaining > 0 {
            let line = self.read_limited(remaining).await?;
            self.phase = Phase::StreamingLiteral {
                tag,
                remaining: remaining - line.len(),
            };
            return Ok(Some(line));
        }

        self.phase = Phase::InFlight { tag: tag.clone() };
        let tail = self.read_line().await?;
        let tail = self.complete_response(tail).await?;
        trace!(tail = %String::from_utf8_lossy(&tail).trim_end(), "end of streamed FETCH");

        let mut exchange = Exchange::default();
        let completion = self.read_completion(&tag, &mut exchange).await?;
        self.finish(tag, "FETCH", completion, exchange)?;
        Ok(None)
    }

    /// Logs out and closes the transport.
    ///
    /// Never fails: a LOGOUT or shutdown error is logged and the state is
    /// forced to [`ConnectionState::Disconnected`].
    pub async fn disconnect(&mut self) {
        if self.stream.is_some() && self.phase == Phase::Idle {
            if let Err(err) = self.execute(&Command::Logout).await {
                warn!(error = %err, "LOGOUT failed");
            }
        }

        if let Some(mut stream) = self.stream.take() {
            match timeout(self.io_timeout, stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "transport shutdown failed"),
                Err(_) => warn!("transport shutdown timed out"),
            }
        }
        self.phase = Phase::Idle;
        self.set_state(ConnectionState::Disconnected);
    }

    fn begin(&mut self, command: &Command) -> Result<String> {
        if self.stream.is_none() {
            return Err(Error::NotConnected);
        }
        match &self.phase {
            Phase::Idle => {}
            Phase::InFlight { tag } => {
                return Err(Error::InvalidState(format!("command {tag} has not completed")));
            }
            Phase::StreamingLiteral { tag, .. } => {
                return Err(Error::InvalidState(format!("message stream {tag} is still open")));
            }
        }

        let tag = self.tags.next_tag();
        debug!(tag = %tag, command = command.name(), "sending command");
        self.transcript.push(Direction::Sent, command.describe(&tag));
        self.phase = Phase::InFlight { tag: tag.clone() };
        Ok(tag)
    }

    /// Writes every chunk, waiting for `+` between them. Returns the
    /// completion if the server finished the command early.
    async fn send(
        &mut self,
        tag: &str,
        command: &Command,
        exchange: &mut Exchange,
    ) -> Result<Option<Completion>> {
        let chunks = command.serialize(tag, self.has_capability("LITERAL+"));
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                match self.read_reply(tag, exchange, true).await? {
                    Reply::Continuation => trace!(tag, "continuation"),
                    Reply::Done(completion) => return Ok(Some(completion)),
                }
            }
            if let Err(err) = self.write(chunk).await {
                return Err(exchange.explain(err));
            }
        }
        Ok(None)
    }

    async fn read_completion(&mut self, tag: &str, exchange: &mut Exchange) -> Result<Completion> {
        match self.read_reply(tag, exchange, false).await? {
            Reply::Done(completion) => Ok(completion),
            Reply::Continuation => Err(Error::Protocol(format!("unexpected continuation for {tag}"))),
        }
    }

    async fn read_reply(
        &mut self,
        tag: &str,
        exchange: &mut Exchange,
        stop_at_continuation: bool,
    ) -> Result<Reply> {
        loop {
            let line = match self.read_response().await {
                Ok(line) => line,
                Err(err) => return Err(exchange.explain(err)),
            };
            if let Some(reply) = self.handle_line(tag, &line, exchange, stop_at_continuation) {
                return Ok(reply);
            }
        }
    }

    fn handle_line(
        &mut self,
        tag: &str,
        line: &[u8],
        exchange: &mut Exchange,
        stop_at_continuation: bool,
    ) -> Option<Reply> {
        match ResponseParser::parse(line) {
            Ok(Response::Untagged(response)) => {
                self.dispatch(response, exchange);
                None
            }
            Ok(Response::Continuation { .. }) if stop_at_continuation => {
                Some(Reply::Continuation)
            }
            Ok(Response::Continuation { text }) => {
                trace!(?text, "ignoring continuation");
                None
            }
            Ok(Response::Tagged {
                tag: got,
                status,
                code,
                text,
            }) => {
                if got == tag {
                    Some(Reply::Done(Completion { status, code, text }))
                } else {
                    warn!(expected = tag, got = %got, "completion for an unknown tag");
                    None
                }
            }
            Err(err) => {
                warn!(error = %err, "malformed response");
                exchange.parse_error.get_or_insert(err);
                None
            }
        }
    }

    fn dispatch(&mut self, response: UntaggedResponse, exchange: &mut Exchange) {
        trace!(keyword = response.keyword(), "untagged response");
        match &response {
            UntaggedResponse::Capability(tokens) => {
                self.capabilities = tokens.iter().collect();
            }
            UntaggedResponse::Exists(n) => self.handler.on_exists(*n),
            UntaggedResponse::Recent(n) => self.handler.on_recent(*n),
            UntaggedResponse::Expunge(n) => self.handler.on_expunge(*n),
            UntaggedResponse::Fetch(data) => self.handler.on_fetch(data),
            UntaggedResponse::Flags(flags) => self.handler.on_flags(flags),
            UntaggedResponse::Bye { text, .. } => {
                self.handler.on_bye(text);
                exchange.bye = Some(text.clone());
            }
            UntaggedResponse::Ok {
                code: Some(ResponseCode::Alert),
                text,
            }
            | UntaggedResponse::No {
                code: Some(ResponseCode::Alert),
                text,
            } => {
                warn!(alert = %text, "server alert");
                self.handler.on_alert(text);
            }
            _ => {}
        }
        exchange.responses.push(response);
    }

    fn finish(
        &mut self,
        tag: String,
        command: &str,
        completion: Completion,
        exchange: Exchange,
    ) -> Result<CommandResult> {
        let Completion { status, code, text } = completion;
        self.phase = Phase::Idle;
        debug!(tag = %tag, status = status.as_str(), "command completed");
        self.transcript
            .push(Direction::Received, format!("{tag} {} {text}", status.as_str()));

        match &code {
            Some(ResponseCode::Capability(tokens)) => self.capabilities = tokens.iter().collect(),
            Some(ResponseCode::Alert) => {
                warn!(alert = %text, "server alert");
                self.handler.on_alert(&text);
            }
            _ => {}
        }

        match status {
            Status::Ok => {
                if let Some(err) = exchange.parse_error {
                    return Err(err);
                }
                Ok(CommandResult {
                    tag,
                    status,
                    code,
                    text,
                    responses: exchange.responses,
                })
            }
            Status::No => {
                warn!(tag = %tag, command, text = %text, "command failed");
                Err(Error::No(text))
            }
            Status::Bad => {
                warn!(tag = %tag, command, text = %text, "command rejected");
                Err(Error::Bad(text))
            }
            other => Err(Error::Protocol(format!(
                "tagged {} completion for {tag}",
                other.as_str()
            ))),
        }
    }

    fn wrong_state(&self, action: &str) -> Error {
        if self.state == ConnectionState::Disconnected {
            Error::NotConnected
        } else {
            Error::InvalidState(format!("cannot {action} while {}", self.state))
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "connection state changed");
            self.state = next;
        }
    }

    fn drop_connection(&mut self, error: &Error) {
        warn!(error = %error, "dropping connection");
        self.stream = None;
        self.phase = Phase::Idle;
        self.set_state(ConnectionState::Disconnected);
    }

    async fn read_response(&mut self) -> Result<Vec<u8>> {
        let limit = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let result = timeout(limit, stream.read_response())
            .await
            .unwrap_or(Err(Error::Timeout(limit)));
        self.guard(result)
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let limit = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let result = timeout(limit, stream.read_line())
            .await
            .unwrap_or(Err(Error::Timeout(limit)));
        self.guard(result)
    }

    async fn complete_response(&mut self, first: Vec<u8>) -> Result<Vec<u8>> {
        let limit = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let result = timeout(limit, stream.complete_response(first))
            .await
            .unwrap_or(Err(Error::Timeout(limit)));
        self.guard(result)
    }

    async fn read_limited(&mut self, max: usize) -> Result<Vec<u8>> {
        let limit = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let result = timeout(limit, stream.read_line_limited(max))
            .await
            .unwrap_or(Err(Error::Timeout(limit)));
        self.guard(result)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let limit = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let result = timeout(limit, stream.write_all(data))
            .await
            .unwrap_or(Err(Error::Timeout(limit)));
        self.guard(result)
    }

    /// Any framing failure leaves the byte stream out of step, so the
    /// connection is dropped.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.drop_connection(err);
        }
        result
    }
}

impl ProtocolEngine<ImapStream> {
    /// Upgrades a plaintext connection with STARTTLS.
    ///
    /// Capabilities are discarded and re-read over the encrypted channel.
    pub async fn starttls(&mut self, host: &str) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(self.wrong_state("start TLS"));
        }
        if !self.has_capability("STARTTLS") {
            return Err(Error::Unsupported("STARTTLS".to_string()));
        }

        self.execute(&Command::StartTls).await?;

        let framed = self.stream.take().ok_or(Error::NotConnected)?;
        let upgraded = match framed.into_inner().upgrade_to_tls(host).await {
            Ok(stream) => stream,
            Err(err) => {
                self.drop_connection(&err);
                return Err(err);
            }
        };
        info!(host, "connection upgraded to TLS");

        self.stream = Some(FramedStream::new(upgraded));
        self.capabilities = CapabilitySet::new();
        self.refresh_capabilities().await?;
        Ok(())
    }
}

fn apply_select_code(selected: &mut SelectedMailbox, code: &ResponseCode) {
    match code {
        ResponseCode::UidValidity(n) => selected.uid_validity = Some(*n),
        ResponseCode::UidNext(n) => selected.uid_next = Some(*n),
        ResponseCode::Unseen(n) => selected.first_unseen = Some(*n),
        ResponseCode::HighestModSeq(n) => selected.highest_modseq = Some(*n),
        ResponseCode::PermanentFlags(flags) => {
            selected.permanent_flags = flags.iter().cloned().collect();
        }
        ResponseCode::ReadOnly => selected.read_only = true,
        ResponseCode::ReadWrite => selected.read_only = false,
        _ => {}
    }
}

fn contains_keyword(line: &[u8], keyword: &[u8]) -> bool {
    line.windows(keyword.len())
        .any(|w| w.eq_ignore_ascii_case(keyword))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::command::FetchAttribute;
    use crate::handler::{CollectingHandler, UnsolicitedEvent};

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn attached(mock: Mock) -> ProtocolEngine<Mock> {
        let mut engine = ProtocolEngine::new(TIMEOUT);
        engine.attach(mock).await.unwrap();
        engine
    }

    fn body_fetch() -> Command {
        Command::Fetch {
            sequence: "7".to_string(),
            items: vec![FetchAttribute::peek("")],
            uid: true,
        }
    }

    #[tokio::test]
    async fn test_greeting_with_capabilities() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LITERAL+ AUTH=PLAIN] ready\r\n")
            .build();
        let engine = attached(mock).await;

        assert_eq!(engine.state(), &ConnectionState::Connected);
        assert!(engine.has_capability("literal+"));
        assert_eq!(engine.capabilities().auth_mechanisms().collect::<Vec<_>>(), ["PLAIN"]);
    }

    #[tokio::test]
    async fn test_preauth_greeting() {
        let mock = Builder::new().read(b"* PREAUTH welcome back\r\n").build();
        let engine = attached(mock).await;
        assert_eq!(engine.state(), &ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn test_bye_greeting() {
        let mock = Builder::new().read(b"* BYE too busy\r\n").build();
        let mut engine = ProtocolEngine::new(TIMEOUT);

        let err = engine.attach(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(ref text) if text == "too busy"));
        assert_eq!(engine.state(), &ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_execute_collects_untagged() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 UNSELECT\r\nA0001 OK done\r\n")
            .build();
        let mut engine = attached(mock).await;

        let result = engine.execute(&Command::Capability).await.unwrap();
        assert_eq!(result.tag, "A0001");
        assert_eq!(result.text, "done");
        assert_eq!(result.responses.len(), 1);
        assert!(engine.has_capability("UNSELECT"));
    }

    #[tokio::test]
    async fn test_no_completion_is_an_error() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 SELECT Nope\r\n")
            .read(b"A0001 NO [NONEXISTENT] no such mailbox\r\n")
            .build();
        let mut engine = attached(mock).await;

        let err = engine.select("Nope", false).await.unwrap_err();
        assert!(matches!(err, Error::No(_)));
        assert_eq!(engine.state(), &ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn test_login_refreshes_capabilities() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN jason secret\r\n")
            .read(b"A0001 OK logged in\r\n")
            .write(b"A0002 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 NAMESPACE\r\nA0002 OK done\r\n")
            .build();
        let mut engine = attached(mock).await;

        engine.login("jason", "secret", AuthMechanism::Login).await.unwrap();
        assert_eq!(engine.state(), &ConnectionState::Authenticated);
        assert!(engine.has_capability("NAMESPACE"));

        let sent: Vec<String> = engine.transcript().iter().map(|e| e.line.clone()).collect();
        assert!(sent.contains(&"A0001 LOGIN <redacted>".to_string()));
        assert!(sent.iter().all(|line| !line.contains("secret")));
    }

    #[tokio::test]
    async fn test_login_with_capability_code() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN jason secret\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 MOVE] logged in\r\n")
            .build();
        let mut engine = attached(mock).await;

        engine.login("jason", "secret", AuthMechanism::Login).await.unwrap();
        assert!(engine.has_capability("MOVE"));
    }

    #[tokio::test]
    async fn test_authenticate_plain_waits_for_continuation() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN\r\n")
            .read(b"+ \r\n")
            .write(b"AGphc29uAHNlY3JldA==\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1] authenticated\r\n")
            .build();
        let mut engine = attached(mock).await;

        engine.login("jason", "secret", AuthMechanism::Plain).await.unwrap();
        assert_eq!(engine.state(), &ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn test_rejected_login_disconnects() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN jason wrong\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] invalid credentials\r\n")
            .write(b"A0002 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA0002 OK bye\r\n")
            .build();
        let mut engine = attached(mock).await;

        let err = engine.login("jason", "wrong", AuthMechanism::Login).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(engine.state(), &ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_select_and_unselect() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1 UNSELECT] hi\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 172 EXISTS\r\n* 1 RECENT\r\n")
            .read(b"* OK [UNSEEN 12] first unseen\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"* OK [UIDNEXT 4392] next\r\n")
            .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
            .read(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] limited\r\n")
            .read(b"A0001 OK [READ-WRITE] SELECT completed\r\n")
            .write(b"A0002 UNSELECT\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let mut engine = attached(mock).await;

        let selected = engine.select("INBOX", false).await.unwrap();
        assert!(selected.selected);
        assert_eq!(selected.exists, 172);
        assert_eq!(selected.recent, 1);
        assert_eq!(selected.first_unseen, Some(12));
        assert_eq!(selected.uid_validity, Some(3857529045));
        assert_eq!(selected.uid_next, Some(4392));
        assert_eq!(selected.flags.len(), 5);
        assert_eq!(selected.permanent_flags.len(), 3);
        assert!(!selected.read_only);
        assert_eq!(engine.state().selected_mailbox(), Some("INBOX"));

        engine.unselect().await.unwrap();
        assert_eq!(engine.state(), &ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn test_unselect_falls_back_to_close() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 EXAMINE Archive\r\n")
            .read(b"* 0 EXISTS\r\nA0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 CLOSE\r\n")
            .read(b"A0002 OK closed\r\n")
            .build();
        let mut engine = attached(mock).await;

        let selected = engine.select("Archive", true).await.unwrap();
        assert!(selected.read_only);
        assert!(engine.state().is_read_only());
        engine.unselect().await.unwrap();
    }

    #[tokio::test]
    async fn test_unselect_requires_selection() {
        let mock = Builder::new().read(b"* PREAUTH hi\r\n").build();
        let mut engine = attached(mock).await;
        assert!(matches!(engine.unselect().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_synchronizing_literal_waits_for_continuation() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 CREATE {5}\r\n")
            .read(b"+ go ahead\r\n")
            .write("Caf\u{e9}\r\n".as_bytes())
            .read(b"A0001 OK created\r\n")
            .build();
        let mut engine = attached(mock).await;

        let command = Command::Create {
            mailbox: "Caf\u{e9}".to_string(),
        };
        engine.execute(&command).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_literal_completes_early() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 CREATE {5}\r\n")
            .read(b"A0001 NO no literals here\r\n")
            .build();
        let mut engine = attached(mock).await;

        let command = Command::Create {
            mailbox: "Caf\u{e9}".to_string(),
        };
        assert!(matches!(engine.execute(&command).await, Err(Error::No(_))));
        assert_eq!(engine.state(), &ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn test_unsolicited_responses_reach_handler() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* 3 EXPUNGE\r\n* 23 EXISTS\r\n* OK [ALERT] disk nearly full\r\n")
            .read(b"* 14 FETCH (FLAGS (\\Seen))\r\nA0001 OK done\r\n")
            .build();
        let mut engine = attached(mock).await;
        let handler = CollectingHandler::new();
        engine.set_handler(Box::new(handler.clone()));

        let result = engine.execute(&Command::Noop).await.unwrap();
        assert_eq!(result.responses.len(), 4);

        let events = handler.take();
        assert_eq!(events[0], UnsolicitedEvent::Expunge(3));
        assert_eq!(events[1], UnsolicitedEvent::Exists(23));
        assert_eq!(events[2], UnsolicitedEvent::Alert("disk nearly full".to_string()));
        assert!(matches!(&events[3], UnsolicitedEvent::Fetch(data) if data.seq == 14));
    }

    #[tokio::test]
    async fn test_parse_error_reported_after_completion() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* LIST (\\HasNoChildren \"/\" \"INBOX\"\r\nA0001 OK done\r\n")
            .write(b"A0002 NOOP\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let mut engine = attached(mock).await;

        let err = engine.execute(&Command::Noop).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(engine.state(), &ConnectionState::Authenticated);
        engine.execute(&Command::Noop).await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_disconnects() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .build();
        let mut engine = attached(mock).await;

        let err = engine.execute(&Command::Noop).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(engine.state(), &ConnectionState::Disconnected);
        assert!(matches!(
            engine.execute(&Command::Noop).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_bye_before_eof_is_reported() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* BYE shutting down\r\n")
            .build();
        let mut engine = attached(mock).await;

        let err = engine.execute(&Command::Noop).await.unwrap_err();
        assert!(matches!(err, Error::Bye(ref text) if text == "shutting down"));
        assert_eq!(engine.state(), &ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stream_literal_lines() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 UID FETCH 7 BODY.PEEK[]\r\n")
            .read(b"* 3 FETCH (UID 7 BODY[] {25}\r\n")
            .read(b"Subject: hi\r\n\r\nline one\r\n")
            .read(b")\r\nA0001 OK done\r\n")
            .build();
        let mut engine = attached(mock).await;

        assert_eq!(engine.start_stream(&body_fetch()).await.unwrap(), Some(25));
        assert!(engine.is_streaming());
        assert!(matches!(
            engine.execute(&Command::Noop).await,
            Err(Error::InvalidState(_))
        ));

        let mut lines = Vec::new();
        while let Some(line) = engine.read_stream_line().await.unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, vec![
            b"Subject: hi\r\n".to_vec(),
            b"\r\n".to_vec(),
            b"line one\r\n".to_vec(),
        ]);
        assert!(!engine.is_streaming());
        assert_eq!(engine.read_stream_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_without_literal() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 UID FETCH 7 BODY.PEEK[]\r\n")
            .read(b"A0001 OK nothing matched\r\n")
            .build();
        let mut engine = attached(mock).await;

        assert_eq!(engine.start_stream(&body_fetch()).await.unwrap(), None);
        assert!(!engine.is_streaming());
    }

    #[tokio::test]
    async fn test_disconnect_mid_stream_skips_logout() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 UID FETCH 7 BODY.PEEK[]\r\n")
            .read(b"* 3 FETCH (BODY[] {100}\r\n")
            .build();
        let mut engine = attached(mock).await;

        engine.start_stream(&body_fetch()).await.unwrap();
        engine.disconnect().await;
        assert_eq!(engine.state(), &ConnectionState::Disconnected);
        assert_eq!(engine.read_stream_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disconnect_survives_logout_failure() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .build();
        let mut engine = attached(mock).await;

        engine.disconnect().await;
        assert_eq!(engine.state(), &ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_commands_need_a_connection() {
        let mut engine: ProtocolEngine<Mock> = ProtocolEngine::new(TIMEOUT);
        assert!(matches!(
            engine.execute(&Command::Noop).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            engine.select("INBOX", false).await,
            Err(Error::NotConnected)
        ));
        engine.disconnect().await;
        assert_eq!(engine.state(), &ConnectionState::Disconnected);
    }
}
