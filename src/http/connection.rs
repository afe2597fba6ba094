/// Per-connection read/parse/dispatch loop
///
/// Bytes read from the peer accumulate in a buffer allowed to hold headers
/// only. Once a message announces a body, the allowance grows once to make
/// room for it. Each complete message is handed to a [`MessageHandler`], its bytes
/// are dropped from the buffer, and the loop continues with the next one.

use std::io::{self, Read, Write};

use tracing::trace;

use super::message::{parse_message, HttpMessage, ParseStatus, MAX_HEADER_SIZE};
use super::reply::Responder;
use crate::error::{ImgfsError, Result};

/// Callback invoked once per complete message
///
/// The handler must send exactly one reply through the responder before
/// returning `Ok`. Returning an error closes the connection.
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, message: &HttpMessage<'_>, responder: &mut Responder<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Reading,
    Complete,
    Closed,
}

/// Bytes requested from the peer per read call
const READ_CHUNK: usize = 4096;

/// What to do with the buffer after a parse attempt
enum Step {
    NeedMore { content_length: usize },
    Dispatched { consumed: usize },
}

pub struct Connection<S> {
    id: u64,
    stream: S,
    /// Received, not yet consumed bytes; the length is what arrived
    buffer: Vec<u8>,
    /// Most bytes the buffer may hold for the current message
    allowance: usize,
    extended: bool,
    state: ConnectionState,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(id: u64, stream: S) -> Self {
        Self {
            id,
            stream,
            buffer: Vec::new(),
            allowance: MAX_HEADER_SIZE,
            extended: false,
            state: ConnectionState::Reading,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Serve messages until the peer closes the connection or an error occurs
    ///
    /// A clean close by the peer returns `Ok(())`.
    pub fn run<H: MessageHandler + ?Sized>(&mut self, handler: &H) -> Result<()> {
        let result = self.serve(handler);
        self.state = ConnectionState::Closed;
        result
    }

    fn serve<H: MessageHandler + ?Sized>(&mut self, handler: &H) -> Result<()> {
        self.buffer.try_reserve_exact(MAX_HEADER_SIZE)?;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let room = READ_CHUNK.min(self.allowance - self.buffer.len());
            let read = match self.stream.read(&mut chunk[..room]) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            self.buffer.extend_from_slice(&chunk[..read]);
            trace!(connection = self.id, read, buffered = self.buffer.len(), "Read from peer");

            self.drain_messages(handler)?;
        }
    }

    /// Dispatch every complete message currently buffered
    fn drain_messages<H: MessageHandler + ?Sized>(&mut self, handler: &H) -> Result<()> {
        loop {
            let step = match parse_message(&self.buffer) {
                ParseStatus::Malformed(reason) => return Err(ImgfsError::MalformedRequest(reason)),
                ParseStatus::Incomplete { content_length } => Step::NeedMore { content_length },
                ParseStatus::Complete { message, consumed } => {
                    self.state = ConnectionState::Complete;
                    let mut responder = Responder::new(self.id, &mut self.stream);
                    handler.handle_message(&message, &mut responder)?;
                    Step::Dispatched { consumed }
                }
            };

            match step {
                Step::NeedMore { content_length } => {
                    self.state = ConnectionState::Reading;
                    return self.make_room(content_length);
                }
                Step::Dispatched { consumed } => {
                    // Keep any bytes of a following message
                    self.buffer.drain(..consumed);
                    self.shrink();
                    self.state = ConnectionState::Reading;
                    if self.buffer.is_empty() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Raise the allowance once for an announced body, or fail if it is used up
    ///
    /// Only capacity is reserved; memory is filled as body bytes arrive.
    fn make_room(&mut self, content_length: usize) -> Result<()> {
        if content_length > 0 && !self.extended {
            let wanted = MAX_HEADER_SIZE.saturating_add(content_length);
            if wanted > self.allowance {
                self.buffer.try_reserve_exact(wanted - self.buffer.len())?;
                self.allowance = wanted;
            }
            self.extended = true;
        }

        if self.buffer.len() >= self.allowance {
            return Err(ImgfsError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "request exceeds the buffer allowance",
            )));
        }
        Ok(())
    }

    /// Return to the header-only allowance after a message was consumed
    fn shrink(&mut self) {
        self.allowance = MAX_HEADER_SIZE.max(self.buffer.len());
        self.buffer.shrink_to(self.allowance);
        self.extended = false;
    }
}
