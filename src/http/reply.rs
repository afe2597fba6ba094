/// HTTP reply construction
///
/// A reply is assembled into one buffer (status line, caller headers,
/// synthesized `Content-Length`, blank line, body) and written in one call.

use std::io::Write;

use super::message::{HTTP_HDR_END_DELIM, HTTP_LINE_DELIM};
use crate::error::Result;

pub const HTTP_PROTOCOL_ID: &str = "HTTP/1.1 ";
pub const HTTP_OK: &str = "200 OK";
pub const HTTP_FOUND: &str = "302 Found";
pub const HTTP_NOT_FOUND: &str = "404 Not Found";
pub const HTTP_INTERNAL_ERROR: &str = "500 Internal Server Error";

const CONTENT_LENGTH_KEY: &str = "Content-Length: ";

/// Build the full byte sequence of a reply
///
/// `headers` holds zero or more complete header lines, each ending in CRLF.
pub fn build_reply(status: &str, headers: &str, body: &[u8]) -> Result<Vec<u8>> {
    let length = body.len().to_string();
    let header_size = HTTP_PROTOCOL_ID.len()
        + status.len()
        + HTTP_LINE_DELIM.len()
        + headers.len()
        + CONTENT_LENGTH_KEY.len()
        + length.len()
        + HTTP_HDR_END_DELIM.len();

    let mut out = Vec::new();
    out.try_reserve_exact(header_size + body.len())?;

    for part in [
        HTTP_PROTOCOL_ID,
        status,
        HTTP_LINE_DELIM,
        headers,
        CONTENT_LENGTH_KEY,
        length.as_str(),
        HTTP_HDR_END_DELIM,
    ] {
        out.extend_from_slice(part.as_bytes());
    }
    out.extend_from_slice(body);
    Ok(out)
}

/// Build a reply and send it on `stream`
pub fn http_reply<W: Write + ?Sized>(stream: &mut W, status: &str, headers: &str, body: &[u8]) -> Result<()> {
    let reply = build_reply(status, headers, body)?;
    stream.write_all(&reply)?;
    stream.flush()?;
    Ok(())
}

/// Reply channel handed to a message handler for one connection
pub struct Responder<'a> {
    connection_id: u64,
    stream: &'a mut dyn Write,
}

impl<'a> Responder<'a> {
    pub fn new(connection_id: u64, stream: &'a mut dyn Write) -> Self {
        Self { connection_id, stream }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn reply(&mut self, status: &str, headers: &str, body: &[u8]) -> Result<()> {
        http_reply(&mut *self.stream, status, headers, body)
    }
}
