/// HTTP request parsing over a partially received byte stream
///
/// The parser is not incremental: every call scans the buffer from byte 0.
/// All fields of a parsed message are views into the caller's buffer.

/// Size of the buffer allowed for the request line and headers alone
pub const MAX_HEADER_SIZE: usize = 8192;

/// Most header lines accepted in one message
pub const MAX_HEADERS: usize = 40;

pub const HTTP_LINE_DELIM: &str = "\r\n";
pub const HTTP_HDR_KV_DELIM: &str = ": ";
pub const HTTP_HDR_END_DELIM: &str = "\r\n\r\n";

/// One `key: value` header line, case preserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpHeader<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// A complete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub headers: Vec<HttpHeader<'a>>,
    pub body: &'a [u8],
}

impl<'a> HttpMessage<'a> {
    /// Value of the first header named exactly `key`
    pub fn header(&self, key: &str) -> Option<&'a str> {
        self.headers.iter().find(|h| h.key == key).map(|h| h.value)
    }

    /// Whether the URI starts with `prefix`
    pub fn match_uri(&self, prefix: &str) -> bool {
        self.uri.starts_with(prefix)
    }

    pub fn match_verb(&self, verb: &str) -> bool {
        self.method == verb
    }

    /// Value of query variable `name` (`?a=1&name=value`)
    pub fn query_var(&self, name: &str) -> Option<&'a str> {
        let (_, query) = self.uri.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Outcome of one parse attempt
#[derive(Debug, PartialEq, Eq)]
pub enum ParseStatus<'a> {
    /// More bytes are needed. `content_length` is the announced body length
    /// once the headers are complete, 0 before that or when there is no body.
    Incomplete { content_length: usize },
    /// A whole message; `consumed` bytes of the buffer belong to it
    Complete {
        message: HttpMessage<'a>,
        consumed: usize,
    },
    Malformed(&'static str),
}

/// Try to extract one request from the start of `stream`
pub fn parse_message(stream: &[u8]) -> ParseStatus<'_> {
    let end_delim = HTTP_HDR_END_DELIM.as_bytes();
    let Some(header_end) = stream
        .windows(end_delim.len())
        .position(|w| w == end_delim)
    else {
        return ParseStatus::Incomplete { content_length: 0 };
    };

    let Ok(head) = std::str::from_utf8(&stream[..header_end]) else {
        return ParseStatus::Malformed("header section is not valid UTF-8");
    };

    let mut lines = head.split(HTTP_LINE_DELIM);
    let request_line = lines.next().unwrap_or_default();

    // Protocol version after the URI is not kept
    let Some((method, rest)) = request_line.split_once(' ') else {
        return ParseStatus::Malformed("request line has no URI");
    };
    let uri = rest.split(' ').next().unwrap_or_default();
    if method.is_empty() || uri.is_empty() {
        return ParseStatus::Malformed("empty method or URI");
    }

    let mut headers = Vec::new();
    for line in lines {
        let Some((key, value)) = line.split_once(HTTP_HDR_KV_DELIM) else {
            return ParseStatus::Malformed("header line without key/value delimiter");
        };
        if headers.len() == MAX_HEADERS {
            return ParseStatus::Malformed("too many headers");
        }
        headers.push(HttpHeader { key, value });
    }

    let content_length = headers
        .iter()
        .find(|h| h.key == "Content-Length")
        .map_or(0, |h| leading_number(h.value));

    let body_start = header_end + end_delim.len();
    let consumed = body_start.saturating_add(content_length);
    if stream.len() < consumed {
        return ParseStatus::Incomplete { content_length };
    }

    ParseStatus::Complete {
        message: HttpMessage {
            method,
            uri,
            headers,
            body: &stream[body_start..consumed],
        },
        consumed,
    }
}

/// Leading decimal digits of `value`; anything unparsable counts as 0
fn leading_number(value: &str) -> usize {
    let value = value.trim_start();
    let digits = value
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value, |end| &value[..end]);
    digits.parse().unwrap_or(0)
}
