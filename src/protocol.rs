//! GETFILE protocol request grammar and response status parsing.
//!
//! Request:  `GETFILE GET <path>\r\n\r\n`
//! Response: `GETFILE <STATUS>[ <length>]\r\n\r\n[<content>]`
//!
//! The request rules are strict: exactly one space after `GETFILE`, exactly
//! one after `GET`, and the path must begin with `/`.

use bytes::{BufMut, Bytes, BytesMut};
use std::str;

/// Protocol scheme token that starts every request and response
pub const SCHEME: &str = "GETFILE";

/// Header terminator
pub const MARKER: &[u8] = b"\r\n\r\n";

/// Size of a GETFILE server's request buffer, terminator byte included
pub const MAX_REQUEST_LEN: usize = 1024;

const REQUEST_PREFIX: &[u8] = b"GETFILE GET /";

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    FileNotFound,
    Error,
    Invalid,
}

impl Status {
    /// Wire token for this status
    pub fn token(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::FileNotFound => "FILE_NOT_FOUND",
            Status::Error => "ERROR",
            Status::Invalid => "INVALID",
        }
    }

    /// Full status prefix, e.g. `GETFILE OK`
    pub fn prefix(self) -> &'static str {
        match self {
            Status::Ok => "GETFILE OK",
            Status::FileNotFound => "GETFILE FILE_NOT_FOUND",
            Status::Error => "GETFILE ERROR",
            Status::Invalid => "GETFILE INVALID",
        }
    }

    /// Look up a status by its wire token
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "OK" => Some(Status::Ok),
            "FILE_NOT_FOUND" => Some(Status::FileNotFound),
            "ERROR" => Some(Status::Error),
            "INVALID" => Some(Status::Invalid),
            _ => None,
        }
    }

    /// Look up a status by its full prefix (`GETFILE <TOKEN>`)
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        prefix
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(' '))
            .and_then(Self::from_token)
    }

    /// Whether a conformance case may expect this status.
    ///
    /// `ERROR` signals a server-side failure rather than a protocol rule, so
    /// no case can be written against it.
    pub fn is_conformance_token(self) -> bool {
        !matches!(self, Status::Error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Protocol parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Header terminator not found
    Incomplete,
    /// Does not start with the expected scheme/method prefix
    BadPrefix,
    /// Wrong number of spaces in the header line
    BadSpacing(usize),
    /// Path missing or not absolute
    BadPath,
    /// Request does not fit in a server's request buffer
    RequestTooLong(usize),
    /// Response carried a status token we do not know
    UnknownStatus(String),
    /// Content length missing or not a number
    BadLength(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "Missing header terminator"),
            ParseError::BadPrefix => write!(f, "Header does not start with '{}'", SCHEME),
            ParseError::BadSpacing(n) => write!(f, "Expected 2 spaces in header, found {}", n),
            ParseError::BadPath => write!(f, "Path must start with '/'"),
            ParseError::RequestTooLong(n) => write!(f, "Request too long: {} bytes", n),
            ParseError::UnknownStatus(s) => write!(f, "Unknown status: {}", s),
            ParseError::BadLength(s) => write!(f, "Invalid content length: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// A well-formed GETFILE request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Encode as wire bytes
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REQUEST_PREFIX.len() + self.path.len() + 4);
        buf.put_slice(b"GETFILE GET ");
        buf.put_slice(self.path.as_bytes());
        buf.put_slice(MARKER);
        buf.freeze()
    }

    /// Parse a request from raw bytes.
    ///
    /// A server reads at most `MAX_REQUEST_LEN - 1` bytes, so anything longer
    /// loses its terminator and is rejected. Spaces are counted over the
    /// whole buffer, trailing bytes after the marker included.
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if !buffer.starts_with(REQUEST_PREFIX) {
            return Err(ParseError::BadPrefix);
        }
        if buffer.len() >= MAX_REQUEST_LEN {
            return Err(ParseError::RequestTooLong(buffer.len()));
        }

        let header_end = find_marker(buffer).ok_or(ParseError::Incomplete)?;

        let spaces = buffer.iter().filter(|&&b| b == b' ').count();
        if spaces != 2 {
            return Err(ParseError::BadSpacing(spaces));
        }

        // Prefix check guarantees the path starts right after "GET "
        let path = &buffer[REQUEST_PREFIX.len() - 1..header_end];
        if path.first() != Some(&b'/') || path.contains(&b'\r') || path.contains(&b'\n') {
            return Err(ParseError::BadPath);
        }

        let path = str::from_utf8(path).map_err(|_| ParseError::BadPath)?;
        Ok(Request::new(path))
    }
}

/// A parsed response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: Status,
    /// Content length, present only for `OK`
    pub length: Option<u64>,
    /// Bytes consumed by the header, including the terminator
    pub header_len: usize,
}

impl ResponseHeader {
    /// Parse `GETFILE <STATUS>[ <length>]\r\n\r\n`
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if !buffer.starts_with(SCHEME.as_bytes()) {
            return Err(ParseError::BadPrefix);
        }

        let header_end = find_marker(buffer).ok_or(ParseError::Incomplete)?;
        let header = str::from_utf8(&buffer[..header_end])
            .map_err(|_| ParseError::UnknownStatus("<non-utf8>".to_string()))?;

        let parts: Vec<&str> = header.split(' ').collect();
        if parts.len() < 2 || parts[0] != SCHEME {
            return Err(ParseError::BadPrefix);
        }

        let status = Status::from_token(parts[1])
            .ok_or_else(|| ParseError::UnknownStatus(parts[1].to_string()))?;

        let length = match (status, parts.len()) {
            (Status::Ok, 3) => Some(
                parts[2]
                    .parse::<u64>()
                    .map_err(|_| ParseError::BadLength(parts[2].to_string()))?,
            ),
            (Status::Ok, _) => return Err(ParseError::BadLength(header.to_string())),
            (_, 2) => None,
            (_, n) => return Err(ParseError::BadSpacing(n - 1)),
        };

        Ok(ResponseHeader {
            status,
            length,
            header_len: header_end + MARKER.len(),
        })
    }
}

/// Find `\r\n\r\n` in buffer, returning the position of the first `\r`
fn find_marker(buffer: &[u8]) -> Option<usize> {
    buffer.windows(MARKER.len()).position(|w| w == MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_request() {
        let req = Request::parse(b"GETFILE GET /a/b.jpg\r\n\r\n").unwrap();
        assert_eq!(req.path, "/a/b.jpg");
    }

    #[test]
    fn test_root_path_is_grammatical() {
        let req = Request::parse(b"GETFILE GET /\r\n\r\n").unwrap();
        assert_eq!(req.path, "/");
    }

    #[test]
    fn test_missing_leading_slash() {
        assert_eq!(
            Request::parse(b"GETFILE GET no/leading/slash\r\n\r\n"),
            Err(ParseError::BadPrefix)
        );
    }

    #[test]
    fn test_missing_space_between_tokens() {
        assert_eq!(
            Request::parse(b"GETFILEGET /x\r\n\r\n"),
            Err(ParseError::BadPrefix)
        );
    }

    #[test]
    fn test_extra_spaces() {
        assert_eq!(
            Request::parse(b"GETFILE    GET /x\r\n\r\n"),
            Err(ParseError::BadPrefix)
        );
        assert_eq!(
            Request::parse(b"GETFILE GET      /x\r\n\r\n"),
            Err(ParseError::BadPrefix)
        );
        assert_eq!(
            Request::parse(b"GETFILE GET /a b\r\n\r\n"),
            Err(ParseError::BadSpacing(3))
        );
    }

    #[test]
    fn test_missing_marker() {
        assert_eq!(
            Request::parse(b"GETFILE GET /x\r\n"),
            Err(ParseError::Incomplete)
        );
    }

    #[test]
    fn test_long_path() {
        let path = format!("/path/too/long/{}", "a".repeat(500));
        let req = Request::parse(&Request::new(path.clone()).encode()).unwrap();
        assert_eq!(req.path, path);
    }

    #[test]
    fn test_request_length_boundary() {
        // 16 bytes of framing plus the leading '/'
        let fits = Request::new(format!("/{}", "a".repeat(MAX_REQUEST_LEN - 1 - 17))).encode();
        assert_eq!(fits.len(), MAX_REQUEST_LEN - 1);
        assert!(Request::parse(&fits).is_ok());

        let too_long = Request::new(format!("/{}", "a".repeat(MAX_REQUEST_LEN - 17))).encode();
        assert_eq!(too_long.len(), MAX_REQUEST_LEN);
        assert_eq!(
            Request::parse(&too_long),
            Err(ParseError::RequestTooLong(MAX_REQUEST_LEN))
        );
    }

    #[test]
    fn test_space_after_marker_counts() {
        assert_eq!(
            Request::parse(b"GETFILE GET /a\r\n\r\nx y"),
            Err(ParseError::BadSpacing(3))
        );
        // Trailing bytes without spaces do not change the verdict
        assert!(Request::parse(b"GETFILE GET /a\r\n\r\nxy").is_ok());
    }

    #[test]
    fn test_encode() {
        assert_eq!(
            &Request::new("/x").encode()[..],
            b"GETFILE GET /x\r\n\r\n"
        );
    }

    #[test]
    fn test_status_prefix_lookup() {
        assert_eq!(Status::from_prefix("GETFILE OK"), Some(Status::Ok));
        assert_eq!(
            Status::from_prefix("GETFILE FILE_NOT_FOUND"),
            Some(Status::FileNotFound)
        );
        assert_eq!(Status::from_prefix("GETFILE INVALID"), Some(Status::Invalid));
        assert_eq!(Status::from_prefix("GETFILE  OK"), None);
        assert_eq!(Status::from_prefix("getfile OK"), None);
        assert!(!Status::Error.is_conformance_token());
    }

    #[test]
    fn test_parse_ok_response() {
        let header = ResponseHeader::parse(b"GETFILE OK 5\r\n\r\nhello").unwrap();
        assert_eq!(header.status, Status::Ok);
        assert_eq!(header.length, Some(5));
        assert_eq!(header.header_len, 16);
    }

    #[test]
    fn test_parse_error_responses() {
        let header = ResponseHeader::parse(b"GETFILE FILE_NOT_FOUND\r\n\r\n").unwrap();
        assert_eq!(header.status, Status::FileNotFound);
        assert_eq!(header.length, None);

        assert!(matches!(
            ResponseHeader::parse(b"GETFILE OK\r\n\r\n"),
            Err(ParseError::BadLength(_))
        ));
        assert!(matches!(
            ResponseHeader::parse(b"GETFILE OK abc\r\n\r\n"),
            Err(ParseError::BadLength(_))
        ));
        assert!(matches!(
            ResponseHeader::parse(b"GETFILE NOPE\r\n\r\n"),
            Err(ParseError::UnknownStatus(_))
        ));
        assert_eq!(
            ResponseHeader::parse(b"HTTP/1.1 200 OK\r\n\r\n"),
            Err(ParseError::BadPrefix)
        );
    }
}
