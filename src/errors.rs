use crate::Method;
use std::{fmt, io};

/// Errors produced while reading and parsing a request.
///
/// Every variant except [`Io`](ErrorKind::Io) and
/// [`UnexpectedEof`](ErrorKind::UnexpectedEof) is answered with a canned
/// error response before the connection is closed.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    /// The request line is not `METHOD SP TARGET SP HTTP/x`.
    #[error("malformed request line")]
    MalformedRequestLine,
    /// The version is anything other than `HTTP/1.1`.
    #[error("unsupported http version, only HTTP/1.1 is accepted")]
    UnsupportedVersion,
    /// A header line has no colon or a non UTF-8 value.
    #[error("malformed header")]
    MalformedHeader,
    /// A header name is empty, not a token, or followed by whitespace.
    #[error("malformed field name")]
    MalformedFieldName,
    /// The parser already failed; further input is refused.
    #[error("request is in error state")]
    RequestInErrorState,

    /// The request line or a header line does not fit into the read buffer.
    #[error("request header section too large")]
    HeadersTooLarge,
    /// `content-length` exceeds the configured body limit.
    #[error("request body too large")]
    BodyTooLarge,

    /// The peer closed the stream before the request was complete.
    #[error("connection closed before the request was complete")]
    UnexpectedEof,
    /// Transport failure, including read timeouts.
    #[error("i/o error: {0}")]
    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status_code:literal, $len:literal => $json:literal; )*) => {
        /// Returns the canned response for this error, if the peer should get one.
        pub(crate) fn as_http(&self, json: bool) -> Option<&'static [u8]> {
            let response = match (json, self) { $(
                (true, Self::$name { .. }) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
                (false, Self::$name { .. }) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: 0\r\n",
                    "content-type: text/plain\r\n",
                    "\r\n",
                ),
            )*
                (_, Self::UnexpectedEof | Self::Io(_)) => return None,
            };

            Some(response.as_bytes())
        }
    };
}

impl ErrorKind {
    http_errors! {
        MalformedRequestLine: "400 Bad Request", "66"
            => r#"{"error":"Malformed request line","code":"MALFORMED_REQUEST_LINE"}"#;
        UnsupportedVersion: "400 Bad Request", "67"
            => r#"{"error":"HTTP version not supported","code":"UNSUPPORTED_VERSION"}"#;
        MalformedHeader: "400 Bad Request", "54"
            => r#"{"error":"Malformed header","code":"MALFORMED_HEADER"}"#;
        MalformedFieldName: "400 Bad Request", "62"
            => r#"{"error":"Malformed field name","code":"MALFORMED_FIELD_NAME"}"#;
        RequestInErrorState: "400 Bad Request", "52"
            => r#"{"error":"Invalid request","code":"INVALID_REQUEST"}"#;

        HeadersTooLarge: "431 Request Header Fields Too Large", "63"
            => r#"{"error":"Request header too large","code":"HEADERS_TOO_LARGE"}"#;
        BodyTooLarge: "413 Payload Too Large", "58"
            => r#"{"error":"Request body too large","code":"BODY_TOO_LARGE"}"#;
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lookup failures returned by [`Router::find`](crate::Router::find).
///
/// The two cases stay distinct so the caller decides whether to answer
/// `404` and `405` separately or collapse them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// No trie path matches the request path.
    #[error("url not found")]
    NotFound,
    /// The path resolved, but no handler is registered for the method.
    #[error("method not allowed")]
    MethodNotAllowed {
        /// Methods served at the resolved path; empty when the path is only a
        /// prefix of other routes.
        allowed: Vec<Method>,
    },
}

/// Configuration errors raised while routes are registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("duplicate handler for {method} {path}")]
    DuplicateRoute { method: Method, path: String },
    #[error("wildcard must be the last segment in {path}")]
    WildcardNotLast { path: String },
}

/// Errors returned by the [`Response`](crate::Response) writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("unrecognized status code {0}")]
    UnrecognizedStatus(u16),
    #[error("`{0}` called out of order")]
    OutOfOrder(&'static str),
    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: usize },
}
