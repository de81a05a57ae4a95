//! Core HTTP protocol types and utilities

use crate::errors::ResponseError;
use std::{convert::Infallible, fmt};

// TOKEN CHARSET

// 1 = allowed in a field name / method token
// ALPHA, DIGIT and "!#$%&'*+-.^_`|~"
#[rustfmt::skip]
const TOKEN_TABLE: [u8; 256] = [
    //x0 x1 x2 x3 x4 x5 x6 x7 x8 x9 xA xB xC xD xE xF
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0x
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 1x
    0, 1, 0, 1, 1, 1, 1, 1, 0, 0, 1, 1, 0, 1, 1, 0, // 2x
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, // 3x
    0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 4x
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 1, 1, // 5x
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 6x
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 0, 1, 0, // 7x
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 8x
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 9x
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // Ax
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // Bx
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // Cx
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // Dx
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // Ex
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // Fx
];

/// Returns `true` if every byte belongs to the token charset.
///
/// An empty slice is not a token.
#[inline(always)]
pub(crate) fn is_token(src: &[u8]) -> bool {
    !src.is_empty() && src.iter().all(|&byte| TOKEN_TABLE[byte as usize] == 1)
}

// METHOD

/// HTTP request methods
///
/// Method names are case-sensitive. Anything that is a valid token but not
/// one of the standard names is kept as [`Method::Extension`].
///
/// # References
///
/// - [RFC 7231, Section 4](https://datatracker.ietf.org/doc/html/rfc7231#section-4)
/// - [RFC 5789](https://datatracker.ietf.org/doc/html/rfc5789) (PATCH method)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method - transfer a current representation of the target resource
    Get,
    /// HEAD method - same as GET but without response body
    Head,
    /// POST method - perform resource-specific processing on the request payload
    Post,
    /// PUT method - replace all current representations of the target resource
    Put,
    /// DELETE method - remove all current representations of the target resource
    Delete,
    /// PATCH method - apply partial modifications to a resource
    Patch,
    /// OPTIONS method - describe the communication options for the target resource
    Options,
    /// CONNECT method - establish a tunnel
    Connect,
    /// TRACE method - message loop-back test
    Trace,
    /// Any other token
    Extension(Box<str>),
}

impl Method {
    /// Builds a method from its wire name.
    ///
    /// Returns `None` if `src` is not a token.
    #[inline]
    pub fn from_bytes(src: &[u8]) -> Option<Self> {
        let method = match src {
            b"GET" => Method::Get,
            b"HEAD" => Method::Head,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"PATCH" => Method::Patch,
            b"OPTIONS" => Method::Options,
            b"CONNECT" => Method::Connect,
            b"TRACE" => Method::Trace,
            other if is_token(other) => {
                // A token is ASCII, so this cannot fail
                let name = std::str::from_utf8(other).ok()?;
                Method::Extension(name.into())
            }
            _ => return None,
        };

        Some(method)
    }

    /// Returns the wire name, e.g. `"GET"`.
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
            Method::Extension(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// HTTP status codes supported by the response writer
        ///
        /// The set is closed: numeric codes outside of it are rejected with
        /// [`ResponseError::UnrecognizedStatus`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            // Returns the HTTP first line as bytes (e.g., `b"HTTP/1.1 200 OK\r\n"`).
            #[inline]
            pub(crate) const fn to_status_line(self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes(),
                )+ }
            }

            /// Returns the reason phrase, e.g. `"Not Found"`.
            #[inline]
            pub const fn reason(self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }
        }

        impl TryFrom<u16> for StatusCode {
            type Error = ResponseError;

            #[inline]
            fn try_from(code: u16) -> Result<Self, Self::Error> {
                match code {
                    $( $num => Ok(StatusCode::$name), )+
                    other => Err(ResponseError::UnrecognizedStatus(other)),
                }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");

    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BadRequest = (400, "Bad Request");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
    /// [[RFC9110, Section 15.5.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.6)]
    MethodNotAllowed = (405, "Method Not Allowed");
    /// [[RFC9110, Section 15.5.14](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.14)]
    PayloadTooLarge = (413, "Payload Too Large");
    /// [[RFC6585, Section 5](https://datatracker.ietf.org/doc/html/rfc6585#section-5)]
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");

    /// [[RFC9110, Section 15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)]
    InternalServerError = (500, "Internal Server Error");
}

impl StatusCode {
    /// Returns the numeric code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

impl From<Infallible> for ResponseError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
