//! Server configuration limits and timeouts
//!
//! Every struct here has a [`Default`] impl; override single fields with
//! struct update syntax and pass the result to the [`ServerBuilder`](crate::ServerBuilder).
//!
//! # Examples
//!
//! ```no_run
//! use scratch_http::{limits::{ConnLimits, ReqLimits}, Router, Server};
//! use tokio::net::TcpListener;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:42069").await.unwrap())
//!         .router(Router::builder().build())
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_body_size: 16 * 1024, // 16KB for larger payloads
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Server-wide behavior.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Format for error responses (default: `false`)
    ///
    /// # Examples
    /// If `true`, then on a parse error the server will return:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// connection: close\r
    /// content-length: 54\r
    /// content-type: application/json\r
    /// \r
    /// {"error":"Malformed header","code":"MALFORMED_HEADER"}
    /// ```
    /// If `false`, then on a parse error the server will return:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// connection: close\r
    /// content-length: 0\r
    /// content-type: text/plain\r
    /// \r
    /// ```
    pub json_errors: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            json_errors: false,

            _priv: (),
        }
    }
}

/// Connection-level timeouts
///
/// Each connection serves exactly one request, so these bound the whole
/// exchange: one for receiving the request, one for sending the response.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum duration to receive a complete request (default: `10 seconds`)
    ///
    /// The connection is closed without a response when it runs out.
    /// Stops clients that open a connection and trickle bytes forever.
    pub socket_read_timeout: Duration,

    /// Maximum duration to write the response (default: `10 seconds`)
    pub socket_write_timeout: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(10),
            socket_write_timeout: Duration::from_secs(10),

            _priv: (),
        }
    }
}

/// Request reading limits
///
/// **You MAY need to increase these if you see:**
/// - `413 Payload Too Large` for legitimate requests
/// - `431 Request Header Fields Too Large`
///
/// # Memory Allocation Strategy
///
/// The read buffer starts at `initial_buffer_size` and doubles whenever it
/// fills up without yielding a complete line, never beyond `max_head_size`.
/// Body bytes are moved out of the buffer as they arrive, so a large body
/// does not grow it.
///
/// ```text
/// Peak buffer = max_head_size
/// Peak body   = max_body_size
/// ```
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Starting size of the read buffer (default: `1000 B`)
    pub initial_buffer_size: usize,

    /// Maximum size of the request line plus all header lines, CRLFs
    /// included (default: `8 KB`)
    ///
    /// Exceeding it answers `431 Request Header Fields Too Large`.
    pub max_head_size: usize,

    /// Maximum accepted `content-length` (default: `1 MB`)
    ///
    /// Exceeding it answers `413 Payload Too Large` before any body byte
    /// is read.
    pub max_body_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            initial_buffer_size: 1000,
            max_head_size: 8 * 1024,
            max_body_size: 1024 * 1024,

            _priv: (),
        }
    }
}

/// Response buffer limits
///
/// # Buffer Management
///
/// Each response is serialized into an in-memory buffer that starts with
/// `default_capacity` bytes and grows as the handler writes, up to
/// `max_capacity` bytes for the whole message (head, body, chunk framing
/// and trailers). A write past that limit fails with
/// [`ResponseError::TooLarge`](crate::ResponseError::TooLarge) and the
/// client receives `500 Internal Server Error`.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial response buffer capacity (default: `1 KB`)
    pub default_capacity: usize,
    /// Maximum size of a serialized response (default: `1 MB`)
    pub max_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 1024 * 1024,

            _priv: (),
        }
    }
}
