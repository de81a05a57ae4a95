//! scratch_http - HTTP/1.1 server built directly on raw byte streams
//!
//! Owns every layer between the socket and the handler: an incremental
//! request parser, a case-insensitive header collection, a response writer
//! with chunked framing and trailers, and a segment-trie router.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1 only**: any other version is answered with `400 Bad Request`
//! - **One request per connection**: the response always closes the connection
//! - **Request bodies**: `Content-Length` framing only
//! - **Response bodies**: fixed length or chunked, with optional trailers
//!
//! # Routing
//!
//! - Literal segments win over the `*` wildcard, which absorbs the rest of
//!   the path (`/files/*` matches `/files`, `/files/a` and `/files/a/b`)
//! - `404 Not Found` and `405 Method Not Allowed` (with `Allow`) are distinct
//! - Every routed path answers `OPTIONS` with its `Allow` list
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use scratch_http::{default_headers, Request, Response, Router, Server, StatusCode};
//! use tokio::net::TcpListener;
//!
//! fn hello(resp: &mut Response, _: &Request) {
//!     let body = b"Hello World!";
//!     let _ = resp
//!         .write_status_line(StatusCode::Ok)
//!         .and_then(|_| resp.write_headers(&default_headers(body.len())))
//!         .and_then(|_| resp.write_body(body));
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::builder();
//!     router.get("/*", hello)?;
//!
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:42069").await?)
//!         .router(router.build())
//!         .build()
//!         .launch()
//!         .await;
//!
//!     Ok(())
//! }
//! ```
//! Parsing without a server:
//! ```
//! use scratch_http::{ParserState, Request};
//!
//! let mut request = Request::new();
//! let consumed = request.parse(b"GET /coffee HTTP/1.1\r\nHost: loc").unwrap();
//! assert_eq!(consumed, 22);
//!
//! let consumed = request.parse(b"Host: localhost\r\n\r\n").unwrap();
//! assert_eq!(consumed, 19);
//! assert_eq!(request.state(), ParserState::Done);
//! assert_eq!(request.headers().get("host"), Some("localhost"));
//! ```

pub(crate) mod http {
    pub(crate) mod headers;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod router;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    errors::{ErrorKind, IoError, RegisterError, ResponseError, RouteError},
    http::{
        headers::Headers,
        request::{ParserState, Request},
        response::{default_headers, Response},
        types::{Method, StatusCode},
    },
    server::{
        router::{Router, RouterBuilder},
        server_impl::{Handler, Server, ServerBuilder, ShutdownHandle},
    },
};

#[cfg(test)]
pub mod tools {
    use std::str::from_utf8;

    #[inline]
    pub fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }
}
