//! Sequential HTTP/1.1 response writer with chunked framing helpers.

use crate::{
    errors::ResponseError,
    http::{headers::{Headers, CRLF}, types::StatusCode},
    limits::RespLimits,
};

/// HTTP response writer handed to every [`Handler`](crate::Handler).
///
/// Output is appended to an in-memory buffer that the connection flushes
/// once the handler returns. Calls must follow the message layout:
///
/// ```text
/// write_status_line -> write_headers -> write_body* [-> write_headers]
/// ```
///
/// The optional second [`write_headers`](Response::write_headers) is the
/// trailer block of a chunked body. A call made out of order leaves the
/// buffer untouched and returns [`ResponseError::OutOfOrder`].
///
/// The buffer never grows past [`RespLimits::max_capacity`]. A write that
/// would cross it is rejected with [`ResponseError::TooLarge`] and the
/// connection answers `500 Internal Server Error` instead of the partial
/// message.
///
/// # Chunked bodies
///
/// Declare the encoding in the first header block, then frame the payload:
///
/// ```
/// use scratch_http::{default_headers, Headers, Response, StatusCode};
///
/// let mut resp = Response::new();
/// let mut headers = default_headers(0);
/// headers.delete("content-length");
/// headers.set("transfer-encoding", "chunked");
/// headers.set("trailer", "x-content-length");
///
/// resp.write_status_line(StatusCode::Ok).unwrap();
/// resp.write_headers(&headers).unwrap();
/// resp.write_chunk(b"Hello, ").unwrap();
/// resp.write_chunk(b"world!").unwrap();
/// resp.write_last_chunk().unwrap();
///
/// let mut trailers = Headers::new();
/// trailers.set("x-content-length", "13");
/// resp.write_trailers(&trailers).unwrap();
///
/// assert!(resp.as_bytes().ends_with(b"0\r\nx-content-length: 13\r\n\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    buffer: Vec<u8>,
    max_capacity: usize,
    overflowed: bool,
    state: ResponseState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResponseState {
    StatusLine,
    Headers,
    Body,
    Complete,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    #[inline]
    pub fn new() -> Self {
        Self::with_limits(&RespLimits::default())
    }

    #[inline(always)]
    pub(crate) fn with_limits(limits: &RespLimits) -> Self {
        Self {
            buffer: Vec::with_capacity(limits.default_capacity.min(limits.max_capacity)),
            max_capacity: limits.max_capacity,
            overflowed: false,
            state: ResponseState::StatusLine,
        }
    }

    /// Everything written so far.
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// `true` once a write was rejected for crossing the size limit.
    #[inline(always)]
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    #[inline]
    fn ensure_room(&mut self, additional: usize) -> Result<(), ResponseError> {
        match self.buffer.len() + additional <= self.max_capacity {
            true => Ok(()),
            false => {
                self.overflowed = true;
                Err(ResponseError::TooLarge {
                    limit: self.max_capacity,
                })
            }
        }
    }

    #[inline]
    fn expect_state(
        &self,
        expected: ResponseState,
        operation: &'static str,
    ) -> Result<(), ResponseError> {
        match self.state == expected {
            true => Ok(()),
            false => Err(ResponseError::OutOfOrder(operation)),
        }
    }
}

impl Response {
    /// Writes `HTTP/1.1 <code> <reason>\r\n`.
    ///
    /// Accepts a [`StatusCode`] or its numeric value.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::UnrecognizedStatus`] for a code outside [`StatusCode`]
    /// - [`ResponseError::OutOfOrder`] if a status line was already written
    ///
    /// # Examples
    /// ```
    /// use scratch_http::{Response, ResponseError, StatusCode};
    ///
    /// let mut resp = Response::new();
    /// assert_eq!(resp.write_status_line(302u16), Err(ResponseError::UnrecognizedStatus(302)));
    ///
    /// resp.write_status_line(StatusCode::NotFound).unwrap();
    /// assert_eq!(resp.as_bytes(), b"HTTP/1.1 404 Not Found\r\n");
    /// ```
    pub fn write_status_line<S>(&mut self, status: S) -> Result<(), ResponseError>
    where
        S: TryInto<StatusCode>,
        ResponseError: From<S::Error>,
    {
        self.expect_state(ResponseState::StatusLine, "write_status_line")?;
        let status = status.try_into()?;
        self.ensure_room(status.to_status_line().len())?;

        self.buffer.extend_from_slice(status.to_status_line());
        self.state = ResponseState::Headers;
        Ok(())
    }

    /// Writes `name: value\r\n` per field, then the terminating `\r\n`.
    ///
    /// The first call after the status line writes the header section. A
    /// second call after the body writes the trailer section and completes
    /// the response.
    pub fn write_headers(&mut self, headers: &Headers) -> Result<(), ResponseError> {
        let next = match self.state {
            ResponseState::Headers => ResponseState::Body,
            ResponseState::Body => ResponseState::Complete,
            ResponseState::StatusLine | ResponseState::Complete => {
                return Err(ResponseError::OutOfOrder("write_headers"))
            }
        };

        let size = headers
            .iter()
            .map(|(name, value)| name.len() + value.len() + 4)
            .sum::<usize>();
        self.ensure_room(size + CRLF.len())?;

        for (name, value) in headers.iter() {
            self.buffer.extend_from_slice(name.as_bytes());
            self.buffer.extend_from_slice(b": ");
            self.buffer.extend_from_slice(value.as_bytes());
            self.buffer.extend_from_slice(CRLF);
        }
        self.buffer.extend_from_slice(CRLF);

        self.state = next;
        Ok(())
    }

    /// Appends raw body bytes and returns how many were written.
    pub fn write_body(&mut self, data: &[u8]) -> Result<usize, ResponseError> {
        self.expect_state(ResponseState::Body, "write_body")?;
        self.ensure_room(data.len())?;

        self.buffer.extend_from_slice(data);
        Ok(data.len())
    }

    /// Frames `data` as one chunk: `hex(len) CRLF data CRLF`.
    ///
    /// Returns the payload length. Empty input writes nothing, since a
    /// zero-length chunk would end the body.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<usize, ResponseError> {
        self.expect_state(ResponseState::Body, "write_chunk")?;
        if data.is_empty() {
            return Ok(0);
        }

        let prefix = format!("{:x}\r\n", data.len());
        self.ensure_room(prefix.len() + data.len() + CRLF.len())?;

        self.buffer.extend_from_slice(prefix.as_bytes());
        self.buffer.extend_from_slice(data);
        self.buffer.extend_from_slice(CRLF);
        Ok(data.len())
    }

    /// Writes the zero-length chunk `0\r\n` that ends a chunked body.
    ///
    /// Must be followed by [`write_trailers`](Response::write_trailers),
    /// possibly with an empty block, to terminate the message.
    #[inline]
    pub fn write_last_chunk(&mut self) -> Result<(), ResponseError> {
        self.write_body(b"0\r\n").map(|_| ())
    }

    /// Writes the trailer section; same wire format as
    /// [`write_headers`](Response::write_headers).
    ///
    /// The blank line closing the trailer block is the end of the message.
    /// Nothing else follows it: an extra `\r\n` here would be read by the
    /// client as the start of a next response.
    #[inline]
    pub fn write_trailers(&mut self, trailers: &Headers) -> Result<(), ResponseError> {
        self.expect_state(ResponseState::Body, "write_trailers")?;
        self.write_headers(trailers)
    }
}

/// Canonical header set for a fixed-length plain-text response.
///
/// ```text
/// connection: close
/// content-length: <content_len>
/// content-type: text/plain
/// ```
pub fn default_headers(content_len: usize) -> Headers {
    let mut headers = Headers::new();
    headers.set("Content-Length", &content_len.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}
