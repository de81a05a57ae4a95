use crate::{
    errors::ErrorKind,
    http::headers::{Headers, CRLF},
    limits::ReqLimits,
    Method,
};
use memchr::memmem;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Progress of the incremental parser.
///
/// States only move forward: `Init -> Headers -> [Body] -> Done`. Any
/// failure moves to `Error`, which absorbs all further input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Waiting for a complete request line.
    Init,
    /// Consuming header lines until the empty line.
    Headers,
    /// Collecting exactly `content-length` body bytes.
    Body,
    Done,
    Error,
}

/// An HTTP/1.1 request assembled from a byte stream.
///
/// # Input data requirements
///
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: exactly `"\r\n"`; a bare `LF` is never a line terminator
///
/// ## First line
///
/// ```text
/// [METHOD] SP [TARGET] SP "HTTP/1.1" CRLF
/// ```
///
/// - `[METHOD]`: any token, see [`Method`]
/// - `[TARGET]`: must start with `/`, may carry a `?query`
///
/// Exactly three space separated parts are accepted. Any other version
/// than `HTTP/1.1` is rejected with [`ErrorKind::UnsupportedVersion`].
///
/// ## Headers
///
/// ```text
/// [NAME] ":" [VALUE] CRLF
/// ...
/// CRLF
/// ```
///
/// See [`Headers::parse`] for the exact rules.
///
/// ## Body
///
/// Only `Content-Length` framing is supported. A missing, zero, negative or
/// unparsable length means there is no body. Bytes past the body are
/// ignored, since the connection closes after one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    target: String,
    version: String,

    headers: Headers,
    content_length: usize,
    body: Vec<u8>,

    state: ParserState,
    head_len: usize,
    max_body_size: usize,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Creates an empty request in the [`Init`](ParserState::Init) state
    /// with no body limit.
    #[inline]
    pub fn new() -> Self {
        Request {
            method: Method::Get,
            target: String::new(),
            version: String::new(),

            headers: Headers::new(),
            content_length: 0,
            body: Vec::new(),

            state: ParserState::Init,
            head_len: 0,
            max_body_size: usize::MAX,
        }
    }

    /// Creates an empty request that rejects bodies above
    /// [`ReqLimits::max_body_size`].
    #[inline]
    pub fn with_limits(limits: &ReqLimits) -> Self {
        Request {
            max_body_size: limits.max_body_size,
            ..Self::new()
        }
    }
}

// Public API
impl Request {
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as received, query included.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target without its query string.
    #[inline]
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The raw query string, without the leading `?`.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// The version number, `"1.1"` once the request line has been parsed.
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// `true` once the request is complete or has failed.
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self.state, ParserState::Done | ParserState::Error)
    }
}

// Parsing
impl Request {
    /// Feeds `data` to the parser and returns how many bytes were consumed.
    ///
    /// Consumes as many complete elements (request line, header lines, body
    /// bytes) as `data` holds. Incomplete trailing input is not consumed and
    /// must be presented again, extended, on the next call. A completed
    /// request consumes nothing.
    ///
    /// # Errors
    ///
    /// Any parse failure moves the request to [`ParserState::Error`]; every
    /// later call returns [`ErrorKind::RequestInErrorState`].
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ErrorKind> {
        let mut read = 0;

        loop {
            let current = &data[read..];

            let step = match self.state {
                ParserState::Error => return Err(ErrorKind::RequestInErrorState),
                ParserState::Done => break,
                _ if current.is_empty() => break,
                ParserState::Init => self.parse_request_line(current),
                ParserState::Headers => self.parse_headers(current),
                ParserState::Body => Ok(self.parse_body(current)),
            };

            match step {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(err) => {
                    self.state = ParserState::Error;
                    return Err(err);
                }
            }
        }

        Ok(read)
    }

    fn parse_request_line(&mut self, data: &[u8]) -> Result<usize, ErrorKind> {
        let Some(end) = memmem::find(data, CRLF) else {
            return Ok(0);
        };

        let line = simdutf8::basic::from_utf8(&data[..end])
            .map_err(|_| ErrorKind::MalformedRequestLine)?;

        let mut parts = line.split(' ');
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ErrorKind::MalformedRequestLine);
        };

        let version = match version.split_once('/') {
            Some(("HTTP", "1.1")) => "1.1",
            Some(("HTTP", _)) => return Err(ErrorKind::UnsupportedVersion),
            _ => return Err(ErrorKind::MalformedRequestLine),
        };

        self.method =
            Method::from_bytes(method.as_bytes()).ok_or(ErrorKind::MalformedRequestLine)?;

        if !target.starts_with('/') {
            return Err(ErrorKind::MalformedRequestLine);
        }

        self.target = target.to_owned();
        self.version = version.to_owned();
        self.state = ParserState::Headers;

        let read = end + CRLF.len();
        self.head_len += read;
        Ok(read)
    }

    fn parse_headers(&mut self, data: &[u8]) -> Result<usize, ErrorKind> {
        let (read, done) = self.headers.parse(data)?;
        self.head_len += read;

        if done {
            let length = self.headers.get_int_or_default("content-length", 0);
            let length = usize::try_from(length).unwrap_or(0);

            if length > self.max_body_size {
                return Err(ErrorKind::BodyTooLarge);
            }

            self.content_length = length;
            self.state = match length {
                0 => ParserState::Done,
                _ => ParserState::Body,
            };
        }

        Ok(read)
    }

    fn parse_body(&mut self, data: &[u8]) -> usize {
        let take = (self.content_length - self.body.len()).min(data.len());
        self.body.extend_from_slice(&data[..take]);

        if self.body.len() == self.content_length {
            self.state = ParserState::Done;
        }

        take
    }
}

// Reading
impl Request {
    /// Reads and parses one request from `reader`.
    ///
    /// Bytes are read into a working buffer that starts at
    /// [`ReqLimits::initial_buffer_size`] and doubles on demand up to
    /// [`ReqLimits::max_head_size`]. After each read the parser consumes what
    /// it can and the rest is shifted to the front of the buffer, so any
    /// fragmentation of the stream yields the same request.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::HeadersTooLarge`]: the request line and headers need
    ///   more than `max_head_size` bytes
    /// - [`ErrorKind::BodyTooLarge`]: `content-length` above `max_body_size`
    /// - [`ErrorKind::UnexpectedEof`]: the stream ended before the request did
    /// - [`ErrorKind::Io`]: the underlying read failed
    /// - any parse error, see [`Request::parse`]
    pub async fn read_from<R>(reader: &mut R, limits: &ReqLimits) -> Result<Request, ErrorKind>
    where
        R: AsyncRead + Unpin,
    {
        let mut request = Request::with_limits(limits);
        let mut buffer = RequestBuffer::new(limits);

        while !request.is_done() {
            if !buffer.reserve() {
                return Err(ErrorKind::HeadersTooLarge);
            }

            if buffer.fill(reader).await? == 0 {
                return Err(ErrorKind::UnexpectedEof);
            }

            let consumed = request.parse(buffer.filled())?;
            buffer.consume(consumed);

            // Leftover bytes are a partial head line only while in the head
            let pending = if request.in_head() { buffer.len } else { 0 };
            if request.head_len + pending > limits.max_head_size {
                return Err(ErrorKind::HeadersTooLarge);
            }
        }

        Ok(request)
    }

    #[inline]
    fn in_head(&self) -> bool {
        matches!(self.state, ParserState::Init | ParserState::Headers)
    }
}

/// Growable read buffer bounded by the head size limit.
struct RequestBuffer {
    len: usize,
    max: usize,
    data: Vec<u8>,
}

impl RequestBuffer {
    #[inline]
    fn new(limits: &ReqLimits) -> Self {
        let max = limits.max_head_size.max(1);
        let initial = limits.initial_buffer_size.clamp(1, max);

        RequestBuffer {
            len: 0,
            max,
            data: vec![0; initial],
        }
    }

    /// Makes room for at least one more byte. Returns `false` at the limit.
    fn reserve(&mut self) -> bool {
        if self.len < self.data.len() {
            return true;
        }
        if self.data.len() >= self.max {
            return false;
        }

        let grown = self.data.len().saturating_mul(2).min(self.max);
        self.data.resize(grown, 0);
        true
    }

    #[inline]
    async fn fill<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<usize, ErrorKind> {
        let n = reader.read(&mut self.data[self.len..]).await?;
        self.len += n;
        Ok(n)
    }

    #[inline]
    fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    fn consume(&mut self, n: usize) {
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io,
        pin::Pin,
        task::{Context, Poll},
    };
    use tokio::io::ReadBuf;

    /// Hands out at most `step` bytes per read.
    struct ChunkReader {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl ChunkReader {
        fn new(data: impl AsRef<[u8]>, step: usize) -> Self {
            ChunkReader {
                data: data.as_ref().to_vec(),
                pos: 0,
                step,
            }
        }
    }

    impl AsyncRead for ChunkReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let n = self.step.min(self.data.len() - self.pos).min(buf.remaining());
            let start = self.pos;
            buf.put_slice(&self.data[start..start + n]);
            self.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    /// Fails every read.
    struct BrokenReader;

    impl AsyncRead for BrokenReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            _: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
        }
    }

    fn parse_all(data: &str) -> (Result<usize, ErrorKind>, Request) {
        let mut request = Request::new();
        let result = request.parse(data.as_bytes());
        (result, request)
    }

    #[test]
    fn request_line() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n",                  Method::Get,     "/"),
            ("POST /coffee HTTP/1.1\r\n",           Method::Post,    "/coffee"),
            ("OPTIONS /a/b?x=1 HTTP/1.1\r\n",       Method::Options, "/a/b?x=1"),
            ("PURGE /cache HTTP/1.1\r\n",           Method::Extension("PURGE".into()), "/cache"),
        ];

        for (data, method, target) in cases {
            let (result, request) = parse_all(data);

            assert_eq!(result, Ok(data.len()), "{data:?}");
            assert_eq!(request.method(), &method);
            assert_eq!(request.target(), target);
            assert_eq!(request.version(), "1.1");
            assert_eq!(request.state(), ParserState::Headers);
        }
    }

    #[test]
    fn request_line_invalid() {
        #[rustfmt::skip]
        let cases = [
            ("/coffee HTTP/1.1\r\n",                ErrorKind::MalformedRequestLine),
            ("GET  /coffee HTTP/1.1\r\n",           ErrorKind::MalformedRequestLine),
            ("GET /coffee HTTP/1.1 extra\r\n",      ErrorKind::MalformedRequestLine),
            ("GET coffee HTTP/1.1\r\n",             ErrorKind::MalformedRequestLine),
            ("G(E)T / HTTP/1.1\r\n",                ErrorKind::MalformedRequestLine),
            ("GET / HTTPS/1.1\r\n",                 ErrorKind::MalformedRequestLine),
            ("GET / 1.1\r\n",                       ErrorKind::MalformedRequestLine),
            ("GET / HTTP/1.0\r\n",                  ErrorKind::UnsupportedVersion),
            ("GET / HTTP/2\r\n",                    ErrorKind::UnsupportedVersion),
        ];

        for (data, expected) in cases {
            let (result, request) = parse_all(data);

            assert_eq!(result, Err(expected), "{data:?}");
            assert_eq!(request.state(), ParserState::Error);
        }
    }

    #[test]
    fn incomplete_consumes_nothing() {
        #[rustfmt::skip]
        let cases = [
            ("",                                     0, ParserState::Init),
            ("GET / HTTP/1.1",                       0, ParserState::Init),
            ("GET / HTTP/1.1\r",                     0, ParserState::Init),
            ("GET / HTTP/1.1\r\nHost: a",           16, ParserState::Headers),
            ("GET / HTTP/1.1\r\nHost: a\r\n",       25, ParserState::Headers),
        ];

        for (data, consumed, state) in cases {
            let (result, request) = parse_all(data);

            assert_eq!(result, Ok(consumed), "{data:?}");
            assert_eq!(request.state(), state, "{data:?}");
        }
    }

    #[test]
    fn headers_and_body() {
        let data = "POST /submit HTTP/1.1\r\nHost: localhost:42069\r\n\
                    Content-Length: 13\r\n\r\nhello world!\n";
        let (result, request) = parse_all(data);

        assert_eq!(result, Ok(data.len()));
        assert_eq!(request.state(), ParserState::Done);
        assert_eq!(request.headers().get("host"), Some("localhost:42069"));
        assert_eq!(request.body(), b"hello world!\n");
    }

    #[test]
    fn body_never_exceeds_content_length() {
        let data = "POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloEXTRA";
        let (result, request) = parse_all(data);

        assert_eq!(result, Ok(data.len() - "EXTRA".len()));
        assert_eq!(request.body(), b"hello");
    }

    #[test]
    fn body_is_partial_until_complete() {
        let mut request = Request::new();
        let head = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n";

        assert_eq!(request.parse(head), Ok(head.len()));
        assert_eq!(request.state(), ParserState::Body);

        assert_eq!(request.parse(b"hello"), Ok(5));
        assert_eq!(request.state(), ParserState::Body);

        assert_eq!(request.parse(b"world!!"), Ok(5));
        assert_eq!(request.state(), ParserState::Done);
        assert_eq!(request.body(), b"helloworld");
    }

    #[test]
    fn no_body_without_positive_length() {
        #[rustfmt::skip]
        let cases = [
            "GET / HTTP/1.1\r\n\r\n",
            "GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n",
            "GET / HTTP/1.1\r\nContent-Length: -4\r\n\r\n",
            "GET / HTTP/1.1\r\nContent-Length: many\r\n\r\n",
        ];

        for data in cases {
            let (result, request) = parse_all(data);

            assert_eq!(result, Ok(data.len()), "{data:?}");
            assert_eq!(request.state(), ParserState::Done);
            assert!(request.body().is_empty());
        }
    }

    #[test]
    fn done_and_error_are_terminal() {
        let (_, mut request) = parse_all("GET / HTTP/1.1\r\n\r\n");
        assert_eq!(request.parse(b"GET /again HTTP/1.1\r\n\r\n"), Ok(0));
        assert_eq!(request.target(), "/");

        let (_, mut request) = parse_all("GET / HTTP/1.0\r\n");
        assert_eq!(
            request.parse(b"GET / HTTP/1.1\r\n\r\n"),
            Err(ErrorKind::RequestInErrorState)
        );
        assert_eq!(request.parse(b""), Err(ErrorKind::RequestInErrorState));
    }

    #[test]
    fn header_error_moves_to_error_state() {
        let (result, request) = parse_all("GET / HTTP/1.1\r\nHost : localhost\r\n\r\n");

        assert_eq!(result, Err(ErrorKind::MalformedFieldName));
        assert_eq!(request.state(), ParserState::Error);
    }

    #[test]
    fn path_and_query() {
        #[rustfmt::skip]
        let cases = [
            ("/",                 "/",           None),
            ("/video?id=7",       "/video",      Some("id=7")),
            ("/a/b?",             "/a/b",        Some("")),
            ("/a?x=1?y=2",        "/a",          Some("x=1?y=2")),
        ];

        for (target, path, query) in cases {
            let (_, request) = parse_all(&format!("GET {target} HTTP/1.1\r\n\r\n"));

            assert_eq!(request.path(), path);
            assert_eq!(request.query(), query);
        }
    }

    #[test]
    fn body_limit() {
        let limits = ReqLimits {
            max_body_size: 4,
            ..ReqLimits::default()
        };

        let mut request = Request::with_limits(&limits);
        let data = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        assert_eq!(request.parse(data), Err(ErrorKind::BodyTooLarge));

        let mut request = Request::with_limits(&limits);
        let data = b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nhell";
        assert_eq!(request.parse(data), Ok(data.len()));
    }

    const FULL: &str = "POST /coffee?sugar=2 HTTP/1.1\r\nHost: localhost:42069\r\n\
                        User-Agent: curl/7.81.0\r\nAccept: */*\r\nAccept: text/plain\r\n\
                        Content-Length: 22\r\n\r\n{\"type\": \"dark mode\"}\n";

    #[tokio::test]
    async fn read_fragmented() {
        let expected = Request::read_from(&mut FULL.as_bytes(), &ReqLimits::default())
            .await
            .unwrap();

        assert_eq!(expected.state(), ParserState::Done);
        assert_eq!(expected.path(), "/coffee");
        assert_eq!(expected.headers().get("accept"), Some("*/*,text/plain"));
        assert_eq!(expected.body(), b"{\"type\": \"dark mode\"}\n");

        for step in [1, 2, 3, 5, 7, 16, 64, FULL.len()] {
            let mut reader = ChunkReader::new(FULL, step);
            let request = Request::read_from(&mut reader, &ReqLimits::default()).await;

            assert_eq!(request.as_ref(), Ok(&expected), "step {step}");
        }
    }

    #[tokio::test]
    async fn read_grows_small_buffer() {
        let limits = ReqLimits {
            initial_buffer_size: 4,
            ..ReqLimits::default()
        };

        let mut reader = ChunkReader::new(FULL, 3);
        let request = Request::read_from(&mut reader, &limits).await.unwrap();

        assert_eq!(request.headers().get("user-agent"), Some("curl/7.81.0"));
        assert_eq!(request.body().len(), 22);
    }

    #[tokio::test]
    async fn read_head_limit() {
        let limits = ReqLimits {
            initial_buffer_size: 8,
            max_head_size: 64,
            ..ReqLimits::default()
        };

        let long_line = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(100));
        let many_lines = format!("GET / HTTP/1.1\r\n{}\r\n", "X-A: b\r\n".repeat(10));
        let fits = format!("GET / HTTP/1.1\r\n{}\r\n", "X-A: b\r\n".repeat(5));

        for data in [&long_line, &many_lines] {
            for step in [1, 7, data.len()] {
                let mut reader = ChunkReader::new(data, step);
                let result = Request::read_from(&mut reader, &limits).await;

                assert_eq!(result, Err(ErrorKind::HeadersTooLarge), "{data:?} / {step}");
            }
        }

        let mut reader = ChunkReader::new(&fits, 5);
        let request = Request::read_from(&mut reader, &limits).await.unwrap();
        assert_eq!(request.headers().get("x-a"), Some("b,b,b,b,b"));
    }

    #[tokio::test]
    async fn read_body_past_head_limit() {
        let limits = ReqLimits {
            initial_buffer_size: 16,
            max_head_size: 64,
            ..ReqLimits::default()
        };

        let body = "z".repeat(1000);
        let data = format!("PUT /f HTTP/1.1\r\nContent-Length: 1000\r\n\r\n{body}");

        let mut reader = ChunkReader::new(&data, 100);
        let request = Request::read_from(&mut reader, &limits).await.unwrap();
        assert_eq!(request.body(), body.as_bytes());
    }

    #[tokio::test]
    async fn read_errors() {
        #[rustfmt::skip]
        let cases = [
            ("",                                              ErrorKind::UnexpectedEof),
            ("GET / HTTP/1.1\r\nHost: a\r\n",                 ErrorKind::UnexpectedEof),
            ("POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\nabc", ErrorKind::UnexpectedEof),
            ("GET / HTTP/1.0\r\n\r\n",                        ErrorKind::UnsupportedVersion),
            ("GET / HTTP/1.1\r\nBad Name: x\r\n\r\n",         ErrorKind::MalformedFieldName),
        ];

        for (data, expected) in cases {
            let mut reader = ChunkReader::new(data, 4);
            let result = Request::read_from(&mut reader, &ReqLimits::default()).await;

            assert_eq!(result, Err(expected), "{data:?}");
        }

        let result = Request::read_from(&mut BrokenReader, &ReqLimits::default()).await;
        assert_eq!(
            result,
            Err(ErrorKind::from(io::Error::from(io::ErrorKind::ConnectionReset)))
        );
    }
}
