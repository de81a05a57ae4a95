use crate::{
    errors::{ErrorKind, ResponseError, RouteError},
    http::{
        request::Request,
        response::{default_headers, Response},
        types::StatusCode,
    },
    limits::{ConnLimits, ReqLimits, RespLimits},
    server::router::Router,
    Method,
};
use std::{io, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

/// Serves exactly one request per connection.
pub(crate) struct HttpConnection {
    router: Arc<Router>,
    json_errors: bool,

    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(router: Arc<Router>, limits: AllLimits) -> Self {
        let (server_limits, conn_limits, req_limits, resp_limits) = limits;

        Self {
            router,
            json_errors: server_limits.json_errors,

            conn_limits,
            req_limits,
            resp_limits,
        }
    }

    /// Reads one request, answers it and shuts the write side down.
    ///
    /// Parse failures are answered with a canned error response. Transport
    /// failures and timeouts end the connection without a response and are
    /// returned to the caller.
    pub(crate) async fn run<S>(&self, stream: &mut S) -> Result<(), io::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let read = Request::read_from(stream, &self.req_limits);
        let request = match timeout(self.conn_limits.socket_read_timeout, read).await {
            Ok(Ok(request)) => request,
            Ok(Err(err)) => return self.send_error(stream, err).await,
            Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout")),
        };

        let response = self.dispatch(&request);
        self.write_bytes(stream, response.as_bytes()).await
    }

    async fn send_error<S>(&self, stream: &mut S, error: ErrorKind) -> Result<(), io::Error>
    where
        S: AsyncWrite + Unpin,
    {
        match (error.as_http(self.json_errors), error) {
            (Some(response), error) => {
                tracing::debug!(%error, "rejecting request");
                self.write_bytes(stream, response).await
            }
            (None, ErrorKind::Io(err)) => Err(err.0),
            (None, error) => {
                tracing::debug!(%error, "closing connection");
                Ok(())
            }
        }
    }

    #[inline]
    async fn write_bytes<S>(&self, stream: &mut S, response: &[u8]) -> Result<(), io::Error>
    where
        S: AsyncWrite + Unpin,
    {
        let write = async {
            stream.write_all(response).await?;
            stream.shutdown().await
        };

        timeout(self.conn_limits.socket_write_timeout, write).await?
    }

    /// Routes the request and returns the serialized response.
    pub(crate) fn dispatch(&self, request: &Request) -> Response {
        let mut response = Response::with_limits(&self.resp_limits);

        let result = match self.router.find(request.method(), request.path()) {
            Ok(handler) => {
                handler.handle(&mut response, request);
                Ok(())
            }
            Err(RouteError::NotFound) => write_status(&mut response, StatusCode::NotFound, &[]),
            // A path prefix with no methods of its own
            Err(RouteError::MethodNotAllowed { allowed }) if allowed.is_empty() => {
                write_status(&mut response, StatusCode::NotFound, &[])
            }
            Err(RouteError::MethodNotAllowed { allowed }) => {
                write_status(&mut response, StatusCode::MethodNotAllowed, &allowed)
            }
        };

        if let Err(err) = result {
            tracing::error!(%err, "failed to write fallback response");
        }

        if response.is_empty() || response.is_overflowed() {
            tracing::warn!(
                method = %request.method(),
                path = request.path(),
                overflowed = response.is_overflowed(),
                "handler wrote no complete response"
            );

            response = Response::with_limits(&self.resp_limits);
            if let Err(err) = write_status(&mut response, StatusCode::InternalServerError, &[]) {
                tracing::error!(%err, "failed to write fallback response");
            }
        }

        tracing::debug!(
            method = %request.method(),
            target = request.target(),
            bytes = response.as_bytes().len(),
            "request handled"
        );

        response
    }
}

/// Writes a bodiless response with the default headers, plus `Allow` when
/// `allow` is not empty.
fn write_status(
    response: &mut Response,
    status: StatusCode,
    allow: &[Method],
) -> Result<(), ResponseError> {
    let mut headers = default_headers(0);
    if !allow.is_empty() {
        let methods: Vec<&str> = allow.iter().map(Method::as_str).collect();
        headers.set("Allow", &methods.join(", "));
    }

    response.write_status_line(status)?;
    response.write_headers(&headers)
}

pub(crate) type AllLimits = (
    crate::limits::ServerLimits,
    ConnLimits,
    ReqLimits,
    RespLimits,
);
