use crate::{
    http::{request::Request, response::Response},
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits},
    server::{
        connection::{AllLimits, HttpConnection},
        router::Router,
    },
};
use std::{
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{net::TcpListener, sync::Notify};

/// A request handler registered on the [`Router`].
///
/// The handler writes the whole response through [`Response`]; the
/// connection sends it once `handle` returns and then closes. Leaving the
/// response empty makes the server answer `500 Internal Server Error`.
///
/// Any `Fn(&mut Response, &Request)` closure or function is a handler.
///
/// # Examples
///
/// Plain function
/// ```
/// use scratch_http::{default_headers, Request, Response, StatusCode};
///
/// fn hello(resp: &mut Response, _: &Request) {
///     let body = b"Hello World!";
///     let _ = resp
///         .write_status_line(StatusCode::Ok)
///         .and_then(|_| resp.write_headers(&default_headers(body.len())))
///         .and_then(|_| resp.write_body(body));
/// }
/// ```
/// Handler with shared state
/// ```
/// use scratch_http::{default_headers, Handler, Request, Response, StatusCode};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter {
///     hits: AtomicUsize,
/// }
///
/// impl Handler for Counter {
///     fn handle(&self, resp: &mut Response, _: &Request) {
///         let body = format!("Request #{}", self.hits.fetch_add(1, Ordering::Relaxed) + 1);
///         let _ = resp
///             .write_status_line(StatusCode::Ok)
///             .and_then(|_| resp.write_headers(&default_headers(body.len())))
///             .and_then(|_| resp.write_body(body.as_bytes()));
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Writes the response for `request` into `response`.
    fn handle(&self, response: &mut Response, request: &Request);
}

impl<F> Handler for F
where
    F: Fn(&mut Response, &Request) + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, response: &mut Response, request: &Request) {
        self(response, request)
    }
}

/// Stops a running [`Server`] from accepting connections.
///
/// Cloning is cheap; every clone controls the same server. Connections that
/// were already accepted run to completion.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Marks the server closed and wakes its accept loop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// An HTTP server that answers one request per TCP connection.
///
/// Every accepted connection runs in its own task. The tasks share only the
/// immutable [`Router`].
///
/// # Examples
///
/// ```no_run
/// use scratch_http::{Request, Response, Router, Server};
/// use tokio::net::TcpListener;
///
/// fn hello(_: &mut Response, _: &Request) {}
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::builder();
///     router.get("/*", hello)?;
///
///     let server = Server::builder()
///         .listener(TcpListener::bind("127.0.0.1:42069").await?)
///         .router(router.build())
///         .build();
///
///     let shutdown = server.shutdown_handle();
///     tokio::spawn(async move {
///         let _ = tokio::signal::ctrl_c().await;
///         shutdown.close();
///     });
///
///     server.launch().await;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    connection: Arc<HttpConnection>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            router: None,

            server_limits: None,
            connection_limits: None,
            request_limits: None,
            response_limits: None,
        }
    }

    /// Returns the address the listener is bound to.
    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a handle that stops [`launch`](Server::launch).
    #[inline]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accepts connections until the [`ShutdownHandle`] is closed.
    ///
    /// Accept errors are logged and skipped. The listener is dropped when
    /// this returns.
    pub async fn launch(self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "server listening");
        }

        while !self.shutdown.is_closed() {
            let (mut stream, peer) = tokio::select! {
                _ = self.shutdown.notify.notified() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::warn!(%err, "failed to accept connection");
                        continue;
                    }
                },
            };

            let connection = self.connection.clone();
            tokio::spawn(async move {
                if let Err(err) = connection.run(&mut stream).await {
                    tracing::debug!(%peer, %err, "connection closed with error");
                }
            });
        }

        tracing::info!("server stopped");
    }
}

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    router: Option<Router>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
}

impl ServerBuilder {
    /// Sets the TCP listener that the server will use to accept connections.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the route table.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Error messages:
    /// - ``The `listener` method must be called to create``
    /// - ``The `router` method must be called to create``
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let (listener, router, limits) = self.get_all_parts();
        tracing::debug!(routes = ?router, "route table");

        Server {
            listener,
            connection: Arc::new(HttpConnection::new(Arc::new(router), limits)),
            shutdown: ShutdownHandle::default(),
        }
    }

    #[inline]
    #[track_caller]
    fn get_all_parts(self) -> (TcpListener, Router, AllLimits) {
        (
            self.listener
                .expect("The `listener` method must be called to create"),
            self.router
                .expect("The `router` method must be called to create"),
            (
                self.server_limits.unwrap_or_default(),
                self.connection_limits.unwrap_or_default(),
                self.request_limits.unwrap_or_default(),
                self.response_limits.unwrap_or_default(),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{default_headers, Method, StatusCode};
    use std::time::Duration;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        time::timeout,
    };

    fn hello(resp: &mut Response, req: &Request) {
        let body = format!("hello from {}", req.path());
        resp.write_status_line(StatusCode::Ok).unwrap();
        resp.write_headers(&default_headers(body.len())).unwrap();
        resp.write_body(body.as_bytes()).unwrap();
    }

    async fn server() -> Server {
        let mut router = Router::builder();
        router.get("/*", hello).unwrap();
        router.add(Method::Put, "/upload", hello).unwrap();

        Server::builder()
            .listener(TcpListener::bind("127.0.0.1:0").await.unwrap())
            .router(router.build())
            .build()
    }

    async fn send(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut output = String::new();
        stream.read_to_string(&mut output).await.unwrap();
        output
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let server = server().await;
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.launch());

        let output = send(addr, "GET /coffee?x=1 HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(output.ends_with("\r\n\r\nhello from /coffee"));

        let output = send(addr, "POST /upload HTTP/1.1\r\n\r\n").await;
        assert!(output.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(output.contains("allow: OPTIONS, PUT\r\n"));

        let output = send(addr, "GET / HTTP/1.1\r\nBad Header\r\n\r\n").await;
        assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        // Concurrent connections are served independently
        let slow = TcpStream::connect(addr).await.unwrap();
        let output = send(addr, "GET /fast HTTP/1.1\r\n\r\n").await;
        assert!(output.ends_with("hello from /fast"));
        drop(slow);

        shutdown.close();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn close_before_launch() {
        let server = server().await;
        let shutdown = server.shutdown_handle();

        shutdown.close();
        assert!(shutdown.is_closed());
        timeout(Duration::from_secs(5), server.launch()).await.unwrap();
    }

    #[tokio::test]
    #[should_panic(expected = "The `router` method must be called to create")]
    async fn build_without_router() {
        let _ = Server::builder()
            .listener(TcpListener::bind("127.0.0.1:0").await.unwrap())
            .build();
    }
}
