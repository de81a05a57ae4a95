//! Streams a generated body with chunked framing and closes it with
//! `X-Content-SHA256` and `X-Content-Length` trailers.
//!
//! ```text
//! curl --raw -i http://127.0.0.1:8080/stream/20
//! ```

use scratch_http::{
    default_headers, Headers, Request, Response, ResponseError, Router, Server, StatusCode,
};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CHUNK_SIZE: usize = 1024;
const MAX_LINES: usize = 100;

fn generate(lines: usize) -> Vec<u8> {
    let mut body = String::new();
    for id in 0..lines {
        let _ = writeln!(body, r#"{{"id": {id}, "message": "line {id} of {lines}"}}"#);
    }
    body.into_bytes()
}

fn stream(resp: &mut Response, body: &[u8]) -> Result<(), ResponseError> {
    let mut headers = default_headers(0);
    headers.delete("Content-Length");
    headers.set("Transfer-Encoding", "chunked");
    headers.replace("Content-Type", "application/x-ndjson");
    headers.set("Trailer", "X-Content-SHA256, X-Content-Length");

    resp.write_status_line(StatusCode::Ok)?;
    resp.write_headers(&headers)?;

    let mut hasher = Sha256::new();
    for chunk in body.chunks(CHUNK_SIZE) {
        hasher.update(chunk);
        resp.write_chunk(chunk)?;
    }
    resp.write_last_chunk()?;

    let digest = hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        });

    let mut trailers = Headers::new();
    trailers.set("X-Content-SHA256", &digest);
    trailers.set("X-Content-Length", &body.len().to_string());
    resp.write_trailers(&trailers)
}

fn bad_request(resp: &mut Response) -> Result<(), ResponseError> {
    let body = format!("expected /stream/<lines> with at most {MAX_LINES} lines");

    resp.write_status_line(StatusCode::BadRequest)?;
    resp.write_headers(&default_headers(body.len()))?;
    resp.write_body(body.as_bytes()).map(|_| ())
}

fn stream_handler(resp: &mut Response, req: &Request) {
    let lines = req
        .path()
        .strip_prefix("/stream/")
        .and_then(|count| count.parse::<usize>().ok())
        .filter(|&count| count <= MAX_LINES);

    let result = match lines {
        Some(lines) => stream(resp, &generate(lines)),
        None => bad_request(resp),
    };

    if let Err(err) = result {
        tracing::error!(%err, path = req.path(), "failed to stream response");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scratch_http=debug,chunked_trailers=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut router = Router::builder();
    router.get("/stream/*", stream_handler)?;

    let server = Server::builder()
        .listener(TcpListener::bind("127.0.0.1:8080").await?)
        .router(router.build())
        .build();

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown.close();
    });

    server.launch().await;
    Ok(())
}
