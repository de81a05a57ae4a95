use scratch_http::{
    default_headers, Handler, Method, Request, Response, ResponseError, Router, Server, StatusCode,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reports what the parser saw, numbering requests across all methods.
#[derive(Clone, Default)]
struct Inspector {
    seen: Arc<AtomicUsize>,
}

impl Inspector {
    fn describe(&self, req: &Request) -> String {
        let headers: serde_json::Map<String, serde_json::Value> = req
            .headers()
            .iter()
            .map(|(name, value)| (name.to_owned(), value.into()))
            .collect();

        serde_json::json!({
            "request": self.seen.fetch_add(1, Ordering::Relaxed) + 1,
            "method": req.method().as_str(),
            "path": req.path(),
            "query": req.query(),
            "version": req.version(),
            "headers": headers,
            "body": String::from_utf8_lossy(req.body()),
        })
        .to_string()
    }

    fn respond(&self, resp: &mut Response, req: &Request) -> Result<(), ResponseError> {
        let body = self.describe(req);
        let mut headers = default_headers(body.len());
        headers.replace("Content-Type", "application/json");

        resp.write_status_line(StatusCode::Ok)?;
        resp.write_headers(&headers)?;
        resp.write_body(body.as_bytes()).map(|_| ())
    }
}

impl Handler for Inspector {
    fn handle(&self, resp: &mut Response, req: &Request) {
        if let Err(err) = self.respond(resp, req) {
            tracing::error!(%err, "failed to describe request");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scratch_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let inspector = Inspector::default();
    let mut router = Router::builder();
    for method in [Method::Get, Method::Post, Method::Put, Method::Delete, Method::Patch] {
        router.add(method, "/*", inspector.clone())?;
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_emits_valid_json() {
        let mut req = Request::new();
        req.parse(
            "POST /caf\u{e9}?q=\"x\" HTTP/1.1\r\nX-Note: h\u{e9}\u{7f}llo\r\nContent-Length: 4\r\n\r\n\u{1}\"\n\\"
                .as_bytes(),
        )
        .unwrap();
        assert!(req.is_done());

        let inspector = Inspector::default();
        inspector.describe(&req);
        let value: serde_json::Value = serde_json::from_str(&inspector.describe(&req)).unwrap();

        assert_eq!(value["request"], 2);
        assert_eq!(value["method"], "POST");
        assert_eq!(value["path"], "/caf\u{e9}");
        assert_eq!(value["query"], "q=\"x\"");
        assert_eq!(value["headers"]["x-note"], "h\u{e9}\u{7f}llo");
        assert_eq!(value["body"], "\u{1}\"\n\\");
    }
}
