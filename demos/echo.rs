use scratch_http::{
    default_headers, Request, Response, ResponseError, Router, Server, StatusCode,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn echo(resp: &mut Response, req: &Request) -> Result<(), ResponseError> {
    let mut result = serde_json::json!({ "url": req.path() });
    if !req.body().is_empty() {
        result["body"] = String::from_utf8_lossy(req.body()).into();
    }
    let result = result.to_string();

    let mut headers = default_headers(result.len());
    headers.replace("Content-Type", "application/json");

    resp.write_status_line(StatusCode::Ok)?;
    resp.write_headers(&headers)?;
    resp.write_body(result.as_bytes()).map(|_| ())
}

fn echo_handler(resp: &mut Response, req: &Request) {
    if let Err(err) = echo(resp, req) {
        tracing::error!(%err, "failed to write echo");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scratch_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut router = Router::builder();
    router.get("/*", echo_handler)?.post("/*", echo_handler)?;

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
