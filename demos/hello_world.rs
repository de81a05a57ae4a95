use scratch_http::{
    default_headers, Request, Response, ResponseError, Router, Server, StatusCode,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const OK: &str = "<html>
  <head><title>200 OK</title></head>
  <body><h1>Success!</h1><p>Your request was an absolute banger.</p></body>
</html>";

const BAD_REQUEST: &str = "<html>
  <head><title>400 Bad Request</title></head>
  <body><h1>Bad Request</h1><p>Your request honestly kinda sucked.</p></body>
</html>";

const INTERNAL_ERROR: &str = "<html>
  <head><title>500 Internal Server Error</title></head>
  <body><h1>Internal Server Error</h1><p>Okay, you know what? This one is on me.</p></body>
</html>";

fn html(resp: &mut Response, status: StatusCode, body: &str) -> Result<(), ResponseError> {
    let mut headers = default_headers(body.len());
    headers.replace("Content-Type", "text/html");

    resp.write_status_line(status)?;
    resp.write_headers(&headers)?;
    resp.write_body(body.as_bytes()).map(|_| ())
}

fn page(
    status: StatusCode,
    body: &'static str,
) -> impl Fn(&mut Response, &Request) + Send + Sync + 'static {
    move |resp, req| {
        if let Err(err) = html(resp, status, body) {
            tracing::error!(%err, path = req.path(), "failed to write page");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scratch_http=debug,hello_world=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut router = Router::builder();
    router
        .get("/*", page(StatusCode::Ok, OK))?
        .get("/yourproblem", page(StatusCode::BadRequest, BAD_REQUEST))?
        .get("/myproblem", page(StatusCode::InternalServerError, INTERNAL_ERROR))?;

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
