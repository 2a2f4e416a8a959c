use std::path::Path;

use trellis::{handler_fn, Engine, ServerConfig, StatusCode, TransportError};

#[tokio::main]
async fn main() -> Result<(), TransportError> {
    trellis::observability::logging::init("trellis=info");

    let mut config = match std::env::args().nth(1) {
        Some(path) => trellis::load_config(Path::new(&path))?,
        None => ServerConfig::default(),
    };
    // Deployment platforms inject the listen port through the environment;
    // that decision stays in the binary, not the library.
    if let Ok(port) = std::env::var("PORT") {
        if let Ok(port) = port.parse() {
            config.default_port = Some(port);
        }
    }

    let engine = Engine::new();
    if !config.trusted_proxies.is_empty() {
        engine.set_trusted_proxies(config.trusted_proxies.clone());
    }

    engine
        .get(
            "/healthz",
            vec![handler_fn(|ctx| {
                ctx.string(StatusCode::OK, "ok");
            })],
        )
        .expect("route registration");
    engine
        .get(
            "/users/:id",
            vec![handler_fn(|ctx| {
                let id = ctx.param("id").unwrap_or("").to_string();
                ctx.string(StatusCode::OK, format!("user {id}"));
            })],
        )
        .expect("route registration");
    engine
        .get(
            "/ip",
            vec![handler_fn(|ctx| {
                let ip = ctx
                    .client_ip()
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                ctx.string(StatusCode::OK, ip);
            })],
        )
        .expect("route registration");
    engine
        .get(
            "/static/*filepath",
            vec![handler_fn(|ctx| {
                let path = ctx.param("filepath").unwrap_or("").to_string();
                ctx.string(StatusCode::OK, format!("would serve {path}"));
            })],
        )
        .expect("route registration");

    match config.tls.clone() {
        Some(tls) => {
            engine
                .run_tls(
                    &config.bind_address(),
                    Path::new(&tls.cert_path),
                    Path::new(&tls.key_path),
                )
                .await
        }
        None => engine.run(&config).await,
    }
}
