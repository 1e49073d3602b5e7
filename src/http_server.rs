use {
    super::*,
    axum::{Json, Router as AxumRouter, extract::State, routing::get},
    axum_server::Handle,
    metrics::{AtomicMetrics, MetricsSnapshot},
    std::net::ToSocketAddrs,
};

#[derive(Clone)]
struct AppState {
    router: Arc<Router>,
    metrics: Arc<AtomicMetrics>,
}

#[derive(serde::Serialize)]
struct Status {
    upstream: Option<String>,
    connected: bool,
    clients_active: usize,
    #[serde(flatten)]
    metrics: MetricsSnapshot,
}

/// Serves the single read-only `/status` route (§6). No ACME: the HTTP
/// surface here is an operator-facing counter dump, not a public service.
pub(crate) fn spawn(
    settings: &Settings,
    router: Arc<Router>,
    metrics: Arc<AtomicMetrics>,
    cancel: CancellationToken,
) -> Result<tokio::task::JoinHandle<std::io::Result<()>>> {
    let Some(port) = settings.status_port else {
        return Ok(tokio::spawn(async { std::future::pending::<std::io::Result<()>>().await }));
    };

    let addr = (settings.address.as_str(), port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve status address {}:{port}", settings.address))?
        .next()
        .ok_or_else(|| anyhow!("no addresses resolved for {}:{port}", settings.address))?;

    let listener = std::net::TcpListener::bind(addr)
        .with_context(|| format!("failed to bind status endpoint to {addr}"))?;
    listener.set_nonblocking(true)?;

    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        cancel.cancelled().await;
        shutdown_handle.shutdown();
    });

    let app = AxumRouter::new()
        .route("/status", get(status))
        .with_state(AppState { router, metrics });

    info!("status endpoint listening on http://{addr}");

    Ok(tokio::spawn(async move {
        axum_server::from_tcp(listener)
            .handle(handle)
            .serve(app.into_make_service())
            .await
    }))
}

async fn status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        upstream: state.router.upstream_endpoint().await,
        connected: state.router.upstream_ready(),
        clients_active: state.router.connected_clients().await,
        metrics: state.metrics.snapshot(),
    })
}
