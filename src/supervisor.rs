use {
    super::*,
    metrics::AtomicMetrics,
    rate_limit::{AllowAll, RateLimiter},
    upstream::Upstream,
    vardiff::NoopDifficultyController,
};

/// Owns the accept loop, the client registry (via [`Router`]), and the
/// upstream session lifecycle (§4.8).
pub struct Supervisor {
    settings: Arc<Settings>,
    router: Arc<Router>,
    rate_limiter: Arc<dyn RateLimiter>,
    metrics: Arc<AtomicMetrics>,
}

impl Supervisor {
    pub(crate) fn new(settings: Arc<Settings>) -> Self {
        let metrics = Arc::new(AtomicMetrics::default());
        let router = Router::new(settings.clone(), metrics.clone(), Arc::new(NoopDifficultyController));

        Self {
            router,
            settings,
            rate_limiter: Arc::new(AllowAll),
            metrics,
        }
    }

    pub(crate) async fn run(self, cancel: CancellationToken) -> Result {
        let listener = TcpListener::bind((self.settings.address.as_str(), self.settings.port))
            .await
            .with_context(|| {
                format!("failed to bind {}:{}", self.settings.address, self.settings.port)
            })?;

        info!(
            "listening on {}:{} ({} upstream(s) configured)",
            self.settings.address,
            self.settings.port,
            self.settings.upstreams.len()
        );

        let http_handle = http_server::spawn(
            &self.settings,
            self.router.clone(),
            self.metrics.clone(),
            cancel.clone(),
        )?;

        let manager_handle = tokio::spawn(upstream_manager(
            self.settings.clone(),
            self.router.clone(),
            self.metrics.clone(),
            cancel.clone(),
        ));

        let mut client_tasks = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.admit(&mut client_tasks, stream, peer, &cancel).await,
                        Err(err) => warn!("accept error: {err}"),
                    }
                }
            }
        }

        info!("shutting down, draining client sessions");
        tokio::select! {
            _ = async { while client_tasks.join_next().await.is_some() {} } => {}
            _ = sleep(Duration::from_secs(2)) => warn!("client sessions did not drain within 2s"),
        }

        manager_handle.abort();
        http_handle.abort();

        Ok(())
    }

    async fn admit(&self, tasks: &mut JoinSet<()>, stream: TcpStream, peer: SocketAddr, cancel: &CancellationToken) {
        if !self.rate_limiter.allow(peer) {
            debug!(%peer, "rejected by rate limiter");
            return;
        }

        let registry = self.router.registry();
        if registry.len().await >= self.settings.max_clients {
            debug!(%peer, "rejected: at max_clients");
            self.rate_limiter.release(peer);
            return;
        }

        let id = registry.next_client_id();
        let router = self.router.clone();
        let rate_limiter = self.rate_limiter.clone();
        let client_cancel = cancel.clone();

        tasks.spawn(async move {
            client::serve(stream, peer, id, router, client_cancel).await;
            rate_limiter.release(peer);
        });
    }
}

/// Ticks every 250 ms (§4.8): starts the upstream session on the 0→positive
/// client-count transition, releases it after a grace period with zero
/// clients. Communicates with the upstream task through cancellation only.
async fn upstream_manager(
    settings: Arc<Settings>,
    router: Arc<Router>,
    metrics: Arc<AtomicMetrics>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut upstream_cancel: Option<CancellationToken> = None;
    let mut grace_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Some(token) = upstream_cancel.take() {
                    token.cancel();
                }
                return;
            }
            _ = ticker.tick() => {}
        }

        let active = router.connected_clients().await;
        metrics.set_clients_active(active);

        if active > 0 {
            grace_deadline = None;

            if upstream_cancel.is_none() {
                let child = cancel.child_token();
                tokio::spawn(upstream_loop(
                    settings.clone(),
                    router.clone(),
                    metrics.clone(),
                    child.clone(),
                ));
                upstream_cancel = Some(child);
                info!(active, "starting upstream session");
            }
        } else if upstream_cancel.is_some() {
            let deadline = *grace_deadline.get_or_insert_with(|| Instant::now() + settings.upstream_grace);

            if Instant::now() >= deadline {
                if let Some(token) = upstream_cancel.take() {
                    token.cancel();
                }
                router.clear_upstream().await;
                metrics.set_upstream_connected(false);
                grace_deadline = None;
                info!("released upstream session after grace period with no clients");
            }
        }
    }
}

/// Dials the failover list in order, handshakes, runs the read loop until
/// cancellation, EOF, or an error, then advances to the next endpoint and
/// backs off (§4.2 failover).
async fn upstream_loop(settings: Arc<Settings>, router: Arc<Router>, metrics: Arc<AtomicMetrics>, cancel: CancellationToken) {
    let mut index = 0usize;
    let mut attempt = 0u32;

    while !cancel.is_cancelled() {
        let endpoint = settings.upstreams[index % settings.upstreams.len()].clone();

        match connect_and_run(&settings, &router, &metrics, &endpoint, &cancel, &mut attempt).await {
            Ok(()) => return,
            Err(err) => warn!(%endpoint, "upstream session ended: {err:#}"),
        }

        router.clear_upstream().await;
        metrics.set_upstream_connected(false);
        index = index.wrapping_add(1);

        if cancel.is_cancelled() {
            return;
        }

        let delay = backoff::backoff(settings.backoff_min, settings.backoff_max, attempt);
        attempt = (attempt + 1).min(3);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(delay) => {}
        }
    }
}

async fn connect_and_run(
    settings: &Settings,
    router: &Arc<Router>,
    metrics: &Arc<AtomicMetrics>,
    endpoint: &UpstreamEndpoint,
    cancel: &CancellationToken,
    attempt: &mut u32,
) -> Result {
    let upstream = Upstream::dial(endpoint.clone(), settings)
        .await
        .with_context(|| format!("failed to dial {endpoint}"))?;

    upstream
        .handshake(settings)
        .await
        .with_context(|| format!("handshake with {endpoint} failed"))?;

    let upstream = Arc::new(upstream);
    router.mark_upstream_ready(upstream.clone()).await;
    metrics.set_upstream_connected(true);
    *attempt = 0;

    info!(%endpoint, "upstream connected");

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            frame = upstream.read_next() => frame,
        };

        match frame? {
            Some(stratum::Frame::Message(message)) => router.handle_upstream_frame(message).await,
            Some(stratum::Frame::Malformed(line)) => debug!("dropping malformed upstream line: {line}"),
            None => bail!("upstream closed the connection"),
        }
    }
}
