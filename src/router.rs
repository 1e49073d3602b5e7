use {
    super::*,
    metrics::MetricsSink,
    pending::PendingEntry,
    serde_json::json,
    upstream::Upstream,
    vardiff::DifficultyController,
};

/// Central interpreter: applies the client/upstream rewriting rules and
/// owns the live client set and the current upstream slot.
pub struct Router {
    registry: Registry,
    subscribe_queue: SubscribeQueue,
    extranonce: extranonce::ExtranonceAllocator,
    settings: Arc<Settings>,
    upstream: RwLock<Option<Arc<Upstream>>>,
    upstream_ready: AtomicBool,
    metrics: Arc<dyn MetricsSink>,
    difficulty: Arc<dyn DifficultyController>,
}

impl Router {
    pub(crate) fn new(
        settings: Arc<Settings>,
        metrics: Arc<dyn MetricsSink>,
        difficulty: Arc<dyn DifficultyController>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: Registry::new(),
            subscribe_queue: SubscribeQueue::new(),
            extranonce: extranonce::ExtranonceAllocator::new(extranonce::DEFAULT_PREFIX_BYTES),
            settings,
            upstream: RwLock::new(None),
            upstream_ready: AtomicBool::new(false),
            metrics,
            difficulty,
        })
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn subscribe_queue(&self) -> &SubscribeQueue {
        &self.subscribe_queue
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn current_upstream(&self) -> Option<Arc<Upstream>> {
        self.upstream.read().await.clone()
    }

    fn is_upstream_ready(&self) -> bool {
        self.upstream_ready.load(Ordering::Acquire)
    }

    pub(crate) fn upstream_ready(&self) -> bool {
        self.is_upstream_ready()
    }

    pub(crate) async fn upstream_endpoint(&self) -> Option<String> {
        self.current_upstream().await.map(|u| u.endpoint().to_string())
    }

    pub(crate) async fn connected_clients(&self) -> usize {
        self.registry.len().await
    }

    /// Installs a freshly handshaken upstream and releases every queued
    /// subscribe (§4.4 "ordering guarantee").
    pub(crate) async fn mark_upstream_ready(&self, upstream: Arc<Upstream>) {
        *self.upstream.write().await = Some(upstream);
        self.upstream_ready.store(true, Ordering::Release);
        self.flush_subscribe_queue().await;
    }

    /// Tears down the current upstream slot: readiness drops, the pending
    /// table empties, queued subscribes stay parked (§4.5, S4).
    pub(crate) async fn clear_upstream(&self) {
        self.upstream_ready.store(false, Ordering::Release);
        if let Some(upstream) = self.upstream.write().await.take() {
            upstream.pending().clear();
        }
    }

    async fn flush_subscribe_queue(&self) {
        let Some(upstream) = self.current_upstream().await else {
            return;
        };
        let Some((enonce1, enonce2_size)) = upstream.extranonce() else {
            return;
        };

        for (client, id) in self.subscribe_queue.flush() {
            let Some(client) = client.upgrade() else {
                continue;
            };
            self.respond_subscribe(&client, id, &enonce1, enonce2_size);
            self.difficulty.on_subscribe(&client);
        }
    }

    /// Entry point for a frame read from one miner's socket.
    pub(crate) async fn handle_client_frame(&self, client: &Arc<ClientHandle>, message: Message) {
        match message {
            Message::Request { id, method, params } => {
                self.route_client_method(client, Some(id), method, params).await;
            }
            Message::Notification { method, params } => {
                self.route_client_method(client, None, method, params).await;
            }
            Message::Response { .. } => {
                debug!(client = %client.id(), "ignoring response-shaped frame from client");
            }
        }
    }

    async fn route_client_method(
        &self,
        client: &Arc<ClientHandle>,
        id: Option<Id>,
        method: String,
        params: Value,
    ) {
        match method.as_str() {
            "mining.subscribe" => {
                let Some(id) = id else {
                    debug!(client = %client.id(), "ignoring subscribe without id");
                    return;
                };
                self.handle_subscribe(client, id).await;
            }
            "mining.authorize" => self.handle_authorize(client, id, params).await,
            "mining.submit" => self.handle_submit(client, id, params).await,
            other if other.starts_with("mining.") => {
                self.forward_to_upstream(client, id, other, params).await;
            }
            other => debug!(client = %client.id(), method = other, "ignoring unsupported client method"),
        }
    }

    async fn handle_subscribe(&self, client: &Arc<ClientHandle>, id: Id) {
        let should_respond_now =
            self.subscribe_queue.enqueue(client, id.clone(), || self.is_upstream_ready());

        if !should_respond_now {
            return;
        }

        let Some(upstream) = self.current_upstream().await else {
            return;
        };
        let Some((enonce1, enonce2_size)) = upstream.extranonce() else {
            return;
        };

        self.respond_subscribe(client, id, &enonce1, enonce2_size);
        self.difficulty.on_subscribe(client);
    }

    /// Response shape per §4.4: `{"id", "result": [[], e1', e2_size'], "error": null}`.
    /// A prefix, once assigned, is reused rather than reallocated (§3 invariant).
    fn respond_subscribe(
        &self,
        client: &Arc<ClientHandle>,
        id: Id,
        upstream_enonce1: &Extranonce,
        upstream_enonce2_size: usize,
    ) {
        let existing = client.with_state(|s| s.prefix.clone());
        let assignment = existing.or_else(|| {
            let assignment = self.extranonce.allocate(upstream_enonce2_size);
            client.with_state(|s| s.prefix = assignment.clone());
            assignment
        });

        let enonce1 = extranonce::effective_extranonce1(upstream_enonce1, assignment.as_ref().map(|a| &a.prefix));
        let enonce2_size = assignment
            .as_ref()
            .map(|a| extranonce::effective_extranonce2_size(upstream_enonce2_size, a.trim))
            .unwrap_or(upstream_enonce2_size);

        client.send(Message::response(
            id,
            Some(json!([[], enonce1.to_string(), enonce2_size])),
            None,
        ));
    }

    async fn handle_authorize(&self, client: &Arc<ClientHandle>, id: Option<Id>, params: Value) {
        if let Some(worker) = params.get(0).and_then(Value::as_str) {
            client.with_state(|s| s.worker = Some(worker.to_string()));
        }

        self.forward_to_upstream(client, id, "mining.authorize", params).await;
    }

    async fn handle_submit(&self, client: &Arc<ClientHandle>, id: Option<Id>, params: Value) {
        let Some(array) = params.as_array() else {
            warn!(client = %client.id(), "mining.submit params not an array, dropping");
            return;
        };
        let mut array = array.clone();

        if array.is_empty() {
            warn!(client = %client.id(), "mining.submit params empty, dropping");
            return;
        }
        array[0] = Value::String(self.settings.upstream_username.clone());

        if array.len() > 2 {
            if let Some(assignment) = client.with_state(|s| s.prefix.clone()) {
                if let Some((_, upstream_enonce2_size)) =
                    self.current_upstream().await.and_then(|u| u.extranonce())
                {
                    if let Some(submitted) = array[2].as_str() {
                        array[2] = Value::String(rewrite_extranonce2(
                            submitted,
                            &assignment.prefix.to_string(),
                            assignment.trim,
                            upstream_enonce2_size,
                        ));
                    }
                }
            }
        }

        self.forward_to_upstream(client, id, "mining.submit", Value::Array(array)).await;
    }

    /// Forwards a request upstream and records a pending entry keyed by the
    /// assigned upstream id; on any failure to reach the upstream, responds
    /// to the client with the matching protocol error (§7).
    async fn forward_to_upstream(&self, client: &Arc<ClientHandle>, id: Option<Id>, method: &str, params: Value) {
        let Some(upstream) = self.current_upstream().await else {
            if let Some(id) = id {
                client.send(Message::response(
                    id,
                    Some(Value::Bool(false)),
                    Some(StratumError::UpstreamNotReady.into_response()),
                ));
            }
            return;
        };

        match upstream.send(method, params).await {
            Ok(upstream_id) => {
                upstream.pending().insert(
                    upstream_id,
                    PendingEntry {
                        client: Arc::downgrade(client),
                        original_id: id,
                        method: method.to_string(),
                        sent_at: Instant::now(),
                    },
                );
            }
            Err(err) => {
                warn!(client = %client.id(), method, "failed to forward to upstream: {err}");
                if let Some(id) = id {
                    client.send(Message::response(
                        id,
                        Some(Value::Bool(false)),
                        Some(StratumError::ForwardFailure.into_response()),
                    ));
                }
            }
        }
    }

    /// Entry point for a frame read from the upstream socket.
    pub(crate) async fn handle_upstream_frame(&self, message: Message) {
        match message {
            Message::Notification { method, params } => {
                self.handle_upstream_notification(method, params).await;
            }
            Message::Response { id, result, error, extra } => {
                self.handle_upstream_response(id, result, error, extra).await;
            }
            Message::Request { method, .. } => {
                debug!(method, "ignoring request-shaped frame from upstream");
            }
        }
    }

    async fn handle_upstream_notification(&self, method: String, params: Value) {
        match method.as_str() {
            "mining.notify" => {
                let clean_jobs = params.get(8).and_then(Value::as_bool).unwrap_or(false);
                if clean_jobs {
                    if let Some(nbits) = params
                        .get(6)
                        .and_then(Value::as_str)
                        .and_then(|s| s.parse::<Nbits>().ok())
                    {
                        let job_id = params.get(0).and_then(Value::as_str).unwrap_or_default();
                        info!(job_id, difficulty = %Difficulty::from(nbits), "new job");
                    }
                }
                let unix_secs = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                self.metrics.set_last_notify_unix(unix_secs);
                self.registry.broadcast(Message::Notification { method, params }).await;
            }
            "mining.set_difficulty" => {
                if let Some(value) = params.get(0).and_then(Value::as_f64) {
                    debug!(difficulty = value, "upstream set_difficulty");
                    self.metrics.set_last_set_difficulty(value);
                    self.registry.set_difficulty_for_all(Difficulty::from(value)).await;
                }
                self.registry.broadcast(Message::Notification { method, params }).await;
            }
            other => {
                if self.settings.strict_broadcast {
                    debug!(method = other, "dropping non-standard notification (strict_broadcast)");
                } else {
                    self.registry
                        .broadcast(Message::Notification { method: other.to_string(), params })
                        .await;
                }
            }
        }
    }

    async fn handle_upstream_response(
        &self,
        id: Id,
        result: Option<Value>,
        error: Option<JsonRpcError>,
        extra: serde_json::Map<String, Value>,
    ) {
        let Id::Number(upstream_id) = id else {
            debug!("upstream response with non-numeric id, dropping");
            return;
        };

        let Some(upstream) = self.current_upstream().await else {
            return;
        };

        let Some(entry) = upstream.pending().take(upstream_id) else {
            debug!(upstream_id, "no pending entry for upstream response, dropping");
            return;
        };

        let Some(client) = entry.client.upgrade() else {
            return;
        };

        match entry.method.as_str() {
            "mining.submit" => self.record_share_outcome(&client, &result, entry.sent_at),
            "mining.authorize" => {
                if matches!(result, Some(Value::Bool(true))) {
                    client.with_state(|s| s.handshake_done = true);
                }
            }
            _ => {}
        }

        let Some(original_id) = entry.original_id else {
            return;
        };

        client.send(Message::Response {
            id: original_id,
            result,
            error,
            extra,
        });
    }

    /// Updates share counters and emits the accounting log line (§4.6.4).
    fn record_share_outcome(&self, client: &Arc<ClientHandle>, result: &Option<Value>, sent_at: Instant) {
        let accepted = matches!(result, Some(Value::Bool(true)));
        let now = Instant::now();

        if accepted {
            self.metrics.inc_shares_accepted();
        } else {
            self.metrics.inc_shares_rejected();
        }
        self.difficulty.record_outcome(client, accepted);

        let (worker, accepted_total, rejected_total, since_last_accept) = client.with_state(|s| {
            if accepted {
                s.accepted += 1;
                let since_last_accept = s.last_accept.map(|t| now.duration_since(t));
                s.last_accept = Some(now);
                (s.worker.clone().unwrap_or_default(), s.accepted, s.rejected, since_last_accept)
            } else {
                s.rejected += 1;
                (s.worker.clone().unwrap_or_default(), s.accepted, s.rejected, None)
            }
        });

        info!(
            worker,
            accepted,
            accepted_total,
            rejected_total,
            interval_ms = since_last_accept.map(|d| d.as_millis()),
            latency_ms = now.duration_since(sent_at).as_millis(),
            "share outcome"
        );
    }
}

/// Reconstructs the upstream-sized `extranonce2` from what the miner sent
/// (§4.6.3). `prefix` is already uppercase hex. `submitted` is peer-controlled
/// and not necessarily hex; byte-index slicing below is only safe once that's
/// been ruled out, so a non-hex submission is passed through unslicing.
fn rewrite_extranonce2(submitted: &str, prefix: &str, trim: usize, upstream_enonce2_size: usize) -> String {
    if !submitted.bytes().all(|b| b.is_ascii_hexdigit()) {
        return format!("{prefix}{submitted}");
    }

    let submitted = submitted.to_uppercase();
    let prefix_len = 2 * trim;
    let sized_down_len = 2 * (upstream_enonce2_size - trim);
    let full_len = 2 * upstream_enonce2_size;

    if submitted.len() == sized_down_len {
        format!("{prefix}{submitted}")
    } else if submitted.len() == full_len {
        if submitted.starts_with(prefix) {
            submitted
        } else {
            format!("{prefix}{}", &submitted[prefix_len..])
        }
    } else if submitted.starts_with(prefix) {
        submitted
    } else {
        format!("{prefix}{submitted}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_down_submission_gets_prefix_prepended() {
        assert_eq!(rewrite_extranonce2("A1B2C3", "00", 1, 4), "00A1B2C3");
    }

    #[test]
    fn full_width_submission_with_wrong_prefix_is_overwritten() {
        assert_eq!(rewrite_extranonce2("FFA1B2C3", "00", 1, 4), "00A1B2C3");
    }

    #[test]
    fn full_width_submission_with_correct_prefix_is_untouched() {
        assert_eq!(rewrite_extranonce2("00A1B2C3", "00", 1, 4), "00A1B2C3");
    }

    #[test]
    fn unexpected_length_without_prefix_is_prepended() {
        assert_eq!(rewrite_extranonce2("A1B2", "00", 1, 4), "00A1B2");
    }

    #[test]
    fn unexpected_length_with_prefix_already_present_is_untouched() {
        assert_eq!(rewrite_extranonce2("00A1", "00", 1, 4), "00A1");
    }

    #[test]
    fn non_hex_submission_is_passed_through_without_slicing() {
        // byte length equals the full-width case (8) but isn't valid hex; must
        // not panic even with a multi-byte char straddling the prefix boundary.
        assert_eq!(rewrite_extranonce2("X\u{e9}XXXXX", "00", 1, 4), "00X\u{e9}XXXXX");
    }
}
