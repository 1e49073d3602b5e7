use {
    super::*,
    dial::DialedStream,
    futures::{SinkExt, StreamExt},
    serde_json::json,
    tokio::{
        io::{ReadHalf, WriteHalf, split},
        sync::Mutex as AsyncMutex,
    },
};

struct Writer {
    next_id: i64,
    framed: FramedWrite<WriteHalf<DialedStream>, LineCodec>,
}

/// The live pool session: one dialed socket, a dense per-session id
/// counter, and the negotiated extranonce pair (§3, §4.2).
pub(crate) struct Upstream {
    endpoint: UpstreamEndpoint,
    writer: AsyncMutex<Writer>,
    reader: AsyncMutex<FramedRead<ReadHalf<DialedStream>, LineCodec>>,
    extranonce: Mutex<Option<(Extranonce, usize)>>,
    ready: AtomicBool,
    pending: PendingTable,
}

impl Upstream {
    pub(crate) async fn dial(endpoint: UpstreamEndpoint, settings: &Settings) -> Result<Self> {
        let stream = dial::dial(&endpoint, settings)
            .await
            .with_context(|| format!("failed to dial upstream {endpoint}"))?;

        let (read_half, write_half) = split(stream);

        Ok(Self {
            endpoint,
            writer: AsyncMutex::new(Writer {
                next_id: 0,
                framed: FramedWrite::new(write_half, LineCodec::new()),
            }),
            reader: AsyncMutex::new(FramedRead::new(read_half, LineCodec::new())),
            extranonce: Mutex::new(None),
            ready: AtomicBool::new(false),
            pending: PendingTable::new(),
        })
    }

    /// Runs the subscribe/authorize handshake (§4.2) against the just-dialed
    /// socket. On success the upstream's extranonce pair is set and
    /// readiness flips true; a missing or malformed subscribe result
    /// returns an error and leaves readiness false.
    pub(crate) async fn handshake(&self, settings: &Settings) -> Result {
        let subscribe_id = self
            .send("mining.subscribe", json!([USER_AGENT]))
            .await
            .context("failed to send mining.subscribe")?;

        self.send(
            "mining.authorize",
            json!([
                settings.upstream_username,
                settings.upstream_password.clone().unwrap_or_default()
            ]),
        )
        .await
        .context("failed to send mining.authorize")?;

        loop {
            let frame = self
                .read_next()
                .await?
                .ok_or_else(|| anyhow!("upstream closed the connection during handshake"))?;

            let Message::Response { id, result, error, .. } = frame else {
                continue;
            };

            if id != Id::Number(subscribe_id) {
                continue;
            }

            if let Some(error) = error {
                bail!("upstream rejected mining.subscribe: {error}");
            }

            let result = result.ok_or_else(|| anyhow!("mining.subscribe response had no result"))?;
            let (enonce1, enonce2_size) = parse_subscribe_result(&result)?;

            info!(%enonce1, enonce2_size, "upstream handshake complete");
            self.set_extranonce(enonce1, enonce2_size);

            return Ok(());
        }
    }

    /// Forwards a freshly constructed request, returning the upstream id
    /// assigned to it. The id counter and the write are guarded by the same
    /// lock so assigned ids always match wire order.
    pub(crate) async fn send(&self, method: &str, params: Value) -> Result<i64> {
        let mut writer = self.writer.lock().await;
        writer.next_id += 1;
        let id = writer.next_id;

        let message = Message::Request {
            id: Id::Number(id),
            method: method.to_string(),
            params,
        };

        writer
            .framed
            .send(&message)
            .await
            .context("failed to write to upstream")?;

        Ok(id)
    }

    pub(crate) async fn send_raw(&self, message: &Message) -> Result {
        self.writer
            .lock()
            .await
            .framed
            .send(message)
            .await
            .context("failed to write to upstream")
    }

    /// Reads the next frame. Single consumer by convention: the upstream
    /// read loop task is the only caller.
    pub(crate) async fn read_next(&self) -> Result<Option<stratum::Frame>> {
        match self.reader.lock().await.next().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(err)) => Err(err).context("upstream read error"),
            None => Ok(None),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub(crate) fn extranonce(&self) -> Option<(Extranonce, usize)> {
        self.extranonce.lock().clone()
    }

    pub(crate) fn set_extranonce(&self, enonce1: Extranonce, enonce2_size: usize) {
        *self.extranonce.lock() = Some((enonce1, enonce2_size));
        self.ready.store(true, Ordering::Relaxed);
    }

    /// Scrubs the negotiated extranonce and flips readiness false, e.g. on
    /// upstream teardown (§4.8 failure semantics).
    pub(crate) fn clear_extranonce(&self) {
        *self.extranonce.lock() = None;
        self.ready.store(false, Ordering::Relaxed);
    }

    pub(crate) fn endpoint(&self) -> &UpstreamEndpoint {
        &self.endpoint
    }

    pub(crate) fn pending(&self) -> &PendingTable {
        &self.pending
    }
}

/// Both array (`[subs, e1, e2_size]`) and object (`{extranonce1,
/// extranonce2_size}`) result shapes are accepted (§9 open question).
fn parse_subscribe_result(result: &Value) -> Result<(Extranonce, usize)> {
    let (enonce1, enonce2_size) = if let Some(array) = result.as_array() {
        ensure!(
            array.len() >= 3,
            "mining.subscribe array result too short: {result}"
        );
        (array[1].clone(), array[2].clone())
    } else if let Some(object) = result.as_object() {
        let enonce1 = object
            .get("extranonce1")
            .cloned()
            .ok_or_else(|| anyhow!("mining.subscribe object result missing extranonce1"))?;
        let enonce2_size = object
            .get("extranonce2_size")
            .cloned()
            .ok_or_else(|| anyhow!("mining.subscribe object result missing extranonce2_size"))?;
        (enonce1, enonce2_size)
    } else {
        bail!("unrecognized mining.subscribe result shape: {result}");
    };

    let enonce1: Extranonce = enonce1
        .as_str()
        .ok_or_else(|| anyhow!("extranonce1 is not a string"))?
        .parse()
        .context("extranonce1 is not valid hex")?;

    let enonce2_size = enonce2_size
        .as_u64()
        .ok_or_else(|| anyhow!("extranonce2_size is not a number"))? as usize;

    ensure!(enonce2_size > 0, "extranonce2_size must be positive");

    Ok((enonce1, enonce2_size))
}
