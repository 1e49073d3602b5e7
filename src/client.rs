use {
    super::*,
    futures::{SinkExt, StreamExt},
    tokio::net::tcp::OwnedWriteHalf,
};

/// Bound on a client's outbound queue; overflow drops the oldest frame
/// rather than stalling on a slow miner (§9 "Broadcast backpressure").
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub(crate) fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Mutable per-session state, guarded by a single short-held lock rather
/// than split across many fields (the router and the client task both
/// touch this; neither ever awaits while holding it).
pub(crate) struct ClientMutable {
    pub(crate) worker: Option<String>,
    pub(crate) handshake_done: bool,
    pub(crate) prefix: Option<extranonce::Assignment>,
    pub(crate) last_accept: Option<Instant>,
    pub(crate) accepted: u64,
    pub(crate) rejected: u64,
    pub(crate) difficulty: Difficulty,
}

impl Default for ClientMutable {
    fn default() -> Self {
        Self {
            worker: None,
            handshake_done: false,
            prefix: None,
            last_accept: None,
            accepted: 0,
            rejected: 0,
            difficulty: Difficulty::from(Nbits::from(
                bitcoin::CompactTarget::from_consensus(0x1d00ffff),
            )),
        }
    }
}

struct OutboundQueue {
    queue: Mutex<VecDeque<Arc<Message>>>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
        }
    }

    fn push(&self, message: Arc<Message>) {
        let mut queue = self.queue.lock();

        if queue.len() >= self.capacity {
            queue.pop_front();
            warn!("outbound queue full, dropping oldest queued frame");
        }

        queue.push_back(message);
        drop(queue);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Arc<Message> {
        loop {
            if let Some(message) = self.queue.lock().pop_front() {
                return message;
            }

            self.notify.notified().await;
        }
    }
}

/// A weak-reference-safe handle the router and supervisor pass around; the
/// client task is the sole owner of the underlying socket.
pub struct ClientHandle {
    id: ClientId,
    peer: SocketAddr,
    outbound: OutboundQueue,
    state: Mutex<ClientMutable>,
}

impl ClientHandle {
    fn new(id: ClientId, peer: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            id,
            peer,
            outbound: OutboundQueue::new(OUTBOUND_QUEUE_CAPACITY),
            state: Mutex::new(ClientMutable::default()),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(id: ClientId) -> Arc<Self> {
        Self::new(id, "127.0.0.1:0".parse().unwrap())
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Enqueues a frame for delivery; never blocks. Accepts an owned
    /// `Message` or a shared `Arc<Message>` so a registry broadcast can fan
    /// one encoded payload out to every client without cloning the JSON
    /// tree per recipient.
    pub(crate) fn send(&self, message: impl Into<Arc<Message>>) {
        self.outbound.push(message.into());
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut ClientMutable) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub(crate) fn idle_deadline(&self, settings: &Settings) -> Duration {
        if self.state.lock().handshake_done {
            settings.client_authorized_idle
        } else {
            settings.client_idle
        }
    }
}

async fn write_loop(handle: Arc<ClientHandle>, mut writer: FramedWrite<OwnedWriteHalf, LineCodec>) {
    loop {
        let message = handle.outbound.pop().await;

        if let Err(err) = writer.send(message.as_ref()).await {
            debug!(client = %handle.id(), "write error: {err}");
            break;
        }
    }
}

/// Drives one miner connection end to end: registers the client, runs the
/// read loop with phase-dependent idle deadlines, and tears down on any
/// error, timeout, EOF, or cancellation (§4.7).
pub(crate) async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    id: ClientId,
    router: Arc<Router>,
    cancel: CancellationToken,
) {
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();

    let handle = ClientHandle::new(id, peer);
    router.registry().insert(handle.clone()).await;

    let writer_handle = handle.clone();
    let writer_task = tokio::spawn(write_loop(
        writer_handle,
        FramedWrite::new(write_half, LineCodec::new()),
    ));

    let mut framed = FramedRead::new(read_half, LineCodec::new());
    let started = Instant::now();

    loop {
        let deadline = handle.idle_deadline(router.settings());

        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = tokio::time::timeout(deadline, framed.next()) => result,
        };

        let Ok(frame) = frame else {
            debug!(client = %id, "idle timeout after {:?}", deadline);
            break;
        };

        match frame {
            None => {
                debug!(client = %id, "connection closed by peer");
                break;
            }
            Some(Err(err)) => {
                debug!(client = %id, "read error: {err}");
                break;
            }
            Some(Ok(frame)) => {
                match frame {
                    stratum::Frame::Message(message) => {
                        router.handle_client_frame(&handle, message).await;
                    }
                    stratum::Frame::Malformed(line) => {
                        debug!(client = %id, "dropping malformed line: {line}");
                    }
                }
            }
        }
    }

    writer_task.abort();
    router.registry().remove(id).await;
    router.subscribe_queue().remove(id);

    let (accepted, rejected, worker) = handle.with_state(|s| {
        (s.accepted, s.rejected, s.worker.clone().unwrap_or_default())
    });

    info!(
        client = %id,
        worker,
        accepted,
        rejected,
        duration_secs = started.elapsed().as_secs(),
        "client session ended"
    );
}
