use {
    clap::Parser,
    futures::{SinkExt, StreamExt},
    serde_json::{Value, json},
    std::{net::TcpListener as StdTcpListener, time::Duration},
    stratum::{Frame, LineCodec, Message},
    stratum_proxy::Arguments,
    tokio::{
        net::{TcpListener, TcpStream, tcp::OwnedReadHalf, tcp::OwnedWriteHalf},
        time::sleep,
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite},
        sync::CancellationToken,
    },
};


pub(crate) const UPSTREAM_ENONCE1: &str = "DEADBEEF";
pub(crate) const UPSTREAM_ENONCE2_SIZE: usize = 4;

pub(crate) fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// One side of a framed Stratum connection, shared by the mock upstream and
/// the mock miner below.
pub(crate) struct FramedConn {
    reader: FramedRead<OwnedReadHalf, LineCodec>,
    writer: FramedWrite<OwnedWriteHalf, LineCodec>,
}

impl FramedConn {
    fn new(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        let (read, write) = stream.into_split();
        Self {
            reader: FramedRead::new(read, LineCodec::new()),
            writer: FramedWrite::new(write, LineCodec::new()),
        }
    }

    pub(crate) async fn send(&mut self, message: Message) {
        self.writer.send(&message).await.unwrap();
    }

    pub(crate) async fn recv(&mut self) -> Message {
        match self.reader.next().await.unwrap().unwrap() {
            Frame::Message(message) => message,
            Frame::Malformed(line) => panic!("received malformed line: {line}"),
        }
    }

    pub(crate) async fn try_recv(&mut self, timeout: Duration) -> Option<Message> {
        tokio::time::timeout(timeout, self.recv()).await.ok()
    }
}

/// Stands in for a real pool: accepts connections one at a time and answers
/// the subscribe/authorize handshake the way a cooperative upstream would.
pub(crate) struct MockUpstream {
    listener: TcpListener,
}

impl MockUpstream {
    pub(crate) async fn bind() -> (Self, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (Self { listener }, port)
    }

    pub(crate) async fn accept_and_handshake(&self) -> FramedConn {
        let (stream, _) = self.listener.accept().await.unwrap();
        let mut conn = FramedConn::new(stream);

        let Message::Request { id, method, .. } = conn.recv().await else {
            panic!("expected mining.subscribe request");
        };
        assert_eq!(method, "mining.subscribe");
        conn.send(Message::response(
            id,
            Some(json!([[], UPSTREAM_ENONCE1, UPSTREAM_ENONCE2_SIZE])),
            None,
        ))
        .await;

        let Message::Request { id, method, .. } = conn.recv().await else {
            panic!("expected mining.authorize request");
        };
        assert_eq!(method, "mining.authorize");
        conn.send(Message::response(id, Some(Value::Bool(true)), None)).await;

        conn
    }
}

/// A connected miner speaking raw framed Stratum to the proxy.
pub(crate) type MockMiner = FramedConn;

impl MockMiner {
    pub(crate) async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        Self::new(stream)
    }
}

/// Runs the proxy in-process against a caller-chosen upstream list.
pub(crate) struct TestProxy {
    pub(crate) port: u16,
    cancel: CancellationToken,
}

impl TestProxy {
    pub(crate) async fn spawn(upstream_port: u16, extra_args: &[&str]) -> Self {
        Self::spawn_with_upstreams(&[upstream_port], extra_args).await
    }

    pub(crate) async fn spawn_with_upstreams(upstream_ports: &[u16], extra_args: &[&str]) -> Self {
        let port = free_port();
        let mut args = vec!["stratum-proxy".to_string()];
        for upstream_port in upstream_ports {
            args.push(format!("127.0.0.1:{upstream_port}"));
        }
        args.push("--username".into());
        args.push("wallet.proxy".into());
        args.push("--port".into());
        args.push(port.to_string());
        args.extend(extra_args.iter().map(|s| s.to_string()));

        let arguments = Arguments::try_parse_from(args).expect("valid test arguments");
        let cancel = CancellationToken::new();

        tokio::spawn(arguments.run(cancel.clone()));

        for _ in 0..100 {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }

        Self { port, cancel }
    }

    pub(crate) async fn connect_miner(&self) -> MockMiner {
        MockMiner::connect(self.port).await
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
