use {
    anyhow::{Context, Error, anyhow, bail, ensure},
    clap::Parser,
    client::{ClientHandle, ClientId},
    parking_lot::Mutex,
    registry::Registry,
    rand::Rng,
    serde_json::Value,
    settings::Settings,
    std::{
        collections::{HashMap, VecDeque},
        net::SocketAddr,
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    },
    stratum::{Difficulty, Extranonce, Id, JsonRpcError, LineCodec, Message, Nbits, StratumError},
    tokio::{
        net::{TcpListener, TcpStream},
        sync::{Notify, RwLock},
        task::JoinSet,
        time::sleep,
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
};

pub use {
    arguments::Arguments,
    options::Options,
    router::Router,
    settings::UpstreamEndpoint,
    supervisor::Supervisor,
};

mod arguments;
mod backoff;
mod client;
mod dial;
mod extranonce;
mod http_server;
mod metrics;
mod options;
mod pending;
mod rate_limit;
mod registry;
mod router;
mod settings;
mod signal;
mod subscribe_queue;
mod supervisor;
mod upstream;
mod vardiff;

/// Identifies this proxy to upstream pools during `mining.subscribe`.
pub const USER_AGENT: &str = "stratum-proxy/0.1.0";

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Arguments::parse();
    let cancel = signal::setup_signal_handler();

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");

    match runtime.block_on(args.run(cancel)) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
