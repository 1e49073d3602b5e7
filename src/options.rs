use super::*;

/// CLI-only configuration surface. Frozen into a [`Settings`] at startup;
/// there is deliberately no file-based loader here (config-file loading is
/// an external collaborator's concern).
#[derive(Clone, Debug, Parser)]
#[command(version, about = "Stratum V1 mining proxy")]
pub struct Options {
    #[arg(help = "Upstream stratum pool <HOST:PORT>. Repeat to supply backups in order.")]
    pub upstream: Vec<String>,

    #[arg(long, help = "Username/address for upstream authentication.")]
    pub username: String,

    #[arg(long, help = "Password for upstream authentication.")]
    pub password: Option<String>,

    #[arg(long, help = "Connect to the upstream over TLS.")]
    pub upstream_tls: bool,

    #[arg(long, help = "Skip TLS certificate verification for the upstream.")]
    pub insecure_skip_verify: bool,

    #[arg(long, help = "Tunnel the upstream connection through a SOCKS5 proxy <HOST:PORT>.")]
    pub socks5_proxy: Option<String>,

    #[arg(long, help = "SOCKS5 proxy username.")]
    pub socks5_username: Option<String>,

    #[arg(long, help = "SOCKS5 proxy password.")]
    pub socks5_password: Option<String>,

    #[arg(long, default_value = "0.0.0.0", help = "Listen at <ADDRESS> for downstream miners.")]
    pub address: String,

    #[arg(long, default_value_t = 3333, help = "Listen on <PORT> for downstream miners.")]
    pub port: u16,

    #[arg(long, help = "Enable the HTTP status endpoint on <STATUS_PORT>.")]
    pub status_port: Option<u16>,

    #[arg(long, default_value_t = 256, help = "Maximum concurrent downstream miners.")]
    pub max_clients: usize,

    #[arg(long, default_value_t = 180, help = "Idle read timeout in seconds before handshake.")]
    pub client_idle_secs: u64,

    #[arg(long, default_value_t = 1800, help = "Idle read timeout in seconds after handshake.")]
    pub client_authorized_idle_secs: u64,

    #[arg(long, default_value_t = 15, help = "Grace period in seconds before releasing an idle upstream.")]
    pub upstream_grace_secs: u64,

    #[arg(long, default_value_t = 10, help = "Upstream connect timeout in seconds.")]
    pub connect_timeout_secs: u64,

    #[arg(long, default_value_t = 500, help = "Minimum upstream reconnect backoff in milliseconds.")]
    pub backoff_min_ms: u64,

    #[arg(long, default_value_t = 30_000, help = "Maximum upstream reconnect backoff in milliseconds.")]
    pub backoff_max_ms: u64,

    #[arg(
        long,
        help = "Only broadcast mining.notify and mining.set_difficulty; drop other mining.* notifications."
    )]
    pub strict_broadcast: bool,
}
