use super::*;

/// One candidate pool endpoint in the failover list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamEndpoint {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl std::str::FromStr for UpstreamEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("upstream endpoint `{s}` is missing a port"))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid port in upstream endpoint `{s}`"))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// The frozen record the core depends on. Everything downstream of
/// `Settings::from_options` only ever reads this; it is never reloaded or
/// mutated for the life of the process.
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    pub(crate) upstreams: Vec<UpstreamEndpoint>,
    pub(crate) upstream_username: String,
    pub(crate) upstream_password: Option<String>,
    pub(crate) upstream_tls: bool,
    pub(crate) insecure_skip_verify: bool,
    pub(crate) socks5_proxy: Option<String>,
    pub(crate) socks5_username: Option<String>,
    pub(crate) socks5_password: Option<String>,
    pub(crate) address: String,
    pub(crate) port: u16,
    pub(crate) status_port: Option<u16>,
    pub(crate) max_clients: usize,
    pub(crate) client_idle: Duration,
    pub(crate) client_authorized_idle: Duration,
    pub(crate) upstream_grace: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) backoff_min: Duration,
    pub(crate) backoff_max: Duration,
    pub(crate) strict_broadcast: bool,
}

impl Settings {
    pub(crate) fn from_options(options: Options) -> Result<Self> {
        ensure!(
            !options.upstream.is_empty(),
            "at least one upstream endpoint is required"
        );

        let upstreams = options
            .upstream
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<UpstreamEndpoint>>>()
            .context("invalid upstream endpoint")?;

        ensure!(
            !options.username.trim().is_empty(),
            "upstream username must not be empty"
        );

        let backoff_min = Duration::from_millis(options.backoff_min_ms);
        let backoff_max = Duration::from_millis(options.backoff_max_ms);

        ensure!(
            backoff_max >= backoff_min,
            "backoff_max_ms ({}) must be >= backoff_min_ms ({})",
            options.backoff_max_ms,
            options.backoff_min_ms
        );

        ensure!(options.max_clients > 0, "max_clients must be positive");

        Ok(Self {
            upstreams,
            upstream_username: options.username,
            upstream_password: options.password,
            upstream_tls: options.upstream_tls,
            insecure_skip_verify: options.insecure_skip_verify,
            socks5_proxy: options.socks5_proxy,
            socks5_username: options.socks5_username,
            socks5_password: options.socks5_password,
            address: options.address,
            port: options.port,
            status_port: options.status_port,
            max_clients: options.max_clients,
            client_idle: Duration::from_secs(options.client_idle_secs),
            client_authorized_idle: Duration::from_secs(options.client_authorized_idle_secs),
            upstream_grace: Duration::from_secs(options.upstream_grace_secs),
            connect_timeout: Duration::from_secs(options.connect_timeout_secs),
            backoff_min,
            backoff_max,
            strict_broadcast: options.strict_broadcast,
        })
    }
}
