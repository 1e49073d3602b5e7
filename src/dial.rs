use {
    super::*,
    rustls::{
        DigitallySignedStruct, SignatureScheme,
        client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        pki_types::{CertificateDer, ServerName, UnixTime},
    },
    std::sync::LazyLock,
    tokio::io::{AsyncRead, AsyncWrite},
    tokio_rustls::TlsConnector,
    tokio_socks::tcp::Socks5Stream,
};

/// Unifies plain TCP, TLS, and SOCKS5-tunnelled connections behind one
/// object-safe type, the way `geofront` abstracts its outbound transport.
pub(crate) type DialedStream = Box<dyn AsyncRead + AsyncWrite + Unpin + Send>;

/// Dials one endpoint per the transport policy in §4.2: a 10 s connect
/// timeout, optionally tunnelled through SOCKS5, optionally wrapped in TLS.
pub(crate) async fn dial(endpoint: &UpstreamEndpoint, settings: &Settings) -> Result<DialedStream> {
    let target = endpoint.to_string();

    let tcp: DialedStream = tokio::time::timeout(settings.connect_timeout, async {
        if let Some(proxy) = &settings.socks5_proxy {
            let stream = match (&settings.socks5_username, &settings.socks5_password) {
                (Some(user), Some(pass)) => {
                    Socks5Stream::connect_with_password(proxy.as_str(), target.as_str(), user, pass)
                        .await
                }
                _ => Socks5Stream::connect(proxy.as_str(), target.as_str()).await,
            }
            .map_err(|err| anyhow!("SOCKS5 connect to {proxy} for {target} failed: {err}"))?;

            Ok::<DialedStream, Error>(Box::new(stream))
        } else {
            let stream = TcpStream::connect(&target)
                .await
                .with_context(|| format!("failed to connect to {target}"))?;
            Ok(Box::new(stream))
        }
    })
    .await
    .with_context(|| format!("connect to {target} timed out after {:?}", settings.connect_timeout))??;

    if !settings.upstream_tls {
        return Ok(tcp);
    }

    let connector = tls_connector(settings.insecure_skip_verify)?;
    let server_name = ServerName::try_from(endpoint.host.clone())
        .map_err(|_| anyhow!("invalid TLS server name `{}`", endpoint.host))?;

    let tls = connector
        .connect(server_name, tcp)
        .await
        .with_context(|| format!("TLS handshake with {target} failed"))?;

    Ok(Box::new(tls))
}

fn tls_connector(insecure_skip_verify: bool) -> Result<TlsConnector> {
    static PROVIDER_INSTALLED: LazyLock<bool> = LazyLock::new(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .is_ok()
    });

    ensure!(*PROVIDER_INSTALLED, "failed to install rustls ring crypto provider");

    let config = if insecure_skip_verify {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Skips certificate validation when `insecure_skip_verify` is set. Used
/// only for upstream dialing, never for the downstream listener.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
