//! Listener wiring and the `Handler` owner-struct.
//!
//! This module's job is to produce one `Request` per accepted connection
//! and dispatch it through the `Router`. Gemini clients authenticate by
//! presenting a self-signed certificate; trust is established later by
//! fingerprint lookup in `persons`, not by certificate-chain verification,
//! so the client verifier here accepts any certificate the client offers.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{DigitallySignedStruct, SignatureScheme};
use sqlx::PgPool;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::federation::{DbResolver, Outbox, QueueOutbox, Resolver};
use crate::gemini::request::Request;
use crate::gemini::writer::Writer;
use crate::gemini::Router;
use crate::models::Actor;
use crate::AppConfig;

pub type Conn = tokio_rustls::server::TlsStream<TcpStream>;

/// Built once in `main`, shared read-only across every connection's task.
pub struct Handler {
    pub config: AppConfig,
    pub db: PgPool,
    pub resolver: Arc<dyn Resolver>,
    pub outbox: Arc<dyn Outbox>,
    pub domain: String,
    pub router: Router,
}

impl Handler {
    pub fn new(config: AppConfig, db: PgPool, router: Router) -> Arc<Self> {
        let resolver = DbResolver::new(db.clone(), config.domain.clone());
        Arc::new(Handler {
            domain: config.domain.clone(),
            config,
            db,
            resolver,
            outbox: Arc::new(QueueOutbox::new()),
            router,
        })
    }
}

pub struct Server {
    handler: Arc<Handler>,
    acceptor: TlsAcceptor,
}

impl Server {
    pub fn new(handler: Arc<Handler>) -> Result<Self> {
        let certs = load_certs(&handler.config.tls_cert_path)?;
        let key = load_key(&handler.config.tls_key_path)?;

        let client_verifier = AnyClientCertVerifier::new();
        let tls_config = rustls::ServerConfig::builder()
            .with_client_cert_verifier(client_verifier)
            .with_single_cert(certs, key)
            .context("building TLS server config")?;

        Ok(Server {
            handler,
            acceptor: TlsAcceptor::from(Arc::new(tls_config)),
        })
    }

    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.handler.config.bind_addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let acceptor = self.acceptor.clone();
            let handler = self.handler.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(acceptor, handler, stream).await {
                    tracing::warn!(%peer, error = %e, "connection failed");
                }
            });
        }
    }
}

async fn handle_connection(
    acceptor: TlsAcceptor,
    handler: Arc<Handler>,
    stream: TcpStream,
) -> Result<()> {
    let tls_stream = acceptor.accept(stream).await.context("TLS handshake failed")?;

    let peer_cert_der = tls_stream
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|certs| certs.first())
        .map(|c| c.as_ref().to_vec());
    let peer_fingerprint = peer_cert_der.as_deref().map(sha256::digest);

    let mut writer = Writer::new(tls_stream);

    let request_line = read_request_line(&mut writer).await?;
    let (path, raw_query) = parse_gemini_url(&request_line, &handler.domain)?;

    let user = match &peer_fingerprint {
        Some(fp) => Actor::find_by_fingerprint(&handler.db, fp).await?,
        None => None,
    };

    let cancel = CancellationToken::new();
    let req = Request::new(
        path.clone(),
        raw_query,
        user,
        handler.db.clone(),
        cancel,
        peer_cert_der,
        peer_fingerprint,
    );

    dispatch(&handler, &mut writer, &req).await
}

async fn dispatch(handler: &Arc<Handler>, writer: &mut Writer<Conn>, req: &Request) -> Result<()> {
    let _enter = req.span.enter();

    let Some((name, flags, handler_fn, caps)) = handler.router.dispatch(&req.path) else {
        writer.status(51, "Not found").await?;
        return Ok(());
    };

    if flags.requires_auth && req.user.is_none() {
        writer.status(61, "Client certificate required").await?;
        return Ok(());
    }

    let result = handler_fn(handler, writer, req, caps).await;

    match result {
        Ok(()) => {
            if flags.user_menu {
                write_footer_menu(writer, req).await?;
            }
            Ok(())
        }
        Err(e) => {
            if e.is_server_fault() {
                tracing::error!(route = name, error = %e, "handler failed");
            } else {
                tracing::warn!(route = name, error = %e, "handler rejected request");
            }
            let (code, meta) = e.gemini_status();
            writer.status(code, &meta).await?;
            Ok(())
        }
    }
}

async fn write_footer_menu(writer: &mut Writer<Conn>, req: &Request) -> std::io::Result<()> {
    writer.separator().await?;
    writer.link("/users", "Radio").await?;
    writer.link("/users/firehose", "Firehose").await?;
    writer.link("/users/communities", "Communities").await?;
    writer.link("/users/follows/pending", "Pending follows").await?;
    writer.link("/users/followers", "Followers").await?;
    if req.user.is_some() {
        writer.link("/users/fts", "Search").await?;
    }
    Ok(())
}

async fn read_request_line(writer: &mut Writer<Conn>) -> Result<String> {
    use tokio::io::AsyncReadExt;

    let conn = writer.inner_mut();
    let mut buf = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    loop {
        let n = conn.read(&mut byte).await?;
        if n == 0 {
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        if byte[0] != b'\r' {
            buf.push(byte[0]);
        }
        if buf.len() > 1024 {
            anyhow::bail!("request line too long");
        }
    }
    Ok(String::from_utf8(buf).context("request line was not valid UTF-8")?)
}

fn parse_gemini_url(line: &str, domain: &str) -> Result<(String, String)> {
    let url = url::Url::parse(line.trim()).context("malformed request URL")?;
    if url.scheme() != "gemini" {
        anyhow::bail!("unsupported scheme {}", url.scheme());
    }
    if let Some(host) = url.host_str() {
        if host != domain {
            anyhow::bail!("unexpected host {host}");
        }
    }
    Ok((url.path().to_string(), url.query().unwrap_or("").to_string()))
}

fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {path}"))?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("parsing TLS certificate chain")
}

fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {path}"))?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .context("parsing TLS private key")?
        .context("no private key found")
}

/// Accepts any client certificate without chain verification: Gemini
/// clients self-sign, and identity is pinned later by SHA-256 fingerprint
/// lookup rather than by a certificate authority.
#[derive(Debug)]
struct AnyClientCertVerifier {
    inner: Arc<dyn ClientCertVerifier>,
}

impl AnyClientCertVerifier {
    fn new() -> Arc<dyn ClientCertVerifier> {
        // WebPkiClientVerifier requires at least one root even when every
        // check that matters is overridden below; an empty root store
        // paired with `allow_unauthenticated` is the idiomatic rustls way
        // to say "certificates are optional and never chain-verified".
        let roots = Arc::new(rustls::RootCertStore::empty());
        let fallback = WebPkiClientVerifier::builder(roots)
            .allow_unauthenticated()
            .build()
            .expect("building a permissive client verifier");
        Arc::new(AnyClientCertVerifier { inner: fallback })
    }
}

impl ClientCertVerifier for AnyClientCertVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[rustls::DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
