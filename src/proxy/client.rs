use std::{
    error::Error,
    fmt::{Debug, Display},
};

use anyhow::Context;
use hyper::{
    body::{Body, Incoming},
    client::conn::http1::handshake,
    header::{HeaderValue, HOST},
    Request, Response, Uri,
};
use hyper_util::rt::TokioIo;
use native_tls::TlsConnector;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time,
};

use crate::{negotiators, proxy::models::ProxyAddr};

/// A client that sends a single request through an HTTP proxy over raw
/// sockets, without any ambient proxy discovery.
#[derive(Debug)]
pub struct ProxyClient {
    pub proxy: ProxyAddr,
    accept_invalid_certs: bool,
}

impl ProxyClient {
    pub fn new(proxy: ProxyAddr) -> Self {
        Self {
            proxy,
            accept_invalid_certs: false,
        }
    }

    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Establishes a TCP connection to the proxy server.
    async fn connect(&self) -> anyhow::Result<TcpStream> {
        let start_time = time::Instant::now();
        self.log_trace("Starting TCP connection");

        let tcp_stream = TcpStream::connect((self.proxy.host.as_str(), self.proxy.port))
            .await
            .with_context(|| format!("failed to connect to proxy {}", self.proxy.as_text()))?;

        self.log_trace(format!("Connected in {:?}", start_time.elapsed()));
        Ok(tcp_stream)
    }

    /// Wraps the tunneled stream in TLS for `domain`, then sends `req`.
    pub async fn send_with_tls<B>(
        &self,
        req: Request<B>,
        stream: TcpStream,
        domain: &str,
    ) -> anyhow::Result<Response<Incoming>>
    where
        B: Body + 'static + Debug + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        self.log_trace("Starting TLS handshake");
        let start_time = time::Instant::now();

        let tls_connector = TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;
        let connector = tokio_native_tls::TlsConnector::from(tls_connector);
        let tls_stream = connector.connect(domain, stream).await?;
        self.log_trace(format!("TLS established in {:?}", start_time.elapsed()));

        self.exchange(req, tls_stream).await
    }

    /// Sends `req` over the plain proxy connection.
    pub async fn send_without_tls<B>(
        &self,
        req: Request<B>,
        stream: TcpStream,
    ) -> anyhow::Result<Response<Incoming>>
    where
        B: Body + 'static + Debug + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        self.exchange(req, stream).await
    }

    async fn exchange<B, S>(&self, req: Request<B>, stream: S) -> anyhow::Result<Response<Incoming>>
    where
        B: Body + 'static + Debug + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);
        let (mut sender, conn) = handshake(io).await?;

        let addr = self.proxy.as_text();
        tokio::task::spawn(async move {
            if let Err(err) = conn.await {
                #[cfg(feature = "log")]
                log::trace!("{}: Connection error: {}", addr, err);
            }
        });

        self.log_trace(format!("Sending request: {} {}", req.method(), req.uri()));
        let start_time = time::Instant::now();
        let response = sender.send_request(req).await?;
        self.log_trace(format!(
            "Got {} in {:?}",
            response.status(),
            start_time.elapsed()
        ));
        Ok(response)
    }

    /// Sends a request through the proxy.
    ///
    /// `https` targets go through a `CONNECT` tunnel followed by TLS; `http`
    /// targets are forwarded with an absolute-form request line.
    pub async fn send_request<B>(&self, req: Request<B>) -> anyhow::Result<Response<Incoming>>
    where
        B: Body + 'static + Debug + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let Some(domain) = req.uri().host().map(str::to_string) else {
            anyhow::bail!("request URI {} has no host", req.uri());
        };
        let negotiator = negotiators::for_uri(req.uri());
        let mut stream = self.connect().await?;

        if let Err(e) = negotiator
            .negotiate(&mut stream, &self.proxy, req.uri())
            .await
        {
            anyhow::bail!("Failed to negotiate: {}", e);
        }

        let req = prepare_request(req, negotiator.absolute_form())?;
        if negotiator.with_tls() {
            self.send_with_tls(req, stream, &domain).await
        } else {
            self.send_without_tls(req, stream).await
        }
    }

    pub fn log_trace<S>(&self, msg: S)
    where
        S: Display,
    {
        #[cfg(feature = "log")]
        log::trace!("{}: {}", self.proxy.as_text(), msg);
    }
}

/// Adds the `Host` header and, unless the proxy needs the absolute URI,
/// rewrites the request target to origin-form.
fn prepare_request<B>(req: Request<B>, absolute_form: bool) -> anyhow::Result<Request<B>> {
    let (mut parts, body) = req.into_parts();
    if !parts.headers.contains_key(HOST) {
        if let Some(authority) = parts.uri.authority() {
            parts
                .headers
                .insert(HOST, HeaderValue::from_str(authority.as_str())?);
        }
    }
    if !absolute_form {
        let origin = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        parts.uri = origin.parse::<Uri>()?;
    }
    Ok(Request::from_parts(parts, body))
}
