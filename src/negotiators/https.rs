use async_trait::async_trait;
use hyper::Uri;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use super::NegotiatorTrait;
use crate::proxy::models::ProxyAddr;

const MAX_RESPONSE_HEAD: usize = 8192;

/// A negotiator that opens an HTTP `CONNECT` tunnel through the proxy.
pub struct HttpsNegotiator;

impl HttpsNegotiator {
    /// Generates a CONNECT request to be sent to the proxy server.
    fn generate_connect_request(&self, authority: &str) -> String {
        format!(
            "CONNECT {} HTTP/1.1\r\nHost: {}\r\nProxy-Connection: keep-alive\r\n\r\n",
            authority, authority
        )
    }
}

/// Reads from `stream` until the end of the response head.
async fn read_response_head(stream: &mut TcpStream) -> anyhow::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(512);
    let mut buf = [0; 512];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            anyhow::bail!("proxy closed the connection during CONNECT");
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(head);
        }
        if head.len() > MAX_RESPONSE_HEAD {
            anyhow::bail!("CONNECT response head exceeds {} bytes", MAX_RESPONSE_HEAD);
        }
    }
}

#[async_trait]
impl NegotiatorTrait for HttpsNegotiator {
    async fn negotiate(
        &self,
        stream: &mut TcpStream,
        proxy: &ProxyAddr,
        uri: &Uri,
    ) -> anyhow::Result<()> {
        if uri.scheme_str() != Some("https") {
            anyhow::bail!("Scheme is empty or not https");
        }
        let Some(host) = uri.host() else {
            anyhow::bail!("URI {} has no host", uri);
        };
        let authority = format!("{}:{}", host, uri.port_u16().unwrap_or(443));

        self.log_trace(proxy, format!("Sending CONNECT for {}", authority));
        stream
            .write_all(self.generate_connect_request(&authority).as_bytes())
            .await?;

        let head = read_response_head(stream).await?;
        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut response = httparse::Response::new(&mut headers);
        response.parse(&head)?;

        let code = response.code.unwrap_or_default();
        if code != 200 {
            anyhow::bail!(
                "Proxy answered CONNECT with {}: {}",
                code,
                response.reason.unwrap_or("Unknown reason")
            );
        }
        self.log_trace(proxy, "Tunnel established");
        Ok(())
    }

    fn with_tls(&self) -> bool {
        true
    }
}
