mod http;
mod https;

use std::fmt::Display;

use async_trait::async_trait;
pub use http::HttpNegotiator;
pub use https::HttpsNegotiator;
use hyper::Uri;
use tokio::net::TcpStream;

use crate::proxy::models::ProxyAddr;

/// Prepares a freshly opened proxy connection before the HTTP exchange.
#[async_trait]
pub trait NegotiatorTrait {
    #[allow(unused_variables)]
    async fn negotiate(
        &self,
        stream: &mut TcpStream,
        proxy: &ProxyAddr,
        uri: &Uri,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Whether the request must be wrapped in TLS after negotiation.
    fn with_tls(&self) -> bool {
        false
    }

    /// Whether the request line must carry the absolute URI.
    fn absolute_form(&self) -> bool {
        false
    }

    fn log_trace<S>(&self, proxy: &ProxyAddr, msg: S)
    where
        S: Display,
        Self: Sized,
    {
        #[cfg(feature = "log")]
        log::trace!("{}: {}", proxy.as_text(), msg);
    }
}

/// Picks the negotiator for a target URI.
pub fn for_uri(uri: &Uri) -> Box<dyn NegotiatorTrait + Send + Sync> {
    if uri.scheme_str() == Some("https") {
        Box::new(HttpsNegotiator)
    } else {
        Box::new(HttpNegotiator)
    }
}
