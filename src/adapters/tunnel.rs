use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::{
    body::{Bytes, Incoming},
    header::USER_AGENT,
    Request, Response, Uri,
};
use hyper_tls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::timeout;

use super::{Adapter, AdapterConfig};
use crate::{
    error::AdapterFault,
    models::TestResult,
    proxy::{
        client::ProxyClient,
        models::{ProxyAddr, ResolvedProxy},
    },
};

/// hyper over hand-built sockets: a `CONNECT` tunnel for `https` targets, a
/// forward-proxy request for `http` targets, and a pooled hyper-util client
/// when no proxy is involved.
///
/// Options: `insecure` (bool) skips certificate validation.
pub struct HyperTunnelAdapter;

fn build_request(config: &AdapterConfig) -> anyhow::Result<Request<Empty<Bytes>>> {
    let uri: Uri = config.endpoint.as_str().parse()?;
    Ok(Request::get(uri)
        .header(USER_AGENT, config.user_agent.as_str())
        .body(Empty::<Bytes>::new())?)
}

async fn send_direct(
    req: Request<Empty<Bytes>>,
    insecure: bool,
) -> anyhow::Result<Response<Incoming>> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(insecure)
        .build()?;
    let connector = HttpsConnector::from((http, tokio_native_tls::TlsConnector::from(tls)));
    let client = Client::builder(TokioExecutor::new()).build::<_, Empty<Bytes>>(connector);
    Ok(client.request(req).await?)
}

async fn fetch(config: &AdapterConfig, insecure: bool) -> anyhow::Result<u16> {
    let req = build_request(config)?;
    let response = match &config.proxy {
        ResolvedProxy::Direct => send_direct(req, insecure).await?,
        ResolvedProxy::Via(url) => {
            ProxyClient::new(ProxyAddr::parse(url)?)
                .danger_accept_invalid_certs(insecure)
                .send_request(req)
                .await?
        }
    };

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );
    }
    response.into_body().collect().await?;
    Ok(status.as_u16())
}

#[async_trait]
impl Adapter for HyperTunnelAdapter {
    fn name(&self) -> &'static str {
        "hyper-tunnel"
    }

    fn method(&self, proxied: bool) -> String {
        if proxied {
            "hyper + proxy tunnel".into()
        } else {
            "hyper (no proxy)".into()
        }
    }

    async fn run(&self, config: &AdapterConfig) -> Result<TestResult, AdapterFault> {
        let insecure = config.option_bool("insecure")?.unwrap_or(false);
        let method = self.method(!config.proxy.is_direct());

        let result = match timeout(config.timeout, fetch(config, insecure)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("timed out after {:?}", config.timeout)),
        };

        Ok(match result {
            Ok(status) => TestResult::passed(method, status, &config.proxy, &config.endpoint),
            Err(e) => {
                #[cfg(feature = "log")]
                if config.verbose {
                    log::error!("{}: {:?}", method, e);
                }
                TestResult::from_error(method, &e, &config.proxy, &config.endpoint)
            }
        })
    }
}
