use async_trait::async_trait;
use reqwest::{Client, Proxy};

use super::{Adapter, AdapterConfig};
use crate::{error::AdapterFault, models::TestResult, proxy::models::ResolvedProxy};

/// Plain GET through a reqwest client.
pub struct ReqwestAdapter;

/// Builds a reqwest client whose proxy setup is fully explicit.
///
/// `Direct` disables reqwest's own environment lookup, so a direct test can
/// never pick up `HTTPS_PROXY` behind our back. The outer error is a fault,
/// the inner one a bad proxy URL that the caller reports as a failed test.
pub(super) fn build_client(
    config: &AdapterConfig,
) -> Result<anyhow::Result<Client>, AdapterFault> {
    let builder = Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str());

    let builder = match &config.proxy {
        ResolvedProxy::Direct => builder.no_proxy(),
        ResolvedProxy::Via(url) => match Proxy::all(url.as_str()) {
            Ok(proxy) => builder.proxy(proxy),
            Err(e) => {
                return Ok(Err(
                    anyhow::Error::new(e).context(format!("invalid proxy URL {}", url))
                ))
            }
        },
    };

    builder
        .build()
        .map(Ok)
        .map_err(|e| AdapterFault::Client(e.to_string()))
}

async fn fetch(client: &Client, config: &AdapterConfig) -> anyhow::Result<u16> {
    let response = client.get(config.endpoint.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );
    }
    response.bytes().await?;
    Ok(status.as_u16())
}

#[async_trait]
impl Adapter for ReqwestAdapter {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    fn method(&self, proxied: bool) -> String {
        if proxied {
            "reqwest + proxy".into()
        } else {
            "reqwest (no proxy)".into()
        }
    }

    async fn run(&self, config: &AdapterConfig) -> Result<TestResult, AdapterFault> {
        let method = self.method(!config.proxy.is_direct());
        let result = match build_client(config)? {
            Ok(client) => fetch(&client, config).await,
            Err(e) => Err(e),
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
