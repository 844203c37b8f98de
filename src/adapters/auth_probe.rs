use async_trait::async_trait;
use reqwest::StatusCode;

use super::{reqwest_client::build_client, Adapter, AdapterConfig};
use crate::{error::AdapterFault, models::TestResult};

const PROBE_USER: &str = "proxydiag";
const PROBE_PASSWORD: &str = "not-a-real-secret";

/// Deliberate-failure probe.
///
/// Sends a request with dummy credentials to an endpoint that is expected to
/// refuse them. Getting the expected rejection (`expectedStatus`, 401 by
/// default) proves the request crossed the proxy and reached the service, so
/// it counts as a pass. A 2xx answer or any other error counts as a failure.
pub struct AuthProbeAdapter;

fn expected_status(config: &AdapterConfig) -> Result<StatusCode, AdapterFault> {
    let Some(code) = config.option_u64("expectedStatus")? else {
        return Ok(StatusCode::UNAUTHORIZED);
    };
    u16::try_from(code)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .filter(|status| !status.is_success())
        .ok_or_else(|| AdapterFault::InvalidOption {
            option: "expectedStatus".into(),
            reason: format!("{} is not a valid non-2xx HTTP status", code),
        })
}

#[async_trait]
impl Adapter for AuthProbeAdapter {
    fn name(&self) -> &'static str {
        "auth-probe"
    }

    fn method(&self, proxied: bool) -> String {
        if proxied {
            "reqwest auth probe + proxy".into()
        } else {
            "reqwest auth probe (no proxy)".into()
        }
    }

    async fn run(&self, config: &AdapterConfig) -> Result<TestResult, AdapterFault> {
        let expected = expected_status(config)?;
        let method = self.method(!config.proxy.is_direct());

        let client = match build_client(config)? {
            Ok(client) => client,
            Err(e) => return Ok(TestResult::from_error(method, &e, &config.proxy, &config.endpoint)),
        };

        let response = client
            .get(config.endpoint.clone())
            .basic_auth(PROBE_USER, Some(PROBE_PASSWORD))
            .send()
            .await;

        Ok(match response {
            Ok(response) if response.status() == expected => TestResult::passed(
                method,
                format!("{} (expected)", expected.as_u16()),
                &config.proxy,
                &config.endpoint,
            ),
            Ok(response) if response.status().is_success() => TestResult::failed(
                method,
                format!(
                    "not supposed to succeed here (got {}, expected {})",
                    response.status().as_u16(),
                    expected.as_u16()
                ),
                &config.proxy,
                &config.endpoint,
            ),
            Ok(response) => TestResult::failed(
                method,
                format!(
                    "HTTP {}: {} (expected {})",
                    response.status().as_u16(),
                    response.status().canonical_reason().unwrap_or("Unknown"),
                    expected.as_u16()
                ),
                &config.proxy,
                &config.endpoint,
            ),
            Err(e) => {
                let e = anyhow::Error::new(e);
                #[cfg(feature = "log")]
                if config.verbose {
                    log::error!("{}: {:?}", method, e);
                }
                TestResult::from_error(method, &e, &config.proxy, &config.endpoint)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Url;
    use serde_json::Value;

    use super::*;
    use crate::proxy::models::ResolvedProxy;

    fn config_with(status: Value) -> AdapterConfig {
        let mut config = AdapterConfig::new(
            Url::parse("https://example.test/").unwrap(),
            ResolvedProxy::Direct,
        );
        config.options.insert("expectedStatus".into(), status);
        config
    }

    #[test]
    fn test_expected_status_default() {
        let config = AdapterConfig::new(
            Url::parse("https://example.test/").unwrap(),
            ResolvedProxy::Direct,
        );
        assert_eq!(expected_status(&config).unwrap(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_expected_status_override() {
        assert_eq!(
            expected_status(&config_with(Value::from(403))).unwrap(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_expected_status_rejects_garbage() {
        assert!(expected_status(&config_with(Value::from(70000))).is_err());
        assert!(expected_status(&config_with(Value::from(200))).is_err());
        assert!(expected_status(&config_with(Value::from("401"))).is_err());
    }
}
