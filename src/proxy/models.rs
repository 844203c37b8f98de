use std::fmt::Display;

use serde::{Serialize, Serializer};

/// Outcome of proxy resolution for a single endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResolvedProxy {
    /// Connect to the endpoint directly.
    #[default]
    Direct,
    /// Route through the given proxy URL.
    Via(String),
}

impl ResolvedProxy {
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }
}

impl Display for ResolvedProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "none"),
            Self::Via(url) => write!(f, "{}", url),
        }
    }
}

impl Serialize for ResolvedProxy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Host and port of an `http://` proxy, parsed from a resolved proxy URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddr {
    pub host: String,
    pub port: u16,
}

impl ProxyAddr {
    /// Parses a proxy URL into a socket address.
    ///
    /// Only plain `http://` proxies are accepted; anything else is reported
    /// as an error so the caller can turn it into a failed test result.
    pub fn parse(proxy_url: &str) -> anyhow::Result<Self> {
        let url = reqwest::Url::parse(proxy_url)?;
        if url.scheme() != "http" {
            anyhow::bail!(
                "unsupported proxy scheme '{}', only http:// proxies can be tunneled",
                url.scheme()
            );
        }
        let host = match url.host_str() {
            Some(host) => host.trim_start_matches('[').trim_end_matches(']'),
            None => anyhow::bail!("proxy URL {} has no host", proxy_url),
        };
        Ok(Self {
            host: host.to_string(),
            port: url.port_or_known_default().unwrap_or(80),
        })
    }

    /// Returns the proxy in `<host>:<port>` format.
    pub fn as_text(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
