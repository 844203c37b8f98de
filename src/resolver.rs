//! Proxy selection from the standard proxy environment variables.
//!
//! This is the only place in the crate that looks at `HTTP_PROXY`,
//! `HTTPS_PROXY`, `ALL_PROXY` and `NO_PROXY`; everything else receives a
//! [`ResolvedProxy`].

use std::collections::HashMap;

use reqwest::Url;

use crate::proxy::models::ResolvedProxy;

/// Read access to environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&'static str, &'static str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| value.to_string())
    }
}

/// Resolves which proxy, if any, applies to a target URL.
#[derive(Debug, Clone, Default)]
pub struct ProxyResolver<E = SystemEnv> {
    env: E,
}

impl ProxyResolver<SystemEnv> {
    pub fn from_env() -> Self {
        Self { env: SystemEnv }
    }
}

impl<E: EnvSource> ProxyResolver<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }

    /// Looks up a variable in its uppercase and lowercase spelling.
    ///
    /// The uppercase form wins when both are set. Empty values count as unset.
    fn lookup(&self, name: &str) -> Option<String> {
        [name.to_ascii_uppercase(), name.to_ascii_lowercase()]
            .iter()
            .filter_map(|key| self.env.var(key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    /// Returns the proxy for `endpoint`, or [`ResolvedProxy::Direct`].
    ///
    /// Never fails: a URL without a host, an excluded host and a missing
    /// proxy variable all resolve to a direct connection.
    pub fn resolve(&self, endpoint: &Url) -> ResolvedProxy {
        let host = match endpoint.host_str() {
            Some(host) if !host.is_empty() => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_ascii_lowercase(),
            _ => return ResolvedProxy::Direct,
        };
        let scheme = endpoint.scheme();
        let port = endpoint.port_or_known_default();

        if let Some(no_proxy) = self.lookup("no_proxy") {
            if is_excluded(&no_proxy, &host, port) {
                #[cfg(feature = "log")]
                log::debug!("{}: excluded by NO_PROXY", host);
                return ResolvedProxy::Direct;
            }
        }

        let proxy = self
            .lookup(&format!("{}_proxy", scheme))
            .or_else(|| self.lookup("all_proxy"));

        match proxy {
            Some(proxy) if proxy.contains("://") => ResolvedProxy::Via(proxy),
            Some(proxy) => ResolvedProxy::Via(format!("{}://{}", scheme, proxy)),
            None => ResolvedProxy::Direct,
        }
    }

    /// Effective values of the proxy variables, for display.
    pub fn environment(&self) -> Vec<(&'static str, Option<String>)> {
        ["HTTPS_PROXY", "HTTP_PROXY", "NO_PROXY"]
            .into_iter()
            .map(|name| (name, self.lookup(name)))
            .collect()
    }

    /// Distinct proxies configured in `HTTPS_PROXY` and `HTTP_PROXY`, with
    /// `http://` assumed when the value has no scheme.
    pub fn proxies(&self) -> Vec<(&'static str, String)> {
        let mut proxies: Vec<(&'static str, String)> = Vec::new();
        for name in ["HTTPS_PROXY", "HTTP_PROXY"] {
            let Some(value) = self.lookup(name) else {
                continue;
            };
            let url = if value.contains("://") {
                value
            } else {
                format!("http://{}", value)
            };
            if !proxies.iter().any(|(_, known)| *known == url) {
                proxies.push((name, url));
            }
        }
        proxies
    }
}

/// Checks `host`/`port` against a `NO_PROXY` list.
fn is_excluded(no_proxy: &str, host: &str, port: Option<u16>) -> bool {
    no_proxy
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .any(|entry| {
            if entry == "*" {
                return true;
            }

            let (pattern, entry_port) = split_port(entry);
            if let Some(entry_port) = entry_port {
                if Some(entry_port) != port {
                    return false;
                }
            }

            // Plain entries match the exact host; `.x` and `*.x` match by suffix.
            let pattern = pattern.to_ascii_lowercase();
            match pattern.strip_prefix('*') {
                Some(suffix) => host.ends_with(suffix),
                None if pattern.starts_with('.') => host.ends_with(&pattern),
                None => host == pattern,
            }
        })
}

/// Splits an optional trailing `:port` off a `NO_PROXY` entry.
fn split_port(entry: &str) -> (&str, Option<u16>) {
    if let Some(rest) = entry.strip_prefix('[') {
        // [::1]:8080
        if let Some((addr, tail)) = rest.split_once(']') {
            return (addr, tail.strip_prefix(':').and_then(|p| p.parse().ok()));
        }
    }
    match entry.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (entry, None),
        },
        _ => (entry, None),
    }
}
