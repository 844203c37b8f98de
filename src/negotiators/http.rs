use async_trait::async_trait;

use super::NegotiatorTrait;

/// A negotiator for plain HTTP forward proxies.
///
/// Nothing is exchanged up front; the proxy reads the absolute URI from the
/// request line.
pub struct HttpNegotiator;

#[async_trait]
impl NegotiatorTrait for HttpNegotiator {
    fn absolute_form(&self) -> bool {
        true
    }
}
