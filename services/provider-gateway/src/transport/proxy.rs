//! Provider-aware egress proxy selection.
//!
//! Different providers may need different egress routes; the selection
//! policy is supplied by the host service.

use std::collections::HashMap;
use url::Url;

/// Selects the egress proxy for a provider.
pub trait ProxySelector: Send + Sync {
    /// The proxy to route `provider_key` traffic through, if any.
    fn proxy_for(&self, provider_key: &str) -> Option<Url>;
}

/// Static provider-to-proxy mapping with an optional catch-all.
#[derive(Debug, Default, Clone)]
pub struct StaticProxySelector {
    routes: HashMap<String, Url>,
    fallback: Option<Url>,
}

impl StaticProxySelector {
    /// Creates an empty selector (no proxying).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes one provider through a proxy.
    #[must_use]
    pub fn with_route(mut self, provider_key: impl Into<String>, proxy: Url) -> Self {
        self.routes.insert(provider_key.into(), proxy);
        self
    }

    /// Routes all unmapped providers through a proxy.
    #[must_use]
    pub fn with_fallback(mut self, proxy: Url) -> Self {
        self.fallback = Some(proxy);
        self
    }
}

impl ProxySelector for StaticProxySelector {
    fn proxy_for(&self, provider_key: &str) -> Option<Url> {
        self.routes
            .get(provider_key)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

/// Direct egress for every provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectProxySelector;

impl ProxySelector for DirectProxySelector {
    fn proxy_for(&self, _provider_key: &str) -> Option<Url> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_selector_routes_by_provider() {
        let selector = StaticProxySelector::new()
            .with_route("PROVIDER_X", Url::parse("http://proxy-x:3128").unwrap())
            .with_fallback(Url::parse("http://proxy-default:3128").unwrap());

        assert_eq!(
            selector.proxy_for("PROVIDER_X").unwrap().as_str(),
            "http://proxy-x:3128/"
        );
        assert_eq!(
            selector.proxy_for("PROVIDER_Y").unwrap().as_str(),
            "http://proxy-default:3128/"
        );
    }

    #[test]
    fn test_direct_selector_never_proxies() {
        assert!(DirectProxySelector.proxy_for("PROVIDER_X").is_none());
    }
}
