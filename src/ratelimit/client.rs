//! Client identification and bucket key generation.

use http::HeaderMap;

/// Header set by reverse proxies with the chain of client addresses.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
/// Header set by some reverse proxies with the single client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";
/// Client identifier used when no forwarding header is usable.
pub const UNKNOWN_CLIENT: &str = "unknown";
/// Route key used when the caller does not name one.
pub const DEFAULT_ROUTE_KEY: &str = "default";

/// Derive a client identifier from request headers.
///
/// Takes the first comma-separated entry of `x-forwarded-for`, then
/// `x-real-ip`, then falls back to [`UNKNOWN_CLIENT`]. Values that are empty
/// or not valid visible ASCII count as absent. This never fails.
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, FORWARDED_FOR_HEADER)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(client) = forwarded {
        return client.to_string();
    }

    header_str(headers, REAL_IP_HEADER)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// A key that uniquely identifies one rate limit bucket.
///
/// The route and client parts are kept separate so that pairs can never
/// collide, even when either part contains `:` as IPv6 addresses do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// The logical route or operation being protected
    pub route: String,
    /// The derived client identifier
    pub client: String,
}

impl BucketKey {
    /// Create a bucket key, falling back to [`DEFAULT_ROUTE_KEY`] when no
    /// route is given.
    pub fn new(route: Option<&str>, client: impl Into<String>) -> Self {
        Self {
            route: route.unwrap_or(DEFAULT_ROUTE_KEY).to_string(),
            client: client.into(),
        }
    }

    /// Build the key for a request from its headers.
    pub fn from_headers(route: Option<&str>, headers: &HeaderMap) -> Self {
        Self::new(route, client_identifier(headers))
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.route, self.client)
    }
}
