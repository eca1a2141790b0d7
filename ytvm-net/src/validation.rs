// ytvm-net/src/validation.rs
use url::{Host, Url};
use ytvm_common::error::{Result, YtvmError};

/// Validates a URL, ensuring it uses the HTTPS scheme.
///
/// Plain `http` is accepted for loopback hosts, or anywhere when
/// `allow_insecure` is set.
pub fn validate_url(url_str: &str, allow_insecure: bool) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| YtvmError::ValidationError(format!("Failed to parse URL '{url_str}': {e}")))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if allow_insecure || is_loopback(&url) => {
            tracing::debug!("Accepting plain http URL {}", url);
            Ok(url)
        }
        scheme => Err(YtvmError::ValidationError(format!(
            "Invalid URL scheme for '{url_str}': Must be https, but got '{scheme}'"
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
