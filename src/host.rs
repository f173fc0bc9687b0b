//! Target validation performed before any network or browser work.
//!
//! This is a best-effort SSRF guard matching on the literal host text. It does
//! not resolve DNS, so rebinding is not covered, and IPv6 loopback/private
//! forms (`[::1]`, `fc00::/7`) pass through.

use crate::{Error, Result};
use url::Url;

const FORBIDDEN_PREFIXES: &[&str] = &["127.", "10.", "192.168.", "169.254."];

/// Parse `target` and check scheme and host.
///
/// Returns the parsed URL on success. Fails with
/// [`Error::InvalidProtocol`] for anything but `http`/`https`, or
/// [`Error::ForbiddenHost`] for loopback, private, and link-local hosts.
pub fn validate_target(target: &str) -> Result<Url> {
    let url = Url::parse(target.trim())
        .map_err(|e| Error::InvalidProtocol(format!("{} ({})", target, e)))?;
    validate_url(&url)?;
    Ok(url)
}

/// Validate an already-parsed URL (used again for every redirect hop).
pub fn validate_url(url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(Error::InvalidProtocol(format!("{}:", other))),
    }

    let host = url
        .host_str()
        .ok_or_else(|| Error::ForbiddenHost(String::from("(none)")))?
        .to_ascii_lowercase();

    if host == "localhost" || FORBIDDEN_PREFIXES.iter().any(|p| host.starts_with(p)) {
        return Err(Error::ForbiddenHost(host));
    }
    Ok(())
}
