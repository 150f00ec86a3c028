//! Output folder layout derived from a URL's domain.

use log::{debug, trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use url::{Host, Url};

static UNSAFE_DOMAIN_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-.]").unwrap());
static HYPHEN_BEFORE_LAST_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+\.([^.]+)$").unwrap());

const LOCALHOST: &str = "localhost";

/// A host split at its public suffix
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainParts {
    pub subdomain: String,
    pub domain: String,
    pub suffix: String,
}

impl DomainParts {
    /// `domain.suffix`, or just the domain when there is no known suffix
    pub fn registrable(&self) -> String {
        if self.suffix.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.domain, self.suffix)
        }
    }
}

/// Split the URL's host into subdomain, registrable label and public suffix.
/// Returns `None` when the URL does not parse or has no host.
pub fn extract_domain(url: &str) -> Option<DomainParts> {
    let parsed = Url::parse(url).ok()?;
    match parsed.host()? {
        Host::Domain(host) => Some(split_host(&host.to_ascii_lowercase())),
        Host::Ipv4(ip) => Some(DomainParts {
            domain: ip.to_string(),
            ..Default::default()
        }),
        Host::Ipv6(ip) => Some(DomainParts {
            domain: ip.to_string(),
            ..Default::default()
        }),
    }
}

fn split_host(host: &str) -> DomainParts {
    let host = host.trim_end_matches('.');
    let Some(registrable) = psl::domain_str(host) else {
        // single label hosts such as `localhost` have no registrable part
        return DomainParts {
            domain: host.to_string(),
            ..Default::default()
        };
    };
    let suffix = psl::suffix_str(registrable).unwrap_or_default();
    let domain = registrable
        .strip_suffix(suffix)
        .map(|label| label.trim_end_matches('.'))
        .unwrap_or(registrable);
    let subdomain = host[..host.len() - registrable.len()].trim_end_matches('.');

    DomainParts {
        subdomain: subdomain.to_string(),
        domain: domain.to_string(),
        suffix: suffix.to_string(),
    }
}

/// Make one path segment safe for the filesystem
pub fn sanitize_domain_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = UNSAFE_DOMAIN_CHARS.replace_all(&lowered, "_");
    let collapsed = HYPHEN_BEFORE_LAST_DOT.replace(&replaced, "-$1");
    collapsed.trim_matches('_').to_string()
}

/// Relative folder for a URL: `subdomain/domain.suffix`, `domain.suffix`,
/// `localhost`, or `fallback` when no domain can be extracted
pub fn build_domain_path(url: &str, include_subdomains: bool, fallback: &str) -> String {
    trace!("Building domain path for {}", url);

    let Some(parts) = extract_domain(url).filter(|parts| !parts.domain.is_empty()) else {
        warn!("No domain in '{}', using fallback folder '{}'", url, fallback);
        return fallback.to_string();
    };

    if parts.domain == LOCALHOST {
        return LOCALHOST.to_string();
    }

    let mut segments = Vec::with_capacity(2);
    if include_subdomains && !parts.subdomain.is_empty() {
        segments.push(sanitize_domain_name(&parts.subdomain));
    }
    segments.push(sanitize_domain_name(&parts.registrable()));
    segments.retain(|segment| !segment.is_empty());

    if segments.is_empty() {
        return fallback.to_string();
    }
    let path = segments.join("/");
    debug!("Domain path for {}: {}", url, path);
    path
}
