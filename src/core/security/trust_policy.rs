use reqwest::Url;

use crate::core::config::SyncConfig;

/// Reasons a source URL is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrustError {
    #[error("Cannot parse URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("URL '{url}' must use https (got '{scheme}')")]
    InsecureScheme { url: String, scheme: String },

    #[error("URL '{url}' has no host")]
    MissingHost { url: String },

    #[error("Host '{host}' is not in the trusted domain list")]
    UntrustedHost { host: String },
}

/// Allow-list gate evaluated before any network call.
///
/// A host is trusted when it equals an allow-listed domain or is a subdomain
/// of one (`raw.githubusercontent.com` under `githubusercontent.com`).
/// Matching is case-insensitive and only on label boundaries.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    trusted_domains: Vec<String>,
    require_https: bool,
}

impl TrustPolicy {
    pub fn new<I, S>(trusted_domains: I, require_https: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            trusted_domains: trusted_domains
                .into_iter()
                .map(|d| normalize_domain(d.as_ref()))
                .filter(|d| !d.is_empty())
                .collect(),
            require_https,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(&config.trusted_domains, config.require_https)
    }

    pub fn trusted_domains(&self) -> &[String] {
        &self.trusted_domains
    }

    pub fn requires_https(&self) -> bool {
        self.require_https
    }

    pub fn is_trusted(&self, url: &str) -> bool {
        self.check(url).is_ok()
    }

    /// Validate `url` and return it parsed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use prompt_registry_server::core::security::TrustPolicy;
    ///
    /// let policy = TrustPolicy::new(["githubusercontent.com"], true);
    /// assert!(policy.check("https://raw.githubusercontent.com/a/b.json").is_ok());
    /// assert!(policy.check("http://raw.githubusercontent.com/a/b.json").is_err());
    /// ```
    pub fn check(&self, url: &str) -> Result<Url, TrustError> {
        let parsed = Url::parse(url).map_err(|e| TrustError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if self.require_https && parsed.scheme() != "https" {
            return Err(TrustError::InsecureScheme {
                url: url.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }

        let host = parsed
            .host_str()
            .map(normalize_domain)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TrustError::MissingHost {
                url: url.to_string(),
            })?;

        if !self.trusted_domains.iter().any(|d| host_matches(&host, d)) {
            return Err(TrustError::UntrustedHost { host });
        }

        Ok(parsed)
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Equal to `domain`, or ends with `.domain`
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
