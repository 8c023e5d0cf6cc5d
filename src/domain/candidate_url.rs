use serde::Serialize;
use url::{ParseError, Url};

/// A URL proposed by discovery that points at the target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidateUrl(String);

impl CandidateUrl {
    /// Accepts http(s) URLs whose host is `site_domain` or one of its
    /// subdomains. Scheme-less input such as `www.linkedin.com/in/x` is read
    /// as https.
    pub fn parse(raw: &str, site_domain: &str) -> Option<Self> {
        let raw = raw.trim();
        let (raw, parsed_url) = match Url::parse(raw) {
            Ok(parsed_url) => (raw.to_string(), parsed_url),
            Err(ParseError::RelativeUrlWithoutBase) => {
                let absolute = format!("https://{}", raw.trim_start_matches('/'));
                let parsed_url = Url::parse(&absolute).ok()?;
                (absolute, parsed_url)
            }
            Err(_) => return None,
        };

        if !matches!(parsed_url.scheme(), "http" | "https") {
            return None;
        }

        let host = parsed_url.host_str()?.to_lowercase();
        let site_domain = site_domain.trim().to_lowercase();
        let on_site = host == site_domain || host.ends_with(&format!(".{}", site_domain));

        on_site.then_some(CandidateUrl(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_company_page(&self) -> bool {
        self.0.contains("/company/")
    }
}

impl std::fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
