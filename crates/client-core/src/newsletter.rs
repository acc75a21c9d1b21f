use serde::{Deserialize, Serialize};
use url::Url;

/// A registry entry. `name` is always derived from `url` and never read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterEntry {
    /// Signup page as stored by the service.
    pub url: String,
    /// Host of `url` without a leading `www.`.
    pub name: String,
}

impl NewsletterEntry {
    /// Build an entry, deriving `name` from `url`.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = display_name(&url);
        Self { url, name }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlProblem {
    Empty,
    Unparseable(String),
    UnsupportedScheme(String),
    MissingHost,
}

impl std::fmt::Display for UrlProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlProblem::Empty => f.write_str("url is empty"),
            UrlProblem::Unparseable(err) => write!(f, "url does not parse: {err}"),
            UrlProblem::UnsupportedScheme(scheme) => {
                write!(f, "unsupported scheme {scheme:?} (expected http or https)")
            }
            UrlProblem::MissingHost => f.write_str("url has no host"),
        }
    }
}

/// Local syntactic check for a newsletter URL. Returns the trimmed input on success.
pub fn validate_url(raw: &str) -> Result<String, UrlProblem> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlProblem::Empty);
    }
    let parsed = Url::parse(trimmed).map_err(|err| UrlProblem::Unparseable(err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlProblem::UnsupportedScheme(parsed.scheme().to_string()));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(trimmed.to_string()),
        _ => Err(UrlProblem::MissingHost),
    }
}

/// Hostname without a leading `www.`; falls back to the raw string for unparseable input.
pub fn display_name(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return url.trim().to_string();
    };
    match parsed.host_str() {
        Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
        None => url.trim().to_string(),
    }
}

/// Build entries from a transported URL array, dropping blanks and later duplicates.
pub fn entries_from_urls<I, S>(urls: I) -> Vec<NewsletterEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<NewsletterEntry> = Vec::new();
    for url in urls {
        let url = url.as_ref().trim();
        if url.is_empty() || out.iter().any(|e| e.url == url) {
            continue;
        }
        out.push(NewsletterEntry::from_url(url));
    }
    out
}
