//! Image URL extraction from free-form post text.
//!
//! Finds links to the source host's images in Markdown/HTML text. A link
//! ends at whitespace or at any quote, paren, bracket or angle bracket, which
//! covers `![alt](url)`, `<img src="url">`, `[url]` and bare links.

use regex::Regex;

/// Characters that terminate a URL in running text.
const URL_BODY: &str = r#"[^\s"'()\[\]<>]+"#;

/// Compiled matcher for one source host.
#[derive(Debug, Clone)]
pub struct UrlExtractor {
    host: String,
    pattern: Regex,
}

impl UrlExtractor {
    pub fn new(host: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"https?://{}/{}",
            regex::escape(host),
            URL_BODY
        ))?;
        Ok(Self {
            host: host.to_string(),
            pattern,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Distinct image URLs in first-occurrence order, all `https://`.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for m in self.pattern.find_iter(text) {
            let url = normalize_scheme(m.as_str());
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

fn normalize_scheme(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}
