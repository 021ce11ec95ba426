use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::collections::HashMap;
use url::Url;

use crate::error::{Error, Result};
use crate::rag::types::Document;

/// Crawls hyperlinks reachable from a seed URL up to `max_depth` hops,
/// staying on the seed's origin, and converts each page to plain text.
/// Re-invocable with the same arguments; not incremental.
pub struct PageLoader {
    client: reqwest::Client,
}

impl PageLoader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("takki/0.2")
            .build()
            .map_err(|e| Error::validation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch the seed page and every same-origin page up to `max_depth` hops
    /// away. A failing root fetch aborts the load; failures further into the
    /// crawl are logged and skipped.
    pub async fn load(&self, url: &str, max_depth: usize) -> Result<Vec<Document>> {
        let root = validate_url(url)?;

        let mut documents = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(Url, usize)> = VecDeque::new();

        visited.insert(root.as_str().to_string());
        queue.push_back((root.clone(), 0));

        while let Some((page_url, depth)) = queue.pop_front() {
            let html = match self.fetch(&page_url).await {
                Ok(html) => html,
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", page_url, e);
                    continue;
                }
            };

            if depth < max_depth {
                for link in extract_links(&html, &page_url) {
                    if !same_origin(&root, &link) {
                        continue;
                    }
                    if visited.insert(link.as_str().to_string()) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            let text = html_to_text(&html);
            let mut metadata = HashMap::new();
            metadata.insert(
                "source".to_string(),
                serde_json::Value::String(page_url.as_str().to_string()),
            );
            metadata.insert(
                "depth".to_string(),
                serde_json::Value::Number(depth.into()),
            );
            documents.push(Document {
                source_url: page_url.as_str().to_string(),
                text,
                metadata,
            });
        }

        Ok(documents)
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Error::fetch(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(Error::fetch(
                url.as_str(),
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| Error::fetch(url.as_str(), e))
    }
}

pub fn validate_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("URL cannot be empty"));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(Error::validation(format!(
            "invalid URL: must start with http:// or https://, got: {trimmed}"
        )));
    }
    Url::parse(trimmed).map_err(|e| Error::validation(format!("invalid URL {trimmed}: {e}")))
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 120)
}

fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    // href attributes only; fragments and non-http schemes are dropped
    let href_re = Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("static regex");
    let mut links = Vec::new();
    for capture in href_re.captures_iter(html) {
        let raw = &capture[1];
        if raw.starts_with('#') {
            continue;
        }
        let Ok(mut resolved) = base.join(raw) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        resolved.set_fragment(None);
        links.push(resolved);
    }
    links
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_scheme() {
        for url in ["example.com", "www.example.com", "/path", "ftp://example.com"] {
            assert!(validate_url(url).is_err(), "{url} should be invalid");
        }
    }

    #[test]
    fn validate_accepts_http_and_https() {
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("https://example.com/page?q=1").is_ok());
    }

    #[test]
    fn links_resolve_relative_to_base() {
        let base = Url::parse("https://example.com/docs/index.html").unwrap();
        let html = r#"<a href="guide.html">guide</a> <a href="/about">about</a>"#;
        let links = extract_links(html, &base);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].as_str(), "https://example.com/docs/guide.html");
        assert_eq!(links[1].as_str(), "https://example.com/about");
    }

    #[test]
    fn links_drop_fragments_and_foreign_schemes() {
        let base = Url::parse("https://example.com/").unwrap();
        let html = r##"<a href="#top">top</a> <a href="mailto:x@example.com">mail</a>
            <a href="/page#section">page</a>"##;
        let links = extract_links(html, &base);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_str(), "https://example.com/page");
    }

    #[test]
    fn same_origin_compares_scheme_host_port() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("https://example.com:443/b").unwrap();
        let c = Url::parse("https://other.com/").unwrap();
        let d = Url::parse("http://example.com/").unwrap();
        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
        assert!(!same_origin(&a, &d));
    }

    #[test]
    fn html_is_stripped_to_plain_text() {
        let text = html_to_text("<html><body><p>Hello <b>world</b></p></body></html>");
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains('<'));
    }
}
