//! Web tools - search and fetch
//!
//! Both tools swallow their own failures: any network or parsing problem is
//! reported as the tool's text result so the loop can hand it to the model.

use std::time::Duration;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;
use crate::Result;
use crate::error::Error;
use super::{required_str, truncate_output, Tool};

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_SEARCH_RESULTS: usize = 5;
const MAX_FETCH_CHARS: usize = 5_000;

/// Web search through the DuckDuckGo HTML endpoint
pub struct SearchWebTool {
    client: Client,
    endpoint: String,
}

impl SearchWebTool {
    pub fn new() -> Self {
        Self::with_endpoint(DUCKDUCKGO_HTML_URL)
    }

    /// Point the tool at another DuckDuckGo-compatible endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    async fn search(&self, query: &str) -> Result<String> {
        let response = self.client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .header("User-Agent", USER_AGENT)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("HTTP {}", status)));
        }

        let html = response.text().await?;
        let results = extract_search_results(&html)?;
        debug!("Search for {:?} returned {} results", query, results.len());

        if results.is_empty() {
            Ok("No results found".to_string())
        } else {
            Ok(results.join("\n"))
        }
    }
}

impl Default for SearchWebTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str { "search_web" }
    fn description(&self) -> &str {
        "Search the web for design inspiration, UI patterns, component libraries, or bug solutions. Use specific queries like 'modern card component animations 2024' or 'react useEffect cleanup memory leak'."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query - be specific for better results"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let query = required_str(&params, "query")?;

        Ok(match self.search(query).await {
            Ok(results) => results,
            Err(e) => format!("Search error: {}", describe(e)),
        })
    }
}

/// Fetch a page and reduce it to readable text
pub struct FetchUrlTool {
    client: Client,
}

impl FetchUrlTool {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    async fn fetch(&self, raw_url: &str) -> Result<String> {
        let url = Url::parse(raw_url)
            .map_err(|e| Error::Tool(format!("Invalid URL {}: {}", raw_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Tool(format!("Unsupported URL scheme: {}", url.scheme())));
        }

        let response = self.client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("HTTP {}", status)));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let body = response.text().await?;
        let text = if is_html { html_to_text(&body)? } else { body };

        Ok(truncate_output(&text, MAX_FETCH_CHARS))
    }
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str { "fetch_url" }
    fn description(&self) -> &str {
        "Fetch and read the text content from a URL. Use this to read documentation, blog posts, or examples found via search."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = required_str(&params, "url")?;

        Ok(match self.fetch(url).await {
            Ok(text) => text,
            Err(e) => format!("Fetch error: {}", describe(e)),
        })
    }
}

fn describe(err: Error) -> String {
    match err {
        Error::Tool(msg) => msg,
        other => other.to_string(),
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Tool(format!("Invalid pattern: {}", e)))
}

/// Pull `**title**\nsnippet\n` entries out of a DuckDuckGo HTML results page
fn extract_search_results(html: &str) -> Result<Vec<String>> {
    let title_re = compile(r#"(?s)class="result__a"[^>]*>(.*?)</a>"#)?;
    let snippet_re = compile(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#)?;
    let tag_re = compile(r"(?s)<[^>]*>")?;

    let clean = |fragment: &str| -> String {
        let text = tag_re.replace_all(fragment, "");
        decode_entities(&text).split_whitespace().collect::<Vec<_>>().join(" ")
    };

    let results = html
        .split("result__body")
        .skip(1)
        .filter_map(|chunk| {
            let title = clean(title_re.captures(chunk)?.get(1)?.as_str());
            if title.is_empty() {
                return None;
            }
            let snippet = snippet_re
                .captures(chunk)
                .and_then(|c| c.get(1))
                .map(|m| clean(m.as_str()))
                .unwrap_or_default();
            Some(format!("**{}**\n{}\n", title, snippet))
        })
        .take(MAX_SEARCH_RESULTS)
        .collect();

    Ok(results)
}

/// Strip non-content elements and markup, one text run per line
fn html_to_text(html: &str) -> Result<String> {
    let noise_re = compile(
        concat!(
            r"(?is)<!--.*?-->|<script\b.*?</script>|<style\b.*?</style>",
            r"|<nav\b.*?</nav>|<footer\b.*?</footer>|<header\b.*?</header>",
        ),
    )?;
    let tag_re = compile(r"(?s)<[^>]*>")?;

    let without_noise = noise_re.replace_all(html, " ");
    let without_tags = tag_re.replace_all(&without_noise, "\n");
    let decoded = decode_entities(&without_tags);

    Ok(decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Basic HTML entity decoding
fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
