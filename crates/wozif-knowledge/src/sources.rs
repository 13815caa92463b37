use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use wozif_core::error::{Result, WozifError};

/// Loads ad-hoc grounding sources: web pages and local documents.
pub struct SourceLoader {
    http: reqwest::Client,
}

impl SourceLoader {
    pub fn new(timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("Wozif/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Fetch a URL as plain text. HTML is reduced to its text content.
    pub async fn load_url(&self, url: &str) -> Result<String> {
        debug!(url, "Fetching source URL");
        let fail = |message: String| WozifError::SourceLoad {
            source_ref: url.to_string(),
            message,
        };

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {}", status.as_u16())));
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = resp
            .text()
            .await
            .map_err(|e| fail(format!("failed to read body: {}", e)))?;

        if content_type.contains("html") || looks_like_html(&body) {
            Ok(strip_html_tags(&body))
        } else {
            Ok(body)
        }
    }

    /// Read a local document: PDF text extraction, otherwise UTF-8 text.
    pub async fn load_file(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| WozifError::SourceLoad {
            source_ref: path.display().to_string(),
            message: e.to_string(),
        })?;
        let path_ref = path.display().to_string();

        tokio::task::spawn_blocking(move || extract_document(&path_ref, &bytes))
            .await
            .map_err(|e| WozifError::SourceLoad {
                source_ref: path.display().to_string(),
                message: e.to_string(),
            })?
    }
}

fn extract_document(source_ref: &str, bytes: &[u8]) -> Result<String> {
    let is_pdf = bytes.starts_with(b"%PDF") || source_ref.to_lowercase().ends_with(".pdf");
    if is_pdf {
        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| WozifError::SourceLoad {
            source_ref: source_ref.to_string(),
            message: format!("PDF extraction failed: {}", e),
        })?;
        // Pages are separated by form feeds
        let pages: Vec<&str> = text
            .split('\u{0c}')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        return Ok(pages.join("\n\n"));
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(32).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Basic HTML tag stripping using regex.
pub fn strip_html_tags(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static BLANKS: OnceLock<Regex> = OnceLock::new();

    // Remove script and style blocks entirely
    let cleaned = regex(&SCRIPT, r"(?is)<script[^>]*>.*?</script>").replace_all(html, "");
    let cleaned = regex(&STYLE, r"(?is)<style[^>]*>.*?</style>").replace_all(&cleaned, "");

    let text = regex(&TAGS, r"<[^>]+>").replace_all(&cleaned, "");

    // Decode common HTML entities
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    let text = regex(&BLANKS, r"\n\s*\n(\s*\n)+").replace_all(&text, "\n\n");

    text.trim().to_string()
}
