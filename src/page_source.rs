use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::data_models::Page;
use crate::error::FetchError;

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("static selector"));

const TEXT_WIDTH: usize = 100;

/// Downloads a URL and reduces it to indexable text.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPageSource {
    pub fn new(client: reqwest::Client, timeout: Duration) -> HttpPageSource {
        HttpPageSource { client, timeout }
    }

    fn is_textual(content_type: &str) -> bool {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        mime.is_empty() || mime.starts_with("text/") || mime == "application/xhtml+xml"
    }

    pub fn extract(url: &str, html: &str) -> Result<Page, FetchError> {
        let document = Html::parse_document(html);
        let title = document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let text = html2text::from_read(html.as_bytes(), TEXT_WIDTH).unwrap_or_default();
        let text = compact_lines(&text);
        if text.is_empty() {
            return Err(FetchError::Empty);
        }

        Ok(Page {
            url: url.to_string(),
            title,
            text,
        })
    }
}

/// Trims every line and collapses runs of blank lines.
fn compact_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut last_blank = true;
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !last_blank {
                out.push("");
            }
            last_blank = true;
        } else {
            out.push(line);
            last_blank = false;
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let res = self.client.get(url).timeout(self.timeout).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !Self::is_textual(&content_type) {
            return Err(FetchError::UnsupportedContent(content_type));
        }

        let body = res.text().await?;
        Self::extract(url, &body)
    }
}
