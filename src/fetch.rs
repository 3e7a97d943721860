use std::time::Duration;

use url::Url;

// ── Constants ────────────────────────────────────────────────────────────────

const USER_AGENT: &str = "unfurl-api/1.0";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Prerender-style service queried when the direct fetch fails; the token is
/// never logged.
const RENDER_URL_VAR: &str = "UNFURL_RENDER_URL";
const RENDER_TOKEN_VAR: &str = "UNFURL_RENDER_TOKEN";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("upstream returned an error")]
    Upstream,
    #[error("URL did not return HTML")]
    NotHtml,
    #[error("{0}")]
    Request(String),
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Fetch the raw HTML for a page. When a render service is configured and
/// the direct fetch fails or returns something other than HTML, retry once
/// through the render service.
pub async fn fetch_html(url: &str) -> Result<String, FetchError> {
    validate_url(url)?;
    match fetch_direct(url).await {
        Ok(html) => Ok(html),
        Err(err) => match render_endpoint() {
            Some(endpoint) => {
                tracing::info!(%err, "direct fetch failed, retrying via render service");
                fetch_rendered(&endpoint, url).await
            }
            None => Err(err),
        },
    }
}

// ── URL validation ───────────────────────────────────────────────────────────

fn validate_url(url: &str) -> Result<(), FetchError> {
    let parsed =
        Url::parse(url).map_err(|_| FetchError::InvalidUrl("invalid URL".to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::InvalidUrl(
            "only http and https URLs are supported".to_string(),
        ));
    }
    Ok(())
}

// ── HTTP fetch ───────────────────────────────────────────────────────────────

fn client() -> Result<reqwest::Client, FetchError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            .parse()
            .unwrap(),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        "en-US,en;q=0.9".parse().unwrap(),
    );

    reqwest::ClientBuilder::new()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .map_err(|e| FetchError::Request(e.to_string()))
}

async fn fetch_direct(url: &str) -> Result<String, FetchError> {
    let response = client()?.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Request(format!("TimeoutError: {}", e))
        } else if e.is_connect() {
            FetchError::Request(format!("ConnectError: {}", e))
        } else {
            FetchError::Request(format!("RequestError: {}", e))
        }
    })?;

    if !response.status().is_success() {
        return Err(FetchError::Upstream);
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if !content_type.contains("text/html") {
        return Err(FetchError::NotHtml);
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::Request(e.to_string()))
}

// ── Render-service fallback ──────────────────────────────────────────────────

fn render_endpoint() -> Option<String> {
    std::env::var(RENDER_URL_VAR).ok().filter(|v| !v.is_empty())
}

async fn fetch_rendered(endpoint: &str, url: &str) -> Result<String, FetchError> {
    let mut request = client()?.get(endpoint).query(&[("url", url)]);
    if let Ok(token) = std::env::var(RENDER_TOKEN_VAR) {
        request = request.query(&[("token", token.as_str())]);
    }

    let response = request
        .send()
        .await
        .map_err(|e| FetchError::Request(e.to_string()))?;

    if !response.status().is_success() {
        return Err(FetchError::Upstream);
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::Request(e.to_string()))
}

// ── Tests ────────────────────────────────────────────────────────────────────
