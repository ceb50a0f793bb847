//! `fetch_url` (§4.6): GET-only HTTP(S) fetch with a size cap and timeout.

use std::time::Duration;

/// Fetch `url` and return its response body as text. Only `http`/`https`
/// schemes are accepted; redirects that would leave those schemes are
/// followed by `reqwest`'s default policy, which never downgrades scheme.
pub async fn fetch_url(url: &str, timeout_secs: u64, size_cap_bytes: usize) -> Result<String, String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| format!("invalid url '{url}': {e}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("scheme '{}' is not allowed; only http/https", parsed.scheme()));
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| format!("failed to build http client: {e}"))?;

    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("request returned status {}", response.status()));
    }

    let bytes = response.bytes().await.map_err(|e| format!("failed to read response body: {e}"))?;
    if bytes.len() > size_cap_bytes {
        return Err(format!(
            "response body of {} bytes exceeds the {} byte cap",
            bytes.len(),
            size_cap_bytes
        ));
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let result = fetch_url("file:///etc/passwd", 5, 1024).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_malformed_url() {
        let result = fetch_url("not a url", 5, 1024).await;
        assert!(result.is_err());
    }
}
