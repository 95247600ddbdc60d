mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;

/// Downloads `url` and returns the body, failing on non-2xx responses.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedResponse(u16);

    #[async_trait]
    impl HttpClient for FixedResponse {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let resp = http::Response::builder()
                .status(self.0)
                .body("payload")
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    #[tokio::test]
    async fn test_fetch_bytes_returns_body_on_success() {
        let bytes = fetch_bytes(&FixedResponse(200), "http://localhost/data").await.unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[tokio::test]
    async fn test_fetch_bytes_rejects_error_status() {
        assert!(fetch_bytes(&FixedResponse(404), "http://localhost/data").await.is_err());
        assert!(fetch_bytes(&FixedResponse(503), "http://localhost/data").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_bytes_rejects_bad_url() {
        assert!(fetch_bytes(&FixedResponse(200), "not a url").await.is_err());
    }
}
