use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{ReferenceFile, ReferenceSnapshot};
use crate::decode::{GZIP_MAGIC, gunzip};
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};

/// Somewhere a complete reference snapshot can be loaded from.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    fn describe(&self) -> String;

    async fn load(&self) -> Result<ReferenceSnapshot>;
}

/// Decodes a JSON snapshot, inflating it first if it is gzip-compressed.
pub fn parse_snapshot(bytes: &[u8]) -> Result<ReferenceSnapshot> {
    let file: ReferenceFile = if bytes.starts_with(&GZIP_MAGIC) {
        serde_json::from_slice(&gunzip(bytes).context("reference data is not valid gzip")?)?
    } else {
        serde_json::from_slice(bytes)?
    };
    Ok(ReferenceSnapshot::from_file(file))
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReferenceSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<ReferenceSnapshot> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        debug!(bytes = bytes.len(), path = %self.path.display(), "Reference file read");
        parse_snapshot(&bytes)
    }
}

pub struct HttpSource<C = BasicClient> {
    client: C,
    url: String,
}

impl HttpSource<BasicClient> {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(BasicClient::new(), url)
    }
}

impl<C: HttpClient> HttpSource<C> {
    pub fn with_client(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> ReferenceSource for HttpSource<C> {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<ReferenceSnapshot> {
        let bytes = fetch_bytes(&self.client, &self.url)
            .await
            .with_context(|| format!("failed to fetch {}", self.url))?;
        debug!(bytes = bytes.len(), url = %self.url, "Reference data downloaded");
        parse_snapshot(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{ "stops": [ { "code": "1", "name": "Plein" } ] }"#;

    #[test]
    fn test_parse_plain_snapshot() {
        let snapshot = parse_snapshot(SNAPSHOT.as_bytes()).unwrap();
        assert_eq!(snapshot.stop("1").map(|s| s.name.as_str()), Some("Plein"));
    }

    #[test]
    fn test_parse_gzipped_snapshot() {
        let snapshot = parse_snapshot(&gzip(SNAPSHOT.as_bytes())).unwrap();
        assert_eq!(snapshot.stats().stops, 1);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_snapshot(b"not json").is_err());
    }

    struct StubClient {
        status: u16,
        body: Vec<u8>,
    }

    #[async_trait]
    impl HttpClient for StubClient {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body.clone())
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn test_http_source_loads_gzipped_snapshot() {
        let client = StubClient {
            status: 200,
            body: gzip(SNAPSHOT.as_bytes()),
        };
        let source = HttpSource::with_client(client, "http://reference.local/snapshot.json.gz");

        let snapshot = source.load().await.unwrap();
        assert_eq!(snapshot.stop("1").map(|s| s.name.as_str()), Some("Plein"));
        assert_eq!(source.describe(), "http://reference.local/snapshot.json.gz");
    }

    #[tokio::test]
    async fn test_http_source_server_error_fails() {
        let client = StubClient {
            status: 500,
            body: SNAPSHOT.as_bytes().to_vec(),
        };
        let source = HttpSource::with_client(client, "http://reference.local/snapshot.json");

        let err = source.load().await.unwrap_err();
        assert!(err.to_string().contains("reference.local"));
    }

    #[tokio::test]
    async fn test_file_source_loads_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let source = FileSource::new(file.path());
        let snapshot = source.load().await.unwrap();
        assert_eq!(snapshot.stats().stops, 1);
    }

    #[tokio::test]
    async fn test_file_source_missing_file_fails() {
        let source = FileSource::new("/nonexistent/reference.json");
        assert!(source.load().await.is_err());
    }
}
