use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes HTTP requests; lets reference sources swap in a stub client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
