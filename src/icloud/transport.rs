use async_trait::async_trait;
use isahc::http::StatusCode;
use isahc::{AsyncReadResponseExt, HttpClient};

#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Sends the JSON POST requests the shared stream protocol is made of.
#[async_trait]
pub trait StreamTransport: std::fmt::Debug + Send + Sync {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<TransportResponse, isahc::Error>;
}

#[async_trait]
impl StreamTransport for Box<dyn StreamTransport> {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<TransportResponse, isahc::Error> {
        (**self).post(url, body).await
    }
}

/// isahc keeps the raw status code, including the non-standard 330 the
/// manifest endpoint answers with when it reassigns the client.
#[derive(Debug)]
pub struct IsahcTransport {
    client: HttpClient,
}

impl IsahcTransport {
    pub fn new() -> Result<Self, isahc::Error> {
        let client = HttpClient::builder()
            .default_header("Content-Type", "text/plain;charset=UTF-8")
            .default_header("Cache-Control", "no-cache")
            .build()?;

        Ok(IsahcTransport { client })
    }
}

#[async_trait]
impl StreamTransport for IsahcTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<TransportResponse, isahc::Error> {
        let mut response = self.client.post_async(url, body).await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(TransportResponse { status, body })
    }
}
