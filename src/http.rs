// src/http.rs

//! The HTTP client boundary for package downloads
//!
//! The download engine only needs one operation: a GET request with an
//! optional range offset, returning the status code and a streaming body.
//! [`ReqwestClient`] is the production implementation; [`MockHttpClient`]
//! serves scripted responses for tests.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};

/// HTTP status codes the download engine distinguishes.
pub const STATUS_OK: u16 = 200;
pub const STATUS_PARTIAL_CONTENT: u16 = 206;

/// A response to a download request.
pub struct HttpResponse {
    pub status: u16,
    pub body: Box<dyn Read + Send>,
}

/// A client capable of fetching package content over HTTP.
pub trait HttpClient: Send + Sync {
    /// Issues a GET request for the given URL. When `offset` is greater
    /// than zero, a `Range: bytes={offset}-` header is included so that
    /// a partial download can be resumed.
    fn get(&self, url: &str, offset: u64) -> Result<HttpResponse>;
}

/// Timeout for establishing HTTP connections.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An [`HttpClient`] backed by a blocking reqwest client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| Error::Http(err.to_string()))?;
        Ok(ReqwestClient { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, offset: u64) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(reqwest::header::RANGE, format!("bytes={offset}-"));
        }
        let response = request.send().map_err(|err| Error::Http(err.to_string()))?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            body: Box::new(response),
        })
    }
}

type MockResponder = Box<dyn Fn(u64) -> Result<(u16, Vec<u8>)> + Send + Sync>;

/// An [`HttpClient`] that serves scripted responses and records every
/// request it receives.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responders: Arc<Mutex<HashMap<String, Arc<MockResponder>>>>,
    requests: Arc<Mutex<Vec<(String, u64)>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        MockHttpClient::default()
    }

    fn install(&self, url: &str, responder: MockResponder) {
        self.responders
            .lock()
            .unwrap()
            .insert(url.to_string(), Arc::new(responder));
    }

    /// Serves the given bytes for the URL, honoring range offsets with
    /// 206 responses.
    pub fn serve(&self, url: &str, content: Vec<u8>) {
        self.install(
            url,
            Box::new(move |offset| {
                let offset = offset as usize;
                if offset == 0 {
                    Ok((STATUS_OK, content.clone()))
                } else if offset <= content.len() {
                    Ok((STATUS_PARTIAL_CONTENT, content[offset..].to_vec()))
                } else {
                    Ok((416, Vec::new()))
                }
            }),
        );
    }

    /// Serves the given bytes for the URL, ignoring range offsets and
    /// always answering 200 with the full content.
    pub fn serve_without_resume(&self, url: &str, content: Vec<u8>) {
        self.install(url, Box::new(move |_offset| Ok((STATUS_OK, content.clone()))));
    }

    /// Serves a fixed status code with an empty body for the URL.
    pub fn serve_status(&self, url: &str, status: u16) {
        self.install(url, Box::new(move |_offset| Ok((status, Vec::new()))));
    }

    /// Fails every request for the URL with a transport error.
    pub fn serve_transport_error(&self, url: &str, message: &str) {
        let message = message.to_string();
        self.install(
            url,
            Box::new(move |_offset| Err(Error::Http(message.clone()))),
        );
    }

    /// Returns the (url, offset) pairs of every request received so far.
    pub fn requests(&self) -> Vec<(String, u64)> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpClient for MockHttpClient {
    fn get(&self, url: &str, offset: u64) -> Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), offset));

        let responder = self
            .responders
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Http(format!("no response configured for {url}")))?;

        let (status, body) = (*responder)(offset)?;
        Ok(HttpResponse {
            status,
            body: Box::new(std::io::Cursor::new(body)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(mut response: HttpResponse) -> Vec<u8> {
        let mut body = Vec::new();
        response.body.read_to_end(&mut body).unwrap();
        body
    }

    #[test]
    fn test_mock_serves_full_content() {
        let client = MockHttpClient::new();
        client.serve("https://example.com/a", b"hello world".to_vec());

        let response = client.get("https://example.com/a", 0).unwrap();
        assert_eq!(response.status, STATUS_OK);
        assert_eq!(body_of(response), b"hello world");
    }

    #[test]
    fn test_mock_honors_range() {
        let client = MockHttpClient::new();
        client.serve("https://example.com/a", b"hello world".to_vec());

        let response = client.get("https://example.com/a", 6).unwrap();
        assert_eq!(response.status, STATUS_PARTIAL_CONTENT);
        assert_eq!(body_of(response), b"world");
    }

    #[test]
    fn test_mock_without_resume_ignores_range() {
        let client = MockHttpClient::new();
        client.serve_without_resume("https://example.com/a", b"hello".to_vec());

        let response = client.get("https://example.com/a", 3).unwrap();
        assert_eq!(response.status, STATUS_OK);
        assert_eq!(body_of(response), b"hello");
    }

    #[test]
    fn test_mock_records_requests() {
        let client = MockHttpClient::new();
        client.serve("https://example.com/a", Vec::new());
        let _ = client.get("https://example.com/a", 0);
        let _ = client.get("https://example.com/a", 10);
        assert_eq!(
            client.requests(),
            vec![
                ("https://example.com/a".to_string(), 0),
                ("https://example.com/a".to_string(), 10),
            ]
        );
    }

    #[test]
    fn test_mock_unconfigured_url_fails() {
        let client = MockHttpClient::new();
        assert!(client.get("https://example.com/missing", 0).is_err());
    }
}
