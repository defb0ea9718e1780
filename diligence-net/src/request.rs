//! Request and response values passed through the fetcher

use serde::de::DeserializeOwned;

use crate::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single HTTP request description
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<serde_json::Value>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
            json_body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            json_body: Some(body),
            ..Self::get(url)
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// URL with query parameters encoded, as it goes on the wire
    pub fn full_url(&self) -> String {
        if self.params.is_empty() {
            return self.url.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, query)
    }

    /// Host portion of the URL, used as the rate-limiting key
    pub fn host(&self) -> Result<String, FetchError> {
        let parsed = reqwest::Url::parse(&self.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", self.url, e)))?;
        parsed
            .host_str()
            .map(|h| h.to_lowercase())
            .ok_or_else(|| FetchError::InvalidUrl(format!("{}: missing host", self.url)))
    }
}

/// A completed HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the server declared a JSON body
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_lowercase().contains("json"))
            .unwrap_or(false)
    }

    /// Decode the body as JSON regardless of the declared content type
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_encodes_params() {
        let request = FetchRequest::get("https://api.github.com/search/repositories")
            .param("q", "aave user:code-423n4")
            .param("per_page", 20);
        assert_eq!(
            request.full_url(),
            "https://api.github.com/search/repositories?q=aave%20user%3Acode-423n4&per_page=20"
        );
    }

    #[test]
    fn test_host() {
        let request = FetchRequest::get("https://API.GitHub.com/orgs/aave/repos");
        assert_eq!(request.host().unwrap(), "api.github.com");
        assert!(FetchRequest::get("not a url").host().is_err());
    }

    #[test]
    fn test_response_json() {
        let response = Response {
            url: "https://x".into(),
            status: 200,
            content_type: Some("text/html".into()),
            body: "<html></html>".into(),
        };
        assert!(!response.is_json());
        assert!(response.json::<serde_json::Value>().is_err());
    }
}
