// Request and response types at the dispatcher boundary

use crate::{Error, Result};
use indexmap::IndexMap;
use lintel_bean::Locale;
use serde::Serialize;
use std::collections::HashMap;

/// Multi-valued request parameters, in submission order.
pub type Parameters = IndexMap<String, Vec<String>>;

/// An incoming request as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub method: String,
    /// URL-decoded path, without query string.
    pub path: String,
    pub parameters: Parameters,
    pub headers: HashMap<String, String>,
    pub locale: Option<Locale>,
}

impl ActionRequest {
    /// Build a request from a method and URI. Query string parameters are
    /// decoded and added in order.
    pub fn new(method: impl Into<String>, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (uri, None),
        };

        let mut request = Self {
            method: method.into(),
            path: decode(path),
            parameters: IndexMap::new(),
            headers: HashMap::new(),
            locale: None,
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            request.add_parameter(decode(name), decode(value));
        }
        request
    }

    pub fn get(uri: &str) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new("POST", uri)
    }

    /// Append a value to a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_parameter(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    fn add_parameter(&mut self, name: String, value: String) {
        self.parameters.entry(name).or_default().push(value);
    }

    /// First value of a parameter
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(name)
    }
}

// Undecodable input is kept verbatim.
fn decode(text: &str) -> String {
    let text = text.replace('+', " ");
    match urlencoding::decode(&text) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => text,
    }
}

/// The response produced by executing a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Path the request was forwarded to, for forward resolutions.
    pub forward: Option<String>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            forward: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = serde_json::to_vec(value).map_err(|e| Error::Resolution(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Body as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_is_decoded() {
        let request = ActionRequest::get("/calc%20tool/add?a=1&a=2&name=J%C3%BCrgen+K&flag");
        assert_eq!(request.path, "/calc tool/add");
        assert_eq!(request.parameters["a"], vec!["1", "2"]);
        assert_eq!(request.parameter("name"), Some("Jürgen K"));
        assert_eq!(request.parameter("flag"), Some(""));
    }

    #[test]
    fn test_json_response() {
        let response = Response::ok()
            .with_json(&serde_json::json!({"sum": 3}))
            .unwrap();
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.text(), r#"{"sum":3}"#);
    }
}
