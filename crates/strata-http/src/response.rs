//! HTTP response types

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::HttpError;
use crate::transport::RequestId;

/// HTTP Response type - generic over the body type R and error type E
/// This is the primary return type for all HTTP operations
pub type Response<R = HttpResponse, E = HttpError> = Result<R, E>;

/// Decoded response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    /// Decoded body: parsed JSON, or a JSON string holding the text body
    pub data: serde_json::Value,
    /// HTTP status code, or the sentinel code of an error
    pub status_code: u16,
    /// Reason phrase
    pub status_text: String,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Transport session that produced the response
    pub request: Option<RequestId>,
    /// Original error, for responses built from one
    #[serde(skip)]
    pub error: Option<HttpError>,
}

impl HttpResponse {
    /// Build the value an error resolves to in errors-as-values mode
    ///
    /// `request` points at the session the error was raised for, if any.
    pub fn from_error(error: HttpError) -> Self {
        let payload = error.payload();
        Self {
            data: payload.data,
            status_code: payload.status_code,
            status_text: payload.status_text,
            headers: payload.headers,
            request: payload.request,
            error: Some(error),
        }
    }

    /// The error this response carries, if any
    pub fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    /// Whether the response carries an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check if the response status is a success (2xx)
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }

    /// Look up a header, ignoring case
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Deserialize the body into `T`
    pub fn json<T: DeserializeOwned>(&self) -> Response<T> {
        serde_json::from_value(self.data.clone()).map_err(HttpError::from)
    }

    /// The body as text, when it was not decoded as JSON
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }

    /// Turn an error-carrying response back into its error
    pub fn into_result(self) -> Response {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}
