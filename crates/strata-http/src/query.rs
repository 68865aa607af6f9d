//! Query string and body encoding helpers

use crate::config::{scalar_to_string, Params};
use crate::error::HttpError;
use crate::response::Response;

/// Encode query parameters
pub fn encode_params(params: &Params) -> Response<String> {
    match params {
        Params::Encoded(query) => Ok(query.trim_start_matches('?').to_string()),
        Params::Pairs(pairs) => Ok(serde_urlencoded::to_string(pairs)?),
    }
}

/// Join base URL, path and query parameters
///
/// `base_url + url + ("?" + encoded params)`, where the query part is only
/// added for non-empty params.
pub fn effective_url(base_url: &str, url: &str, params: Option<&Params>) -> Response<String> {
    let mut effective = format!("{base_url}{url}");
    if let Some(params) = params.filter(|p| !p.is_empty()) {
        let query = encode_params(params)?;
        if !query.is_empty() {
            effective.push('?');
            effective.push_str(&query);
        }
    }
    Ok(effective)
}

/// Whether a value is absent, `null`, or an object without members
pub fn is_empty_object(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Form encode the top-level members of a JSON object
pub fn form_encode(data: &serde_json::Value) -> Response<String> {
    match data {
        serde_json::Value::Object(map) => {
            let pairs = map
                .iter()
                .map(|(k, v)| Ok((k.as_str(), scalar_to_string(v)?)))
                .collect::<Response<Vec<_>>>()?;
            Ok(serde_urlencoded::to_string(pairs)?)
        }
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Null => Ok(String::new()),
        _ => Err(HttpError::Serialization(
            "form bodies must be objects".into(),
        )),
    }
}
