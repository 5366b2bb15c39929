//! Request envelope parsing.
//!
//! Requests are single-line JSON objects with a `type` string and an optional
//! `data` payload of any JSON shape. Parsing is deliberately lenient about the
//! envelope: a missing or non-string `type`, or a JSON value that is not an
//! object, still yields a [`Request`] whose type is `None` so the router can
//! answer with "Missing request type" rather than a parse error.

use serde_json::Value;

use super::errors::DispatchError;

/// Parsed request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    request_type: Option<String>,
    data: Value,
}

impl Request {
    /// Builds a request for `request_type` carrying `data`.
    pub fn new(request_type: impl Into<String>, data: Value) -> Self {
        Self {
            request_type: Some(request_type.into()),
            data,
        }
    }

    /// Parses one request line.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedJson`] when the bytes are not valid
    /// JSON (including invalid UTF-8).
    pub fn parse(line: &[u8]) -> Result<Self, DispatchError> {
        let value: Value = serde_json::from_slice(line).map_err(DispatchError::from_json_error)?;
        Ok(Self::from_value(value))
    }

    /// Extracts the envelope fields from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Self {
                request_type: None,
                data: Value::Null,
            };
        };
        let request_type = object
            .remove("type")
            .as_ref()
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .map(str::to_owned);
        let data = object.remove("data").unwrap_or(Value::Null);
        Self { request_type, data }
    }

    /// Request type, or `None` when absent or blank.
    pub fn request_type(&self) -> Option<&str> {
        self.request_type.as_deref()
    }

    /// Request payload; `null` when the client omitted it.
    pub fn data(&self) -> &Value {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_type_and_data() {
        let request =
            Request::parse(br#"{"type":"query","data":"find actors"}"#).expect("valid request");
        assert_eq!(request.request_type(), Some("query"));
        assert_eq!(request.data(), &json!("find actors"));
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let request = Request::parse(br#"{"type":"ping"}"#).expect("valid request");
        assert_eq!(request.data(), &Value::Null);
    }

    #[test]
    fn structured_data_is_preserved() {
        let request = Request::parse(br#"{"type":"plan","data":{"steps":[1,2]}}"#)
            .expect("valid request");
        assert_eq!(request.data(), &json!({"steps": [1, 2]}));
    }

    #[test]
    fn padded_type_is_kept_verbatim() {
        let request = Request::parse(br#"{"type":" ping "}"#).expect("valid request");
        assert_eq!(request.request_type(), Some(" ping "));
    }

    #[rstest]
    #[case::absent(br#"{"data":1}"#.as_slice())]
    #[case::empty(br#"{"type":""}"#.as_slice())]
    #[case::blank(br#"{"type":"   "}"#.as_slice())]
    #[case::numeric(br#"{"type":7}"#.as_slice())]
    #[case::array(br#"[1,2,3]"#.as_slice())]
    #[case::string(br#""ping""#.as_slice())]
    fn envelope_without_usable_type(#[case] line: &[u8]) {
        let request = Request::parse(line).expect("valid JSON");
        assert_eq!(request.request_type(), None);
    }

    #[rstest]
    #[case::truncated(b"{\"type\":".as_slice())]
    #[case::garbage(b"not json".as_slice())]
    #[case::invalid_utf8(b"{\"type\":\"\xff\"}".as_slice())]
    fn rejects_malformed_json(#[case] line: &[u8]) {
        let error = Request::parse(line).expect_err("parse should fail");
        assert!(matches!(error, DispatchError::MalformedJson { .. }));
    }
}
