use serde_json::Value;

/// Phrases the marketplace uses when a login is already on sale.
pub const ALREADY_EXISTS_PHRASES: &[&str] = &["уже продается", "already"];

/// Structured error payload returned by the marketplace.
///
/// The remote is inconsistent about the shape of `errors`; every shape
/// seen in practice maps onto one of these variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// `{"errors": {"field": ["message", ...]}}`
    FieldErrors(Vec<(String, Vec<String>)>),
    /// `{"errors": ["message", ...]}`
    ListErrors(Vec<String>),
    /// `{"errors": "message"}` or `{"error": "message"}`
    SingleError(String),
}

impl RemoteError {
    /// Decode an error body. Returns `None` when the body is not JSON or has neither key.
    pub fn parse(body: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(body).ok()?;
        let object = value.as_object()?;

        if let Some(errors) = object.get("errors") {
            let decoded = match errors {
                Value::Object(fields) => RemoteError::FieldErrors(
                    fields
                        .iter()
                        .map(|(field, messages)| (field.clone(), message_list(messages)))
                        .collect(),
                ),
                Value::Array(items) => {
                    RemoteError::ListErrors(items.iter().map(stringify).collect())
                }
                other => RemoteError::SingleError(stringify(other)),
            };
            return Some(decoded);
        }

        object
            .get("error")
            .map(|error| RemoteError::SingleError(stringify(error)))
    }

    /// All messages joined into one line
    pub fn message(&self) -> String {
        match self {
            RemoteError::FieldErrors(fields) => fields
                .iter()
                .flat_map(|(_, messages)| messages.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join("; "),
            RemoteError::ListErrors(items) => items.join("; "),
            RemoteError::SingleError(message) => message.clone(),
        }
    }
}

/// Human-readable message for a non-2xx response, falling back to the status code.
pub fn normalize(status: u16, body: &str) -> String {
    RemoteError::parse(body)
        .map(|error| error.message())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("Status {}", status))
}

/// Case-insensitive match against [`ALREADY_EXISTS_PHRASES`].
pub fn indicates_already_exists(message: &str) -> bool {
    let lowered = message.to_lowercase();
    ALREADY_EXISTS_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

fn message_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(stringify).collect(),
        other => vec![stringify(other)],
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_are_joined() {
        let body = r#"{"errors":{"login":["already being sold"],
            "price":["too low","must be integer"]}}"#;
        let error = RemoteError::parse(body).unwrap();
        assert!(matches!(error, RemoteError::FieldErrors(_)));
        let message = error.message();
        assert!(message.contains("already being sold"));
        assert!(message.contains("too low; must be integer"));
    }

    #[test]
    fn test_field_errors_keep_server_order() {
        let body = r#"{"errors":{"title":["first"],"price":["second"],"login":["third"]}}"#;
        assert_eq!(normalize(400, body), "first; second; third");
    }

    #[test]
    fn test_field_error_with_scalar_value() {
        let error = RemoteError::parse(r#"{"errors":{"price":5}}"#).unwrap();
        assert_eq!(error.message(), "5");
    }

    #[test]
    fn test_list_errors() {
        let error = RemoteError::parse(r#"{"errors":["first","second"]}"#).unwrap();
        assert_eq!(error, RemoteError::ListErrors(vec!["first".into(), "second".into()]));
        assert_eq!(error.message(), "first; second");
    }

    #[test]
    fn test_single_error_shapes() {
        assert_eq!(
            RemoteError::parse(r#"{"errors":"bad token"}"#),
            Some(RemoteError::SingleError("bad token".into()))
        );
        assert_eq!(
            RemoteError::parse(r#"{"error":"invalid_grant"}"#),
            Some(RemoteError::SingleError("invalid_grant".into()))
        );
        assert_eq!(
            RemoteError::parse(r#"{"error":{"code":7}}"#).map(|e| e.message()),
            Some(r#"{"code":7}"#.to_string())
        );
    }

    #[test]
    fn test_unrecognized_body_falls_back_to_status() {
        assert_eq!(normalize(502, "<html>Bad Gateway</html>"), "Status 502");
        assert_eq!(normalize(400, r#"{"message":"nope"}"#), "Status 400");
        assert_eq!(normalize(400, r#"{"errors":[]}"#), "Status 400");
        assert_eq!(normalize(400, r#"["not","an","object"]"#), "Status 400");
    }

    #[test]
    fn test_already_exists_phrases() {
        assert!(indicates_already_exists("Already being sold"));
        assert!(indicates_already_exists("Этот аккаунт УЖЕ ПРОДАЕТСЯ"));
        assert!(!indicates_already_exists("price is too low"));
    }
}
