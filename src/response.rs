//! Response wrappers handed back by handlers.
//!
//! Token and value are independently optional by design: a command may yield
//! only a resumption token, only a value, both, or (for token responses)
//! neither.

use crate::handler::Response;
use crate::render::{FieldValue, LogValue, Loggable};
use crate::state_token::StateToken;

/// Response of a token-only command handler: an optional [`StateToken`] and
/// nothing else. Use this when callers need at most an indication token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTokenResponse {
    token: Option<StateToken>,
}

impl CommandTokenResponse {
    pub fn of(token: StateToken) -> Self {
        Self { token: Some(token) }
    }

    pub fn empty() -> Self {
        Self { token: None }
    }

    pub fn token(&self) -> Option<StateToken> {
        self.token
    }
}

impl Response for CommandTokenResponse {
    fn as_loggable(&self) -> Option<&dyn Loggable> {
        Some(self)
    }
}

impl Loggable for CommandTokenResponse {
    fn type_label(&self) -> &str {
        "CommandTokenResponse"
    }

    fn log_fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![("token", self.token.log_value())]
    }
}

/// Response of a value-shaped command handler.
// beware, both members are intentionally optional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandValueResponse<T> {
    token: Option<StateToken>,
    value: Option<T>,
}

impl<T> CommandValueResponse<T> {
    pub fn new(token: Option<StateToken>, value: Option<T>) -> Self {
        Self { token, value }
    }

    pub fn from_value(value: T) -> Self {
        Self::new(None, Some(value))
    }

    pub fn from_token(token: StateToken) -> Self {
        Self::new(Some(token), None)
    }

    pub fn empty() -> Self {
        Self::new(None, None)
    }

    pub fn with_value(self, value: T) -> Self {
        Self {
            token: self.token,
            value: Some(value),
        }
    }

    pub fn token(&self) -> Option<StateToken> {
        self.token
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

impl<T: LogValue> Response for CommandValueResponse<T> {
    fn as_loggable(&self) -> Option<&dyn Loggable> {
        Some(self)
    }
}

impl<T: LogValue> Loggable for CommandValueResponse<T> {
    fn type_label(&self) -> &str {
        "CommandValueResponse"
    }

    fn log_fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("token", self.token.log_value()),
            ("value", self.value.log_value()),
        ]
    }
}

/// Response of a query handler.
// beware, both members are intentionally optional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse<T> {
    token: Option<StateToken>,
    value: Option<T>,
}

impl<T> QueryResponse<T> {
    pub fn new(token: Option<StateToken>, value: Option<T>) -> Self {
        Self { token, value }
    }

    pub fn from_value(value: T) -> Self {
        Self::new(None, Some(value))
    }

    pub fn from_token(token: StateToken) -> Self {
        Self::new(Some(token), None)
    }

    pub fn empty() -> Self {
        Self::new(None, None)
    }

    pub fn with_value(self, value: T) -> Self {
        Self {
            token: self.token,
            value: Some(value),
        }
    }

    pub fn token(&self) -> Option<StateToken> {
        self.token
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

impl<T: LogValue> Response for QueryResponse<T> {
    fn as_loggable(&self) -> Option<&dyn Loggable> {
        Some(self)
    }
}

impl<T: LogValue> Loggable for QueryResponse<T> {
    fn type_label(&self) -> &str {
        "QueryResponse"
    }

    fn log_fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("token", self.token.log_value()),
            ("value", self.value.log_value()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render;

    #[test]
    fn test_token_response_renders_its_token() {
        let token = StateToken::random();
        let response = CommandTokenResponse::of(token);
        let rendered = render(&response);
        assert!(rendered.starts_with("CommandTokenResponse(token="));
        assert!(rendered.contains(&token.uuid().to_string()));
    }

    #[test]
    fn test_empty_token_response_renders_no_fields() {
        assert_eq!(
            render(&CommandTokenResponse::empty()),
            "CommandTokenResponse()"
        );
    }

    #[test]
    fn test_value_response_accessors() {
        let response = CommandValueResponse::from_value(42u32);
        assert_eq!(response.value(), Some(&42));
        assert_eq!(response.token(), None);

        let token = StateToken::random();
        let response = CommandValueResponse::<u32>::from_token(token).with_value(7);
        assert_eq!(response.token(), Some(token));
        assert_eq!(response.into_value(), Some(7));
    }

    #[test]
    fn test_query_response_renders_value() {
        let response = QueryResponse::from_value("hit".to_string());
        assert_eq!(render(&response), "QueryResponse(value=hit)");
    }
}
