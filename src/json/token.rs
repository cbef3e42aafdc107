use std::fmt;

/// Kind of a JSON token
///
/// Payloads (field names, string and number text) stay in the
/// [`JsonReader`](super::JsonReader) that produced the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName,
    String,
    Number,
    True,
    False,
    Null,
}

impl Token {
    /// Whether the token is a complete value on its own
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Token::String | Token::Number | Token::True | Token::False | Token::Null
        )
    }

    pub fn is_structure_start(self) -> bool {
        matches!(self, Token::StartObject | Token::StartArray)
    }

    pub fn is_structure_end(self) -> bool {
        matches!(self, Token::EndObject | Token::EndArray)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::StartObject => "START_OBJECT",
            Token::EndObject => "END_OBJECT",
            Token::StartArray => "START_ARRAY",
            Token::EndArray => "END_ARRAY",
            Token::FieldName => "FIELD_NAME",
            Token::String => "VALUE_STRING",
            Token::Number => "VALUE_NUMBER",
            Token::True => "VALUE_TRUE",
            Token::False => "VALUE_FALSE",
            Token::Null => "VALUE_NULL",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_classes() {
        assert!(Token::Null.is_scalar());
        assert!(!Token::FieldName.is_scalar());
        assert!(Token::StartArray.is_structure_start());
        assert!(Token::EndObject.is_structure_end());
        assert_eq!(Token::StartArray.to_string(), "START_ARRAY");
    }
}
