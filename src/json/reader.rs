use std::io::{self, BufRead};

use serde_json::{Map, Number, Value};

use crate::{
    json::Token,
    util::{Result, Status},
};

/// Deepest nesting of objects and arrays the reader accepts
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Object,
    Array,
}

/// What the grammar allows at the current position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// A top-level value or the end of input
    Root,
    /// A field name or `}`
    ObjectStart,
    /// `:` followed by a value
    Colon,
    /// `,` or `}`
    ObjectNext,
    /// A value or `]`
    ArrayStart,
    /// `,` or `]`
    ArrayNext,
}

/// Pull parser producing one [`Token`] at a time from a byte stream
///
/// The reader keeps the payload of the current token: the field name for
/// [`Token::FieldName`], the decoded text for [`Token::String`] and the
/// parsed value for [`Token::Number`]. Several top-level values may follow
/// each other in the input.
///
/// Any syntax error is reported as a [`Code::Corruption`] status carrying
/// the byte offset; I/O failures keep their `io::Error` as cause. The reader
/// is unusable after an error.
///
/// [`Code::Corruption`]: crate::util::Code::Corruption
pub struct JsonReader<R> {
    inner: R,
    offset: u64,
    expect: Expect,
    /// Open containers, with the field name under which each was opened
    scopes: Vec<(Scope, Option<String>)>,
    current: Option<Token>,
    current_name: Option<String>,
    text: String,
    number: Option<Number>,
    scratch: Vec<u8>,
}

impl<R: BufRead> JsonReader<R> {
    pub fn new(inner: R) -> Self {
        JsonReader {
            inner,
            offset: 0,
            expect: Expect::Root,
            scopes: Vec::new(),
            current: None,
            current_name: None,
            text: String::new(),
            number: None,
            scratch: Vec::new(),
        }
    }

    /// Advance to the next token; `None` at the end of the input
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        let token = self.read_token()?;
        self.current = token;
        Ok(token)
    }

    /// The token the last `next_token()` returned
    pub fn current_token(&self) -> Option<Token> {
        self.current
    }

    /// The last field name read in the innermost open object
    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    /// Text of the current string, field name or number token
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn number_value(&self) -> Result<Number> {
        match (self.current, &self.number) {
            (Some(Token::Number), Some(number)) => Ok(number.clone()),
            (token, _) => Err(Status::illegal_state(format!(
                "not positioned on a number but on {}",
                token.map_or_else(|| "nothing".to_string(), |t| t.to_string())
            ))),
        }
    }

    /// Current token as a non-negative integer, if it is one
    pub fn u64_value(&self) -> Option<u64> {
        match self.current {
            Some(Token::Number) => self.number.as_ref().and_then(Number::as_u64),
            _ => None,
        }
    }

    /// Number of open objects and arrays
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Whether the innermost open container is an object
    pub fn in_object(&self) -> bool {
        matches!(self.scopes.last(), Some((Scope::Object, _)))
    }

    /// Bytes consumed from the input so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the value starting at the current token as a tree
    ///
    /// Afterwards the reader is positioned on the last token of the value.
    /// Returns `None` when there is no current token or it ends a container.
    pub fn read_value_as_tree(&mut self) -> Result<Option<Value>> {
        match self.current {
            None => Ok(None),
            Some(token) if token.is_structure_end() => Ok(None),
            Some(Token::FieldName) => Err(Status::illegal_state("positioned on a field name, not on a value")),
            Some(token) => self.build_tree(token).map(Some),
        }
    }

    fn build_tree(&mut self, token: Token) -> Result<Value> {
        let value = match token {
            Token::StartObject => {
                let mut map = Map::new();
                loop {
                    match self.expect_token()? {
                        Token::EndObject => break,
                        Token::FieldName => {
                            let name = std::mem::take(&mut self.text);
                            let value_token = self.expect_token()?;
                            let value = self.build_tree(value_token)?;
                            map.insert(name, value);
                        },
                        other => return Err(self.error(format!("unexpected {other} in object"))),
                    }
                }
                Value::Object(map)
            },
            Token::StartArray => {
                let mut items = Vec::new();
                loop {
                    let item_token = self.expect_token()?;
                    if item_token == Token::EndArray {
                        break;
                    }
                    items.push(self.build_tree(item_token)?);
                }
                Value::Array(items)
            },
            Token::String => Value::String(std::mem::take(&mut self.text)),
            Token::Number => Value::Number(self.number_value()?),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
            Token::EndObject | Token::EndArray | Token::FieldName => {
                return Err(self.error(format!("unexpected {token} where a value starts")));
            },
        };
        Ok(value)
    }

    fn expect_token(&mut self) -> Result<Token> {
        match self.next_token()? {
            Some(token) => Ok(token),
            None => Err(self.eof()),
        }
    }

    fn read_token(&mut self) -> Result<Option<Token>> {
        let Some(b) = self.skip_whitespace()? else {
            if self.scopes.is_empty() {
                return Ok(None);
            }
            return Err(self.eof());
        };
        let token = match self.expect {
            Expect::Root => self.read_value(b)?,
            Expect::ObjectStart => match b {
                b'}' => self.end_scope(Scope::Object),
                b'"' => self.read_field_name()?,
                _ => return Err(self.unexpected(b, "a field name or '}'")),
            },
            Expect::ObjectNext => match b {
                b'}' => self.end_scope(Scope::Object),
                b',' => {
                    self.bump();
                    match self.skip_whitespace()? {
                        Some(b'"') => self.read_field_name()?,
                        Some(b) => return Err(self.unexpected(b, "a field name")),
                        None => return Err(self.eof()),
                    }
                },
                _ => return Err(self.unexpected(b, "',' or '}'")),
            },
            Expect::Colon => match b {
                b':' => {
                    self.bump();
                    self.read_next_value()?
                },
                _ => return Err(self.unexpected(b, "':'")),
            },
            Expect::ArrayStart => match b {
                b']' => self.end_scope(Scope::Array),
                _ => self.read_value(b)?,
            },
            Expect::ArrayNext => match b {
                b']' => self.end_scope(Scope::Array),
                b',' => {
                    self.bump();
                    self.read_next_value()?
                },
                _ => return Err(self.unexpected(b, "',' or ']'")),
            },
        };
        Ok(Some(token))
    }

    fn read_next_value(&mut self) -> Result<Token> {
        match self.skip_whitespace()? {
            Some(b) => self.read_value(b),
            None => Err(self.eof()),
        }
    }

    fn read_value(&mut self, b: u8) -> Result<Token> {
        let token = match b {
            b'{' => {
                self.bump();
                self.begin_scope(Scope::Object)?;
                return Ok(Token::StartObject);
            },
            b'[' => {
                self.bump();
                self.begin_scope(Scope::Array)?;
                return Ok(Token::StartArray);
            },
            b'"' => {
                self.read_string()?;
                Token::String
            },
            b'-' | b'0'..=b'9' => {
                self.read_number()?;
                Token::Number
            },
            b't' => {
                self.read_literal(b"true")?;
                Token::True
            },
            b'f' => {
                self.read_literal(b"false")?;
                Token::False
            },
            b'n' => {
                self.read_literal(b"null")?;
                Token::Null
            },
            _ => return Err(self.unexpected(b, "a value")),
        };
        self.end_value();
        Ok(token)
    }

    fn begin_scope(&mut self, scope: Scope) -> Result<()> {
        if self.scopes.len() >= MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {MAX_DEPTH}")));
        }
        self.scopes.push((scope, self.current_name.take()));
        self.expect = match scope {
            Scope::Object => Expect::ObjectStart,
            Scope::Array => Expect::ArrayStart,
        };
        Ok(())
    }

    /// Close the innermost container; the grammar state guarantees its kind
    fn end_scope(&mut self, scope: Scope) -> Token {
        self.bump();
        if let Some((_, name)) = self.scopes.pop() {
            self.current_name = name;
        }
        self.end_value();
        match scope {
            Scope::Object => Token::EndObject,
            Scope::Array => Token::EndArray,
        }
    }

    fn end_value(&mut self) {
        self.expect = match self.scopes.last() {
            Some((Scope::Object, _)) => Expect::ObjectNext,
            Some((Scope::Array, _)) => Expect::ArrayNext,
            None => Expect::Root,
        };
    }

    fn read_field_name(&mut self) -> Result<Token> {
        self.read_string()?;
        self.current_name = Some(self.text.clone());
        self.expect = Expect::Colon;
        Ok(Token::FieldName)
    }

    fn read_string(&mut self) -> Result<()> {
        // opening quote
        self.bump();
        self.scratch.clear();
        loop {
            let Some(b) = self.next_byte()? else {
                return Err(self.eof());
            };
            match b {
                b'"' => break,
                b'\\' => self.read_escape()?,
                0x00..=0x1f => return Err(self.error("control character in string")),
                _ => self.scratch.push(b),
            }
        }
        let text = std::str::from_utf8(&self.scratch).map_err(|e| self.error(format!("invalid UTF-8 in string: {e}")))?;
        self.text.clear();
        self.text.push_str(text);
        Ok(())
    }

    fn read_escape(&mut self) -> Result<()> {
        let Some(b) = self.next_byte()? else {
            return Err(self.eof());
        };
        let c = match b {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => self.read_unicode_escape()?,
            _ => return Err(self.unexpected(b, "an escape character")),
        };
        let mut utf8 = [0u8; 4];
        self.scratch.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
        Ok(())
    }

    fn read_unicode_escape(&mut self) -> Result<char> {
        let first = self.read_hex4()?;
        let code = match first {
            0xD800..=0xDBFF => {
                if self.next_byte()? != Some(b'\\') || self.next_byte()? != Some(b'u') {
                    return Err(self.error("unpaired surrogate in string"));
                }
                let second = self.read_hex4()?;
                if !(0xDC00..=0xDFFF).contains(&second) {
                    return Err(self.error("invalid low surrogate in string"));
                }
                0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00)
            },
            0xDC00..=0xDFFF => return Err(self.error("unpaired surrogate in string")),
            _ => first,
        };
        char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"))
    }

    fn read_hex4(&mut self) -> Result<u32> {
        let mut code = 0;
        for _ in 0..4 {
            let Some(b) = self.next_byte()? else {
                return Err(self.eof());
            };
            let digit = char::from(b).to_digit(16).ok_or_else(|| self.unexpected(b, "a hex digit"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn read_number(&mut self) -> Result<()> {
        self.text.clear();
        while let Some(b) = self.peek_byte()? {
            if !matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            self.text.push(char::from(b));
            self.bump();
        }
        let number = serde_json::from_str::<Number>(&self.text)
            .map_err(|e| self.error(format!("invalid number {:?}: {e}", self.text)))?;
        self.number = Some(number);
        Ok(())
    }

    fn read_literal(&mut self, literal: &'static [u8]) -> Result<()> {
        for &expected in literal {
            match self.next_byte()? {
                Some(b) if b == expected => {},
                Some(b) => return Err(self.unexpected(b, "a literal")),
                None => return Err(self.eof()),
            }
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) -> Result<Option<u8>> {
        while let Some(b) = self.peek_byte()? {
            if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                return Ok(Some(b));
            }
            self.bump();
        }
        Ok(None)
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.bump();
        }
        Ok(b)
    }

    fn bump(&mut self) {
        self.inner.consume(1);
        self.offset += 1;
    }

    fn error(&self, msg: impl std::fmt::Display) -> Status {
        Status::corruption(format!("{msg} at offset {}", self.offset))
    }

    fn eof(&self) -> Status {
        self.error("unexpected end of input")
    }

    fn unexpected(&self, b: u8, expected: &str) -> Status {
        self.error(format!("unexpected {:?}, expected {expected}", char::from(b)))
    }
}
