use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::NormalizeError;

const FORMAT: &str = "structured-text";
const OPEN: &str = "@{";
// same recursion limit serde_json applies
const MAX_DEPTH: usize = 128;

pub fn looks_structured(input: &str) -> bool {
    input.trim_start().starts_with(OPEN)
}

/// PowerShell `@{key=value; ...}` text as a JSON object; malformed input
/// comes back unchanged as a string.
pub fn parse_structured_text(input: &str) -> Value {
    match try_parse_structured_text(input) {
        Ok(map) => Value::Object(map),
        Err(e) => {
            debug!("keeping raw value: {}", e);
            Value::String(input.to_string())
        }
    }
}

pub fn try_parse_structured_text(input: &str) -> Result<Map<String, Value>, NormalizeError> {
    let trimmed = input.trim();
    let mut cursor = Cursor::new(trimmed);
    if !cursor.starts_with(OPEN) {
        return Err(cursor.error("expected '@{'"));
    }
    let map = cursor.parse_object()?;
    cursor.skip_ws();
    if !cursor.at_end() {
        return Err(cursor.error("trailing content after closing brace"));
    }
    Ok(map)
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.src[self.pos..].starts_with(pat)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, reason: &str) -> NormalizeError {
        NormalizeError::malformed(FORMAT, self.pos, reason)
    }

    fn parse_object(&mut self) -> Result<Map<String, Value>, NormalizeError> {
        if self.depth == MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let parsed = self.parse_members();
        self.depth -= 1;
        parsed
    }

    fn parse_members(&mut self) -> Result<Map<String, Value>, NormalizeError> {
        self.pos += OPEN.len();
        let mut map = Map::new();

        loop {
            // separators, including a trailing one before '}'
            while matches!(self.peek(), Some(b) if b == b';' || b.is_ascii_whitespace()) {
                self.pos += 1;
            }
            match self.peek() {
                None => return Err(self.error("unterminated object")),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(map);
                }
                Some(_) => {}
            }

            let key = self.parse_key()?;
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.peek() {
                Some(b';') => self.pos += 1,
                Some(b'}') => {}
                None => return Err(self.error("unterminated object")),
                Some(_) => return Err(self.error("expected ';' or '}' after value")),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, NormalizeError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'=' => break,
                b';' | b'}' => return Err(self.error("missing '=' after key")),
                _ => self.pos += 1,
            }
        }
        if self.at_end() {
            return Err(self.error("missing '=' after key"));
        }
        let key = self.src[start..self.pos].trim();
        if key.is_empty() {
            return Err(self.error("empty key"));
        }
        self.pos += 1;
        Ok(key.to_string())
    }

    fn parse_value(&mut self) -> Result<Value, NormalizeError> {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
        if self.starts_with(OPEN) {
            return self.parse_object().map(Value::Object);
        }
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => self.parse_quoted(quote).map(Value::String),
            _ => Ok(Value::String(self.parse_scalar())),
        }
    }

    fn parse_quoted(&mut self, quote: u8) -> Result<String, NormalizeError> {
        let open_at = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut chunk_start = self.pos;

        loop {
            let Some(rel) = self.src.as_bytes()[self.pos..].iter().position(|&b| b == quote) else {
                self.pos = open_at;
                return Err(self.error("unterminated quoted string"));
            };
            let close = self.pos + rel;
            out.push_str(&self.src[chunk_start..close]);
            if self.src.as_bytes().get(close + 1) == Some(&quote) {
                out.push(quote as char);
                self.pos = close + 2;
                chunk_start = self.pos;
                continue;
            }
            self.pos = close + 1;
            return Ok(out);
        }
    }

    // balanced braces inside are kept (PowerShell array rendering)
    fn parse_scalar(&mut self) -> String {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'{' => depth += 1,
                b'}' if depth == 0 => break,
                b'}' => depth -= 1,
                b';' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        self.src[start..self.pos].trim().to_string()
    }
}
