// Single-pass JSON reader and string escaper. The config, state and
// catalog files plus the generation API's response envelope are the only
// JSON this device touches, so a small hand-rolled scanner covers it;
// parsing is lenient about whitespace and ignores trailing bytes.

use alloc::string::String;
use alloc::vec::Vec;

const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Arr(Vec<Value>),
    Obj(Vec<(String, Value)>),
}

impl Value {
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Obj(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn idx(&self, i: usize) -> Option<&Value> {
        match self {
            Value::Arr(items) => items.get(i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Num(n) if *n >= 0.0 && *n <= u32::MAX as f64 => Some(*n as u32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

pub fn parse(data: &[u8]) -> Result<Value, &'static str> {
    let mut p = Parser { data, pos: 0 };
    p.skip_ws();
    p.value(0)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn expect_literal(&mut self, lit: &[u8], v: Value) -> Result<Value, &'static str> {
        if self.data.len() - self.pos >= lit.len() && &self.data[self.pos..self.pos + lit.len()] == lit {
            self.pos += lit.len();
            Ok(v)
        } else {
            Err("invalid literal")
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, &'static str> {
        if depth > MAX_DEPTH {
            return Err("nesting too deep");
        }
        match self.peek().ok_or("unexpected end of input")? {
            b'{' => self.object(depth),
            b'[' => self.array(depth),
            b'"' => Ok(Value::Str(self.string()?)),
            b't' => self.expect_literal(b"true", Value::Bool(true)),
            b'f' => self.expect_literal(b"false", Value::Bool(false)),
            b'n' => self.expect_literal(b"null", Value::Null),
            b'-' | b'0'..=b'9' => self.number(),
            _ => Err("unexpected character"),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, &'static str> {
        self.bump(); // '{'
        let mut pairs = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.bump();
            return Ok(Value::Obj(pairs));
        }
        loop {
            self.skip_ws();
            if self.peek() != Some(b'"') {
                return Err("expected object key");
            }
            let key = self.string()?;
            self.skip_ws();
            if self.bump() != Some(b':') {
                return Err("expected ':'");
            }
            self.skip_ws();
            let val = self.value(depth + 1)?;
            pairs.push((key, val));
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => return Ok(Value::Obj(pairs)),
                _ => return Err("expected ',' or '}'"),
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, &'static str> {
        self.bump(); // '['
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.bump();
            return Ok(Value::Arr(items));
        }
        loop {
            self.skip_ws();
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => return Ok(Value::Arr(items)),
                _ => return Err("expected ',' or ']'"),
            }
        }
    }

    fn string(&mut self) -> Result<String, &'static str> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump().ok_or("unterminated string")? {
                b'"' => return Ok(out),
                b'\\' => match self.bump().ok_or("unterminated escape")? {
                    b'"' => out.push('"'),
                    b'\\' => out.push('\\'),
                    b'/' => out.push('/'),
                    b'b' => out.push('\u{0008}'),
                    b'f' => out.push('\u{000C}'),
                    b'n' => out.push('\n'),
                    b'r' => out.push('\r'),
                    b't' => out.push('\t'),
                    b'u' => {
                        let cp = self.hex4()?;
                        let ch = if (0xD800..0xDC00).contains(&cp) {
                            // surrogate pair
                            if self.bump() != Some(b'\\') || self.bump() != Some(b'u') {
                                return Err("lone surrogate");
                            }
                            let lo = self.hex4()?;
                            if !(0xDC00..0xE000).contains(&lo) {
                                return Err("invalid surrogate pair");
                            }
                            0x10000 + ((cp - 0xD800) << 10) + (lo - 0xDC00)
                        } else {
                            cp
                        };
                        out.push(char::from_u32(ch).ok_or("invalid codepoint")?);
                    }
                    _ => return Err("invalid escape"),
                },
                c if c < 0x80 => out.push(c as char),
                c => {
                    // re-assemble multi-byte UTF-8 as-is
                    let start = self.pos - 1;
                    let len = match c {
                        0xC0..=0xDF => 2,
                        0xE0..=0xEF => 3,
                        0xF0..=0xF7 => 4,
                        _ => return Err("invalid utf-8"),
                    };
                    if start + len > self.data.len() {
                        return Err("invalid utf-8");
                    }
                    let s = core::str::from_utf8(&self.data[start..start + len])
                        .map_err(|_| "invalid utf-8")?;
                    out.push_str(s);
                    self.pos = start + len;
                }
            }
        }
    }

    fn hex4(&mut self) -> Result<u32, &'static str> {
        let mut v = 0u32;
        for _ in 0..4 {
            let c = self.bump().ok_or("truncated \\u escape")?;
            let d = match c {
                b'0'..=b'9' => (c - b'0') as u32,
                b'a'..=b'f' => (c - b'a') as u32 + 10,
                b'A'..=b'F' => (c - b'A') as u32 + 10,
                _ => return Err("invalid \\u escape"),
            };
            v = (v << 4) | d;
        }
        Ok(v)
    }

    fn number(&mut self) -> Result<Value, &'static str> {
        let neg = self.peek() == Some(b'-');
        if neg {
            self.bump();
        }

        let mut int = 0f64;
        let mut any = false;
        while let Some(c @ b'0'..=b'9') = self.peek() {
            int = int * 10.0 + (c - b'0') as f64;
            any = true;
            self.bump();
        }
        if !any {
            return Err("invalid number");
        }

        if self.peek() == Some(b'.') {
            self.bump();
            let mut scale = 0.1;
            let mut frac_any = false;
            while let Some(c @ b'0'..=b'9') = self.peek() {
                int += (c - b'0') as f64 * scale;
                scale *= 0.1;
                frac_any = true;
                self.bump();
            }
            if !frac_any {
                return Err("invalid number");
            }
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.bump();
            let exp_neg = match self.peek() {
                Some(b'-') => {
                    self.bump();
                    true
                }
                Some(b'+') => {
                    self.bump();
                    false
                }
                _ => false,
            };
            let mut exp = 0u32;
            let mut exp_any = false;
            while let Some(c @ b'0'..=b'9') = self.peek() {
                exp = (exp * 10 + (c - b'0') as u32).min(400);
                exp_any = true;
                self.bump();
            }
            if !exp_any {
                return Err("invalid number");
            }
            for _ in 0..exp {
                if exp_neg {
                    int /= 10.0;
                } else {
                    int *= 10.0;
                }
            }
        }

        Ok(Value::Num(if neg { -int } else { int }))
    }
}

/// Append `s` as a quoted, escaped JSON string.
pub fn escape_into(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str("\\u00");
                let b = c as u8;
                const HEX: &[u8; 16] = b"0123456789abcdef";
                out.push(HEX[(b >> 4) as usize] as char);
                out.push(HEX[(b & 0xF) as usize] as char);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn parses_nested_config_shape() {
        let v = parse(
            br#"{"display": {"width": 240, "height": 240},
                 "generation": {"steps": 20, "cfg_scale": 7.5},
                 "name": "pico"}"#,
        )
        .unwrap();
        assert_eq!(v.get("display").and_then(|d| d.get("width")).and_then(Value::as_u32), Some(240));
        assert_eq!(
            v.get("generation").and_then(|g| g.get("cfg_scale")).and_then(Value::as_f64),
            Some(7.5)
        );
        assert_eq!(v.get("name").and_then(Value::as_str), Some("pico"));
        assert!(v.get("missing").is_none());
    }

    #[test]
    fn parses_arrays_and_nulls() {
        let v = parse(br#"{"values": ["a", "b"], "seed": null, "on": true}"#).unwrap();
        assert_eq!(v.get("values").and_then(|a| a.idx(1)).and_then(Value::as_str), Some("b"));
        assert!(v.get("seed").unwrap().is_null());
        assert_eq!(v.get("on").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn parses_negative_and_exponent_numbers() {
        assert_eq!(parse(b"-12").unwrap().as_f64(), Some(-12.0));
        assert_eq!(parse(b"1.5e2").unwrap().as_f64(), Some(150.0));
        assert_eq!(parse(b"25e-1").unwrap().as_f64(), Some(2.5));
        assert_eq!(parse(b"-3").unwrap().as_u32(), None);
    }

    #[test]
    fn parses_string_escapes() {
        let v = parse(br#""a\"b\\c\ndA""#).unwrap();
        assert_eq!(v.as_str(), Some("a\"b\\c\ndA"));
    }

    #[test]
    fn parses_surrogate_pairs() {
        let v = parse(br#""\uD83D\uDE00""#).unwrap();
        assert_eq!(v.as_str(), Some("\u{1F600}"));
    }

    #[test]
    fn parses_bmp_unicode_escape() {
        let v = parse(br#""caf\u00e9""#).unwrap();
        assert_eq!(v.as_str(), Some("caf\u{e9}"));
    }

    #[test]
    fn passes_raw_utf8_through() {
        let v = parse("\"caf\u{e9} \u{1F600}\"".as_bytes()).unwrap();
        assert_eq!(v.as_str(), Some("caf\u{e9} \u{1F600}"));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse(b"{").is_err());
        assert!(parse(b"{\"a\" 1}").is_err());
        assert!(parse(b"[1,]").is_err());
        assert!(parse(b"nul").is_err());
        assert!(parse(b"").is_err());
    }

    #[test]
    fn escape_round_trips_through_parse() {
        let original = "he said \"hi\"\n\tback\\slash";
        let mut doc = "{\"k\": ".to_string();
        escape_into(&mut doc, original);
        doc.push('}');
        let v = parse(doc.as_bytes()).unwrap();
        assert_eq!(v.get("k").and_then(Value::as_str), Some(original));
    }
}
