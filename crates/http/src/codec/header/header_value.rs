//! Parameterized header values such as
//! `form-data; name="file"; filename="a \"b\".txt"`.
//!
//! A value starting with `"` (after optional whitespace) is a quoted string:
//! a backslash escapes the following character and the string ends at the
//! next unescaped quote. Everything after the base value is a list of
//! `;`-separated `name=value` attributes whose values follow the same rule.

use std::fmt::Write;

use crate::protocol::ParseError;

/// A header value split into its base part and attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterizedValue {
    base: String,
    params: Vec<(String, String)>,
}

impl ParameterizedValue {
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self { base: base.into(), params: Vec::new() }
    }

    pub fn with_param<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn parse(value: &str) -> Result<Self, ParseError> {
        split_header_value(value)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Looks up an attribute by case-insensitive name, first match wins.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Renders the value with every attribute quoted.
    pub fn to_header_string(&self) -> String {
        let mut out = self.base.clone();
        for (name, value) in &self.params {
            let _ = write!(out, "; {name}={}", quote(value));
        }
        out
    }
}

/// Wraps `value` in quotes, escaping `\` and `"`.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Removes the quoting of a leading quoted-string.
///
/// Returns the unquoted text and the byte index of the closing quote, or the
/// untouched input and `None` when it does not start with a quote.
pub fn unquote(value: &str) -> Result<(String, Option<usize>), ParseError> {
    let start = match value.char_indices().find(|(_, c)| !c.is_whitespace()) {
        Some((index, '"')) => index,
        _ => return Ok((value.to_string(), None)),
    };

    let mut result = String::with_capacity(value.len());
    let mut chars = value[start + 1..].char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Ok((result, Some(start + 1 + index))),
            '\\' => match chars.next() {
                Some((_, escaped)) => result.push(escaped),
                None => return Err(ParseError::invalid_header("quoted string ends on an escape sequence")),
            },
            c => result.push(c),
        }
    }

    Err(ParseError::invalid_header("quoted string is missing the closing quotation mark"))
}

/// Splits a header value into its base value and `;`-separated attributes.
pub fn split_header_value(value: &str) -> Result<ParameterizedValue, ParseError> {
    let (quoted_base, closing) = unquote(value)?;
    let search_from = closing.map_or(0, |index| index + 1);

    let Some(splitter) = value[search_from..].find(';').map(|index| index + search_from) else {
        let base = if closing.is_some() { quoted_base } else { value.trim().to_string() };
        return Ok(ParameterizedValue::new(base));
    };

    let base = if closing.is_some() { quoted_base } else { value[..splitter].trim().to_string() };
    let mut parsed = ParameterizedValue::new(base);

    let mut pos = splitter + 1;
    while pos < value.len() {
        let rest = &value[pos..];
        let Some(delimiter) = rest.find(['=', ';']) else {
            push_flag(&mut parsed, rest);
            break;
        };

        if rest.as_bytes()[delimiter] == b';' {
            push_flag(&mut parsed, &rest[..delimiter]);
            pos += delimiter + 1;
            continue;
        }

        let name = rest[..delimiter].trim().to_string();
        pos += delimiter + 1;

        let raw = &value[pos..];
        let (unquoted, closing) = unquote(raw)?;
        let attribute = match closing {
            Some(index) => {
                pos += index + 1;
                unquoted
            }
            None => {
                let end = raw.find(';').unwrap_or(raw.len());
                pos += end;
                raw[..end].trim().to_string()
            }
        };

        // skip anything up to and including the next separator
        pos = value[pos..].find(';').map_or(value.len(), |index| pos + index + 1);
        parsed.params.push((name, attribute));
    }

    Ok(parsed)
}

fn push_flag(parsed: &mut ParameterizedValue, name: &str) {
    let name = name.trim();
    if !name.is_empty() {
        parsed.params.push((name.to_string(), String::new()));
    }
}
