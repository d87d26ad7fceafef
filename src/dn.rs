//! Distinguished name parsing and path normalization.
//!
//! A DN is written leaf first (`cn=web1,ou=hosts,dc=example,dc=org`). The tree
//! index wants the opposite: a root-first [`PathKey`] with one segment per
//! hierarchy level, where every segment renders the same way no matter how
//! the directory spelled it (attribute type case, escaping, spacing, or the
//! order of `+`-joined pairs inside one level).
use crate::error::{InventoryError, Result};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// One `attribute=value` pair. `value` is fully unescaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ava {
    pub attribute: String,
    pub value: String,
}

impl Ava {
    fn render(&self) -> String {
        format!("{}={}", self.attribute, escape_value(&self.value))
    }
}

/// One hierarchy level; more than one pair when the DN used `+`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rdn(pub Vec<Ava>);

impl Rdn {
    /// Canonical text for this level: pairs sorted by rendered text, joined by `+`.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self.0.iter().map(Ava::render).collect();
        parts.sort();
        parts.join("+")
    }

    /// Values of `attribute` in this level, compared case-insensitively.
    pub fn values_of<'a>(&'a self, attribute: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |ava| ava.attribute.eq_ignore_ascii_case(attribute))
            .map(|ava| ava.value.as_str())
    }
}

/// Root-first normalized path of a DN.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(Vec<String>);

impl PathKey {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `self` sits at or below `base`.
    pub fn starts_with(&self, base: &PathKey) -> bool {
        self.0.starts_with(&base.0)
    }
}

impl fmt::Display for PathKey {
    /// Renders back into leaf-first DN order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in self.0.iter().rev() {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

/// Parse a DN into its levels, leaf first. The empty DN has no levels.
pub fn parse_dn(dn: &str) -> Result<Vec<Rdn>> {
    let malformed = |reason: &str| InventoryError::MalformedDn {
        dn: dn.to_string(),
        reason: reason.to_string(),
    };

    let mut rdns = Vec::new();
    let mut current = Vec::new();
    let mut chars = dn.chars().peekable();

    skip_spaces(&mut chars);
    if chars.peek().is_none() {
        return Ok(rdns);
    }

    loop {
        skip_spaces(&mut chars);
        let attribute = read_attribute(&mut chars).map_err(malformed)?;
        skip_spaces(&mut chars);
        let value = read_value(&mut chars).map_err(|reason| malformed(&reason))?;
        current.push(Ava { attribute, value });

        match chars.next() {
            None => {
                rdns.push(Rdn(std::mem::take(&mut current)));
                break;
            }
            Some('+') => {}
            Some(',') | Some(';') => {
                rdns.push(Rdn(std::mem::take(&mut current)));
                skip_spaces(&mut chars);
                if chars.peek().is_none() {
                    return Err(malformed("trailing separator"));
                }
            }
            Some(other) => return Err(malformed(&format!("unexpected character {other:?}"))),
        }
    }

    Ok(rdns)
}

/// Normalize a DN into a root-first [`PathKey`].
pub fn path_key(dn: &str) -> Result<PathKey> {
    let rdns = parse_dn(dn)?;
    let mut segments: Vec<String> = rdns.iter().map(Rdn::render).collect();
    segments.reverse();
    Ok(PathKey(segments))
}

/// The leaf (most specific) level of a DN, if any.
pub fn leaf_rdn(dn: &str) -> Result<Option<Rdn>> {
    Ok(parse_dn(dn)?.into_iter().next())
}

fn skip_spaces(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek() == Some(&' ') {
        chars.next();
    }
}

fn read_attribute(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, &'static str> {
    let mut attribute = String::new();
    loop {
        match chars.next() {
            Some('=') => break,
            Some(c) if c.is_ascii_alphanumeric() || c == '-' || c == '.' => {
                attribute.push(c.to_ascii_lowercase())
            }
            Some(' ') => {
                skip_spaces(chars);
                if chars.next() != Some('=') {
                    return Err("expected '=' after attribute type");
                }
                break;
            }
            Some(_) => return Err("invalid character in attribute type"),
            None => return Err("missing '=' in relative component"),
        }
    }
    if attribute.is_empty() {
        return Err("empty attribute type");
    }
    Ok(attribute)
}

fn read_value(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, String> {
    match chars.peek() {
        Some('#') => read_hex_value(chars),
        Some('"') => {
            chars.next();
            read_quoted_value(chars)
        }
        _ => read_plain_value(chars),
    }
}

/// `#` followed by the hex BER encoding; kept verbatim (lowercased) since the
/// encoding is opaque at this level.
fn read_hex_value(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, String> {
    let mut value = String::new();
    if let Some(hash) = chars.next() {
        value.push(hash);
    }
    while let Some(&c) = chars.peek() {
        if is_separator(c) {
            break;
        }
        if c == ' ' {
            skip_spaces(chars);
            break;
        }
        if !c.is_ascii_hexdigit() {
            return Err(format!("invalid character {c:?} in hex value"));
        }
        value.push(c.to_ascii_lowercase());
        chars.next();
    }
    if value.len() < 3 || !(value.len() - 1).is_multiple_of(2) {
        return Err("hex value must carry an even number of digits".to_string());
    }
    Ok(value)
}

fn read_quoted_value(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, String> {
    let mut bytes = Vec::new();
    loop {
        match chars.next() {
            Some('"') => break,
            Some('\\') => read_escape(chars, &mut bytes)?,
            Some(c) => push_char(&mut bytes, c),
            None => return Err("unterminated quoted value".to_string()),
        }
    }
    skip_spaces(chars);
    String::from_utf8(bytes).map_err(|_| "value is not valid UTF-8".to_string())
}

fn read_plain_value(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, String> {
    let mut bytes = Vec::new();
    // Unescaped trailing spaces are insignificant.
    let mut keep = 0;
    while let Some(&c) = chars.peek() {
        if is_separator(c) {
            break;
        }
        chars.next();
        match c {
            '\\' => {
                read_escape(chars, &mut bytes)?;
                keep = bytes.len();
            }
            '"' => return Err("unescaped '\"' in value".to_string()),
            ' ' => push_char(&mut bytes, c),
            _ => {
                push_char(&mut bytes, c);
                keep = bytes.len();
            }
        }
    }
    bytes.truncate(keep);
    String::from_utf8(bytes).map_err(|_| "value is not valid UTF-8".to_string())
}

fn read_escape(
    chars: &mut Peekable<Chars<'_>>,
    bytes: &mut Vec<u8>,
) -> std::result::Result<(), String> {
    let Some(first) = chars.next() else {
        return Err("dangling escape".to_string());
    };
    if first.is_ascii_hexdigit() {
        let second = chars
            .next()
            .filter(char::is_ascii_hexdigit)
            .ok_or_else(|| "incomplete hex escape".to_string())?;
        let pair: String = [first, second].iter().collect();
        let byte = u8::from_str_radix(&pair, 16).map_err(|err| err.to_string())?;
        bytes.push(byte);
    } else {
        push_char(bytes, first);
    }
    Ok(())
}

fn push_char(bytes: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

fn is_separator(c: char) -> bool {
    matches!(c, ',' | ';' | '+')
}

/// RFC 4514 string escaping, applied uniformly so equivalent values render identically.
fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());
    for (idx, c) in value.chars().enumerate() {
        match c {
            '"' | '+' | ',' | ';' | '<' | '>' | '\\' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\00"),
            ' ' if idx == 0 || idx == last => out.push_str("\\ "),
            '#' if idx == 0 => out.push_str("\\#"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "dn_tests.rs"]
mod tests;
