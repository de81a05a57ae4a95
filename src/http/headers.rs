//! Case-insensitive header collection with incremental block parsing

use crate::{errors::ErrorKind, http::types::is_token};
use memchr::{memchr, memmem};
use std::collections::{btree_map, BTreeMap};

pub(crate) const CRLF: &[u8] = b"\r\n";

/// A header block: lowercased field name to a single, possibly merged, value.
///
/// Names are folded to lowercase on every access, so `Host`, `HOST` and
/// `host` address the same entry. Iteration (and therefore serialization)
/// follows name order.
///
/// # Examples
/// ```
/// use scratch_http::Headers;
///
/// let mut headers = Headers::new();
/// headers.set("Accept", "text/html");
/// headers.set("accept", "application/json");
///
/// assert_eq!(headers.get("ACCEPT"), Some("text/html,application/json"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    map: BTreeMap<String, String>,
}

impl Headers {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, joining it to an existing one with `,` (no space).
    pub fn set(&mut self, name: &str, value: &str) {
        match self.map.entry(name.to_ascii_lowercase()) {
            btree_map::Entry::Occupied(mut entry) => {
                let merged = entry.get_mut();
                merged.push(',');
                merged.push_str(value);
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value.to_owned());
            }
        }
    }

    /// Stores a value, discarding any previous one.
    #[inline]
    pub fn replace(&mut self, name: &str, value: &str) {
        self.map.insert(name.to_ascii_lowercase(), value.to_owned());
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Removes a field, returning its value.
    #[inline]
    pub fn delete(&mut self, name: &str) -> Option<String> {
        self.map.remove(&name.to_ascii_lowercase())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(&name.to_ascii_lowercase())
    }

    /// Parses the value as a signed decimal integer.
    ///
    /// Returns `default` when the field is absent or the value does not parse.
    pub fn get_int_or_default(&self, name: &str, default: i64) -> i64 {
        self.get(name)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Consumes every complete `CRLF`-terminated line at the front of `data`.
    ///
    /// Returns the number of bytes consumed and whether the terminating empty
    /// line was reached (it is consumed too). Trailing bytes without a `CRLF`
    /// are left for the next call.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::MalformedHeader`]: no colon, or the value is not UTF-8
    /// - [`ErrorKind::MalformedFieldName`]: the name is empty, is not a token,
    ///   or has whitespace before the colon
    pub fn parse(&mut self, data: &[u8]) -> Result<(usize, bool), ErrorKind> {
        let mut read = 0;

        while let Some(end) = memmem::find(&data[read..], CRLF) {
            if end == 0 {
                return Ok((read + CRLF.len(), true));
            }

            let (name, value) = parse_field_line(&data[read..read + end])?;
            self.set(name, value);
            read += end + CRLF.len();
        }

        Ok((read, false))
    }
}

fn parse_field_line(line: &[u8]) -> Result<(&str, &str), ErrorKind> {
    let colon = memchr(b':', line).ok_or(ErrorKind::MalformedHeader)?;
    let (name, value) = (&line[..colon], &line[colon + 1..]);

    if matches!(name.last(), Some(b' ' | b'\t')) || !is_token(name) {
        return Err(ErrorKind::MalformedFieldName);
    }

    // Token bytes are ASCII
    let name = std::str::from_utf8(name).map_err(|_| ErrorKind::MalformedFieldName)?;
    let value = simdutf8::basic::from_utf8(value).map_err(|_| ErrorKind::MalformedHeader)?;

    Ok((name, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_block() {
        let mut headers = Headers::new();
        let data = b"Host: localhost:42069\r\nFooFoo:     barbar        \r\n\r\n";

        assert_eq!(headers.parse(data), Ok((53, true)));
        assert_eq!(headers.get("Host"), Some("localhost:42069"));
        assert_eq!(headers.get("FooFoo"), Some("barbar"));
        assert_eq!(headers.get("MissingKey"), None);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn parse_merges_repeats() {
        let mut headers = Headers::new();
        let data = b"Host: localhost:42069\r\nHost: localhost:42069\r\n\r\n";

        assert_eq!(headers.parse(data), Ok((data.len(), true)));
        assert_eq!(headers.get("host"), Some("localhost:42069,localhost:42069"));
    }

    #[test]
    fn parse_incomplete() {
        #[rustfmt::skip]
        let cases: [(&[u8], (usize, bool)); 5] = [
            (b"",                             (0, false)),
            (b"Host: localhost",              (0, false)),
            (b"Host: localhost\r",            (0, false)),
            (b"Host: localhost\r\nAccept: *", (17, false)),
            (b"Host: localhost\r\n\r",        (17, false)),
        ];

        for (data, expected) in cases {
            let mut headers = Headers::new();
            assert_eq!(headers.parse(data), Ok(expected), "{data:?}");
        }
    }

    #[test]
    fn parse_leaves_body_untouched() {
        let mut headers = Headers::new();
        let data = b"Content-Length: 5\r\n\r\nhello";

        assert_eq!(headers.parse(data), Ok((21, true)));
        assert_eq!(headers.get_int_or_default("content-length", 0), 5);
    }

    #[test]
    fn parse_invalid() {
        #[rustfmt::skip]
        let cases: [(&[u8], ErrorKind); 7] = [
            (b"       Host : localhost:42069       \r\n\r\n", ErrorKind::MalformedFieldName),
            (b"Host : localhost\r\n\r\n",                     ErrorKind::MalformedFieldName),
            (b"Host\t: localhost\r\n\r\n",                    ErrorKind::MalformedFieldName),
            (b": empty-name\r\n\r\n",                         ErrorKind::MalformedFieldName),
            (b"Ho(s)t: localhost\r\n\r\n",                    ErrorKind::MalformedFieldName),
            (b"no-colon-here\r\n\r\n",                        ErrorKind::MalformedHeader),
            (b"X-Bin: \xff\xfe\r\n\r\n",                      ErrorKind::MalformedHeader),
        ];

        for (data, expected) in cases {
            let mut headers = Headers::new();
            assert_eq!(headers.parse(data), Err(expected), "{data:?}");
        }
    }

    #[test]
    fn parse_non_ascii_name() {
        let mut headers = Headers::new();
        let data = "HÂ©st: localhost:42069\r\n\r\n".as_bytes();

        assert_eq!(headers.parse(data), Err(ErrorKind::MalformedFieldName));
    }

    #[test]
    fn value_keeps_inner_colons() {
        let mut headers = Headers::new();

        assert_eq!(headers.parse(b"Host: localhost:42069\r\n"), Ok((23, false)));
        assert_eq!(headers.get("host"), Some("localhost:42069"));
    }

    #[test]
    fn set_replace_delete() {
        let mut headers = Headers::new();

        headers.set("X-Tag", "a");
        headers.set("x-tag", "b");
        assert_eq!(headers.get("X-TAG"), Some("a,b"));

        headers.replace("X-Tag", "c");
        assert_eq!(headers.get("x-tag"), Some("c"));

        assert!(headers.contains("X-Tag"));
        assert_eq!(headers.delete("X-TAG"), Some("c".to_string()));
        assert!(!headers.contains("x-tag"));
        assert!(headers.is_empty());
    }

    #[test]
    fn get_int() {
        let mut headers = Headers::new();
        headers.set("content-length", "42");
        headers.set("x-signed", "-7");
        headers.set("x-plus", "+3");
        headers.set("x-word", "seven");

        #[rustfmt::skip]
        let cases = [
            ("Content-Length", 42),
            ("x-signed",       -7),
            ("x-plus",          3),
            ("x-word",         99),
            ("x-missing",      99),
        ];

        for (name, expected) in cases {
            assert_eq!(headers.get_int_or_default(name, 99), expected, "{name}");
        }
    }

    #[test]
    fn iter_in_name_order() {
        let mut headers = Headers::new();
        headers.set("Zeta", "1");
        headers.set("Alpha", "2");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, [("alpha", "2"), ("zeta", "1")]);
    }
}
