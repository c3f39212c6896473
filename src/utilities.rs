// URL helpers: parse, form-style percent-encode and decode.

use std::borrow::Cow;

use url::Url;

use crate::error::Result;

/// Parse a URL, prefixing `default_scheme` when the input has none.
pub fn url_parse(input: &str, default_scheme: Option<&str>) -> Result<Url> {
    match (Url::parse(input), default_scheme) {
        (Err(url::ParseError::RelativeUrlWithoutBase), Some(scheme)) => {
            let rest = input.trim_start_matches("//");
            Ok(Url::parse(&format!("{}://{}", scheme, rest))?)
        }
        (parsed, _) => Ok(parsed?),
    }
}

/// Percent-encode `input` for a query string, spaces as `+`.
/// Characters in `safe` are left untouched.
pub fn url_encode(input: &str, safe: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut buf = [0u8; 4];
    for ch in input.chars() {
        if ch == ' ' {
            out.push('+');
        } else if safe.contains(ch) {
            out.push(ch);
        } else {
            out.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    out
}

/// Decode a form-encoded string; `+` becomes a space, invalid UTF-8 is replaced.
pub fn url_decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    match urlencoding::decode_binary(spaced.as_bytes()) {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Cow::Owned(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}
