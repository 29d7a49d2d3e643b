//! Note checksum and GUID generation, compatible with Anki.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use sha1::{Digest, Sha1};

static MEDIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["']?([^"'>]+)["']?[^>]*>"#).expect("static regex must compile")
});
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex must compile"));
static STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)<style.*?>.*?</style>").expect("static regex must compile"));
static SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)<script.*?>.*?</script>").expect("static regex must compile"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<.*?>").expect("static regex must compile"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("static regex must compile")
});

const GUID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// Removes HTML markup, keeping image file names as plain words.
///
/// # Examples
///
/// ```
/// use ankiframe_core::checksum::strip_html_media;
///
/// assert_eq!(strip_html_media("<b>cat</b>&nbsp;<img src=\"cat.jpg\">"), "cat  cat.jpg ");
/// ```
pub fn strip_html_media(html: &str) -> String {
    let s = MEDIA.replace_all(html, " $1 ");
    let s = COMMENT.replace_all(&s, "");
    let s = STYLE.replace_all(&s, "");
    let s = SCRIPT.replace_all(&s, "");
    let s = TAG.replace_all(&s, "");
    decode_entities(&s.replace("&nbsp;", " "))
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Checksum of a note's first field: the first 32 bits of the SHA-1 of its
/// HTML-stripped text.
pub fn field_checksum(field: &str) -> i64 {
    let digest = Sha1::digest(strip_html_media(field).as_bytes());
    i64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

/// Renders `num` in Anki's 91-character GUID alphabet.
pub fn base91(mut num: u64) -> String {
    let base = GUID_ALPHABET.len() as u64;
    let mut digits = Vec::new();
    while num > 0 {
        digits.push(GUID_ALPHABET[(num % base) as usize]);
        num /= base;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// A fresh random note GUID.
pub fn guid64() -> String {
    base91(rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_value() {
        // sha1("hello") = aaf4c61d...
        assert_eq!(field_checksum("hello"), 0xaaf4c61d);
        assert_eq!(field_checksum("<b>hello</b>"), 0xaaf4c61d);
    }

    #[test]
    fn test_strip_removes_style_script_comments() {
        let html = "<style>p{}</style>a<!-- note -->b<script>x()</script>c";
        assert_eq!(strip_html_media(html), "abc");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(strip_html_media("&lt;tag&gt; &amp; &#65;&#x42;"), "<tag> & AB");
        assert_eq!(strip_html_media("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_base91() {
        assert_eq!(base91(0), "");
        assert_eq!(base91(1), "b");
        assert_eq!(base91(91), "ba");
    }

    #[test]
    fn test_guid64_shape() {
        let guid = guid64();
        assert!(!guid.is_empty() && guid.len() <= 10);
        assert!(guid.bytes().all(|b| GUID_ALPHABET.contains(&b)));
    }
}
