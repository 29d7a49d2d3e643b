//! Packing and unpacking of tag and field strings.
//!
//! Anki stores a note's tags as one space-joined string and its field
//! contents as one string joined by the ASCII unit separator (`0x1F`).
//!
//! The tag pair is not an exact inverse: leading, trailing and repeated
//! spaces are collapsed by [`split_tags`]. This matches how Anki itself
//! reads the column, so it is kept as is.

/// Separator between field values in the native `flds` column.
pub const FIELD_SEPARATOR: char = '\x1f';

/// Separator between tags in the native `tags` column.
pub const TAG_SEPARATOR: char = ' ';

/// Splits a space-joined tag string, dropping empty tokens.
///
/// # Examples
///
/// ```
/// use ankiframe_core::codec::split_tags;
///
/// assert_eq!(split_tags(" verb  jlpt5 "), vec!["verb", "jlpt5"]);
/// assert!(split_tags("").is_empty());
/// ```
pub fn split_tags(joined: &str) -> Vec<String> {
    joined
        .split(TAG_SEPARATOR)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_tags<S: AsRef<str>>(tags: &[S]) -> String {
    join(tags, TAG_SEPARATOR)
}

/// Splits a packed field string. An empty string is one empty field.
pub fn split_fields(joined: &str) -> Vec<String> {
    joined.split(FIELD_SEPARATOR).map(str::to_string).collect()
}

pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> String {
    join(fields, FIELD_SEPARATOR)
}

fn join<S: AsRef<str>>(items: &[S], sep: char) -> String {
    items
        .iter()
        .map(|item| item.as_ref())
        .collect::<Vec<&str>>()
        .join(sep.encode_utf8(&mut [0; 4]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip() {
        let tags = vec!["a".to_string(), "b".to_string()];
        assert_eq!(split_tags(&join_tags(&tags)), tags);
    }

    #[test]
    fn test_empty_tags() {
        let none: [&str; 0] = [];
        assert_eq!(join_tags(&none), "");
        assert!(split_tags("").is_empty());
        assert!(split_tags("   ").is_empty());
    }

    #[test]
    fn test_irregular_whitespace_collapses() {
        assert_eq!(join_tags(&split_tags("  a  b ")), "a b");
    }

    #[test]
    fn test_fields_exact_inverse() {
        let cases: Vec<Vec<&str>> = vec![
            vec!["front", "back"],
            vec![""],
            vec!["", "", ""],
            vec!["with space", " padded ", "<b>html</b>"],
        ];
        for fields in cases {
            assert_eq!(split_fields(&join_fields(&fields)), fields);
        }
    }

    #[test]
    fn test_split_fields_uses_unit_separator() {
        assert_eq!(split_fields("a\x1fb\x1f"), vec!["a", "b", ""]);
        assert_eq!(join_fields(&["x", "y"]), "x\x1fy");
    }
}
