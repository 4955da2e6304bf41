//! Percent-encoding of object keys in trigger events.
//!
//! Object-created notifications deliver keys query-escaped: `%XX` for
//! reserved bytes and `+` for spaces. Decoding is strict, so a stray `%`
//! is an error instead of being passed through.

use std::borrow::Cow;

/// Why an object key could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyDecodeError {
    /// A `%` not followed by two hex digits. Holds up to three chars from the `%`.
    #[error("invalid URL escape \"{0}\"")]
    InvalidEscape(String),

    #[error("decoded key is not valid UTF-8")]
    InvalidUtf8,
}

/// Decode a query-escaped object key.
pub fn decode_object_key(raw: &str) -> Result<String, KeyDecodeError> {
    check_escapes(raw)?;

    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };

    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|_| KeyDecodeError::InvalidUtf8)
}

/// Encode an object key the way notifications deliver it.
pub fn encode_object_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

fn check_escapes(raw: &str) -> Result<(), KeyDecodeError> {
    let bytes = raw.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'%' {
            continue;
        }
        let valid = bytes.len() > i + 2
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit();
        if !valid {
            let snippet: String = raw[i..].chars().take(3).collect();
            return Err(KeyDecodeError::InvalidEscape(snippet));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_escaped_hyphen() {
        assert_eq!(decode_object_key("file%2Dkey").unwrap(), "file-key");
    }

    #[test]
    fn plus_is_space() {
        assert_eq!(
            decode_object_key("my+report%2B2024.pdf").unwrap(),
            "my report+2024.pdf"
        );
    }

    #[test]
    fn plain_key_is_unchanged() {
        assert_eq!(
            decode_object_key("uploads/2024/a.txt").unwrap(),
            "uploads/2024/a.txt"
        );
    }

    #[test]
    fn rejects_bad_escape() {
        let err = decode_object_key("bad key%%%").unwrap_err();
        assert_eq!(err.to_string(), "invalid URL escape \"%%%\"");
    }

    #[test]
    fn rejects_truncated_escape() {
        let err = decode_object_key("key%4").unwrap_err();
        assert_eq!(err, KeyDecodeError::InvalidEscape("%4".into()));

        let err = decode_object_key("key%").unwrap_err();
        assert_eq!(err, KeyDecodeError::InvalidEscape("%".into()));
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert_eq!(
            decode_object_key("%FF%FE").unwrap_err(),
            KeyDecodeError::InvalidUtf8
        );
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let keys = [
            "file-key",
            "folder/sub folder/report (final).pdf",
            "100% legit+real.exe",
            "naïve/日本語.txt",
            "",
        ];
        for key in keys {
            let encoded = encode_object_key(key);
            assert_eq!(decode_object_key(&encoded).unwrap(), key, "key {key:?}");
        }
    }
}
