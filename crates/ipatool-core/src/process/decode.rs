//! Extraction of typed payloads from the tool's stdout.
//!
//! The tool may print diagnostics around its JSON result, so decoding looks
//! for the first complete JSON object anywhere in the stream.

use serde_json::{Deserializer, Value};

use crate::error::{IpatoolError, Result};
use crate::models::ToolEvent;

/// Decode the first complete JSON object in `bytes` as `T`.
pub fn decode<T: ToolEvent>(bytes: &[u8]) -> Result<T> {
    let object = first_object(bytes).ok_or_else(|| {
        IpatoolError::decode(format!(
            "no JSON object found in {} bytes of output while expecting {}",
            bytes.len(),
            T::SHAPE
        ))
    })?;

    serde_json::from_value(object).map_err(|e| IpatoolError::Decode {
        message: format!("output is not a valid {} payload: {}", T::SHAPE, e),
        source: Some(e),
    })
}

/// First `{` that starts a complete JSON object, parsed as a `Value`.
///
/// Each candidate brace starts a fresh parse, so output with many stray
/// braces ahead of the payload costs quadratic time. The tool prints at most
/// a few diagnostic lines before its result, which keeps this negligible.
fn first_object(bytes: &[u8]) -> Option<Value> {
    let mut offset = 0;
    while let Some(start) = bytes[offset..].iter().position(|b| *b == b'{') {
        let start = offset + start;
        let mut stream = Deserializer::from_slice(&bytes[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
        offset = start + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchResults, StatusResult, VersionList};

    #[test]
    fn test_decodes_plain_payload() {
        let status: StatusResult = decode(br#"{"success": true}"#).unwrap();
        assert!(status.success);
    }

    #[test]
    fn test_tolerates_whitespace_and_diagnostics() {
        let raw = b"\n  warning: keychain is slow {not json}\n{\"apps\":[{\"id\":1,\"bundleID\":\"com.a\"}],\"count\":1}\ntrailing text\n";
        let results: SearchResults = decode(raw).unwrap();
        assert_eq!(results.count, Some(1));
        assert_eq!(results.apps[0].bundle(), Some("com.a"));
    }

    #[test]
    fn test_first_object_wins() {
        let raw = br#"{"success": false} {"success": true}"#;
        let status: StatusResult = decode(raw).unwrap();
        assert!(!status.success);
    }

    #[test]
    fn test_version_list_decodes_regardless_of_content() {
        let list: VersionList = decode(br#"{"level":"info"}"#).unwrap();
        assert!(list.external_version_ids.is_empty());
    }

    #[test]
    fn test_fails_without_object() {
        let err = decode::<StatusResult>(b"   plain text only [1, 2]  ").unwrap_err();
        assert!(matches!(err, IpatoolError::Decode { .. }));
    }

    #[test]
    fn test_fails_on_shape_mismatch() {
        let err = decode::<StatusResult>(br#"{"apps": []}"#).unwrap_err();
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn test_truncated_object_is_not_complete() {
        assert!(decode::<StatusResult>(br#"{"success": tr"#).is_err());
    }
}
