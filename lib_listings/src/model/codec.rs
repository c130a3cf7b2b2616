//! # Batch Codec
//!
//! One inbound frame carries a JSON array of listings. There is no envelope and
//! no acknowledgement: a frame either decodes into a full batch or is dropped as
//! a whole.

use thiserror::Error;

use super::listing::Listing;

/// Reasons a frame is rejected.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not a JSON array of listing objects.
    #[error("malformed listing batch: {0}")]
    Json(#[from] serde_json::Error),

    /// A binary frame whose bytes are not UTF-8 text.
    #[error("binary frame is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A listing in the batch has an empty or whitespace-only id.
    #[error("listing at index {index} has a blank id")]
    BlankIdentity {
        /// Position of the offending record inside the batch.
        index: usize,
    },
}

/// Decodes a text frame into a batch of listings, in wire order.
pub fn decode_batch(text: &str) -> Result<Vec<Listing>, DecodeError> {
    let batch: Vec<Listing> = serde_json::from_str(text)?;

    if let Some(index) = batch.iter().position(|l| l.id.trim().is_empty()) {
        return Err(DecodeError::BlankIdentity { index });
    }

    Ok(batch)
}

/// Decodes a binary frame. The feed only speaks text, but some proxies re-frame
/// text as binary, so UTF-8 payloads are accepted the same way.
pub fn decode_binary_batch(bytes: &[u8]) -> Result<Vec<Listing>, DecodeError> {
    decode_batch(std::str::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_array_in_wire_order() {
        let text = r#"[
            {"id":"a","title":"Audi A4","priceEur":15900,"km":120000,"unknownField":true},
            {"id":"b","url":"https://example.org/b"}
        ]"#;

        let batch = decode_batch(text).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, "a");
        assert_eq!(batch[0].price_eur, Some(15_900));
        assert_eq!(batch[0].km, Some(120_000));
        assert_eq!(batch[1].url.as_deref(), Some("https://example.org/b"));
        assert!(batch[1].title.is_none());
    }

    #[test]
    fn empty_array_is_an_empty_batch() {
        assert!(decode_batch("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_array_payloads() {
        assert!(matches!(decode_batch(r#"{"id":"a"}"#), Err(DecodeError::Json(_))));
        assert!(matches!(decode_batch("not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_batch(r#"[{"title":"no id"}]"#), Err(DecodeError::Json(_))));
    }

    #[test]
    fn rejects_blank_identity() {
        let err = decode_batch(r#"[{"id":"ok"},{"id":"  "}]"#).unwrap_err();
        assert!(matches!(err, DecodeError::BlankIdentity { index: 1 }));
    }

    #[test]
    fn binary_frames_must_be_utf8() {
        assert_eq!(decode_binary_batch(br#"[{"id":"x"}]"#).unwrap().len(), 1);
        assert!(matches!(
            decode_binary_batch(&[0xff, 0xfe, 0x00]),
            Err(DecodeError::Utf8(_))
        ));
    }
}
