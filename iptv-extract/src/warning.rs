//! Non-fatal observations made while extracting.

/// A problem noticed during extraction that did not stop it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionWarning {
    /// Text trailing a device identifier was not a recognisable date/time.
    /// The identifier itself was still extracted, with no expiry.
    #[error("Ignoring malformed expiry for device {device_id}: {text:?}")]
    MalformedExpiry {
        /// The device the annotation followed
        device_id: String,
        /// The trailing text as it appeared in the input
        text: String,
    },
}
