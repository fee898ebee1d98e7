//! # iptv-extract
//!
//! Turns unstructured subscription text (pasted forum posts, text files, web
//! pages) into candidate endpoints: the server URLs and the device
//! identifiers found in it.
//!
//! Extraction is a pure function. It performs no network access and never
//! fails: text without matches yields an empty [`Extraction`], and malformed
//! expiry annotations are reported as [`ExtractionWarning`]s alongside the
//! identifiers they belong to.
//!
//! ## Usage
//!
//! ```rust
//! use iptv_extract::extract;
//!
//! let text = "http://svc.example/c\n00:1A:79:70:E2:97 Expiry: 2025-01-05";
//! let extraction = extract(text);
//!
//! assert_eq!(extraction.urls, vec!["http://svc.example/c".to_string()]);
//! assert_eq!(extraction.devices[0].device_id, "00:1A:79:70:E2:97");
//! assert_eq!(extraction.devices[0].raw_expiry.as_deref(), Some("2025-01-05"));
//! ```

mod expiry;
mod extractor;
mod warning;

pub use extractor::{extract, extract_bytes, DeviceCandidate, EndpointCandidate, Extraction, Extractor};
pub use warning::ExtractionWarning;
