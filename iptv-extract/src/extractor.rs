//! URL and device-identifier extraction.

use std::sync::OnceLock;

use regex::Regex;

use crate::expiry::{self, Trailing};
use crate::warning::ExtractionWarning;

const URL_PATTERN: &str = r"http\S+";
const DEVICE_PATTERN: &str = r"\b[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5}\b";

/// A device identifier found in the text, with its expiry annotation if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// Upper-cased hardware-address-shaped identifier
    pub device_id: String,
    /// Date/time text that followed the identifier on its record, verbatim.
    /// Informational only.
    pub raw_expiry: Option<String>,
}

/// One `(server_url, device_id)` combination proposed for validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointCandidate {
    pub server_url: String,
    pub device_id: String,
}

/// Everything found in one blob of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// URLs in order of appearance, duplicates included
    pub urls: Vec<String>,
    /// Device identifiers in order of appearance, duplicates included
    pub devices: Vec<DeviceCandidate>,
    /// Non-fatal problems noticed along the way
    pub warnings: Vec<ExtractionWarning>,
}

impl Extraction {
    /// True when nothing usable was found.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.devices.is_empty()
    }

    /// The cross product of every URL with every device, URL-major.
    ///
    /// Duplicates in the input produce duplicate candidates.
    pub fn candidates(&self) -> Vec<EndpointCandidate> {
        self.urls
            .iter()
            .flat_map(|url| {
                self.devices.iter().map(move |device| EndpointCandidate {
                    server_url: url.clone(),
                    device_id: device.device_id.clone(),
                })
            })
            .collect()
    }
}

/// Compiled extraction patterns.
///
/// Cheap to share; [`extract`] uses a process-wide instance.
#[derive(Debug, Clone)]
pub struct Extractor {
    url: Regex,
    device: Regex,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            url: Regex::new(URL_PATTERN).expect("URL pattern is valid"),
            device: Regex::new(DEVICE_PATTERN).expect("device pattern is valid"),
        }
    }

    /// Extract URLs and device identifiers from `text`.
    pub fn extract(&self, text: &str) -> Extraction {
        let mut extraction = Extraction {
            urls: self.url.find_iter(text).map(|m| m.as_str().to_string()).collect(),
            ..Default::default()
        };

        for line in text.lines() {
            self.extract_devices(line, &mut extraction);
        }

        extraction
    }

    fn extract_devices(&self, line: &str, extraction: &mut Extraction) {
        let matches: Vec<_> = self
            .device
            .find_iter(line)
            .filter(|m| !continues_address(line, m.start(), m.end()))
            .collect();

        for (index, m) in matches.iter().enumerate() {
            let device_id = m.as_str().to_ascii_uppercase();

            // The annotation runs until the next identifier or URL on the line.
            let rest = &line[m.end()..];
            let mut end = matches.get(index + 1).map_or(line.len(), |next| next.start()) - m.end();
            if let Some(url) = self.url.find(rest) {
                end = end.min(url.start());
            }

            let raw_expiry = match expiry::classify(&rest[..end]) {
                Trailing::Empty => None,
                Trailing::Expiry(text) => Some(text),
                Trailing::Malformed(text) => {
                    extraction.warnings.push(ExtractionWarning::MalformedExpiry {
                        device_id: device_id.clone(),
                        text,
                    });
                    None
                }
            };

            extraction.devices.push(DeviceCandidate {
                device_id,
                raw_expiry,
            });
        }
    }
}

/// True when a six-group match is really part of a longer colon-separated hex run.
fn continues_address(line: &str, start: usize, end: usize) -> bool {
    let bytes = line.as_bytes();
    let word_at = |at: usize| bytes.get(at).is_some_and(|b| b.is_ascii_alphanumeric());
    let hex_pair_at = |at: usize| {
        at + 1 < bytes.len() && bytes[at].is_ascii_hexdigit() && bytes[at + 1].is_ascii_hexdigit()
    };

    // "MAC:00:1A:..." is a label, "11:00:1A:..." is a seventh group.
    let before = start >= 3
        && bytes[start - 1] == b':'
        && hex_pair_at(start - 3)
        && (start == 3 || !word_at(start - 4));
    let after = end < bytes.len() && bytes[end] == b':' && hex_pair_at(end + 1) && !word_at(end + 3);
    before || after
}

fn shared() -> &'static Extractor {
    static EXTRACTOR: OnceLock<Extractor> = OnceLock::new();
    EXTRACTOR.get_or_init(Extractor::new)
}

/// Extract URLs and device identifiers from `text`.
pub fn extract(text: &str) -> Extraction {
    shared().extract(text)
}

/// Extract from raw bytes, replacing invalid UTF-8 instead of failing.
pub fn extract_bytes(bytes: &[u8]) -> Extraction {
    shared().extract(&String::from_utf8_lossy(bytes))
}
