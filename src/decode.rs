//! Payload decoding: raw transport bytes to XML text.

use std::io::Read;

use flate2::read::GzDecoder;
use tracing::debug;

pub(crate) const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extracts the XML document carried by a feed payload.
///
/// Gzip-compressed payloads are inflated first; only when inflation fails are
/// the original bytes scanned instead. Returns `None` when no `<` is found,
/// which callers treat as binary/control traffic rather than an error.
pub fn extract_xml(payload: &[u8]) -> Option<String> {
    if payload.starts_with(&GZIP_MAGIC) {
        match gunzip(payload) {
            Ok(inflated) => return xml_from(&inflated),
            Err(e) => debug!(error = %e, bytes = payload.len(), "Gzip inflate failed, scanning raw bytes"),
        }
    }

    xml_from(payload)
}

pub(crate) fn gunzip(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(payload);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn xml_from(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    text.find('<').map(|start| text[start..].to_string())
}
