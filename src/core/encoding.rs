// LogTrail - core/encoding.rs
//
// Charset detection and decoding for raw log bytes.
//
// Detection is a pure function of a byte sample: a fresh statistical
// detector is built for every call, nothing is cached between passes.
// Anything that cannot be identified falls back to UTF-8, and decoding is
// always lossy so a bad byte run never aborts a read.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};

/// Pick the encoding for `sample` (typically the head of a file).
///
/// A byte-order mark wins outright; otherwise the statistical guess is
/// resolved through [`resolve_charset`].
pub fn detect_encoding(sample: &[u8]) -> &'static Encoding {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(sample) {
        tracing::trace!(encoding = encoding.name(), "Encoding from BOM");
        return encoding;
    }
    if sample.is_ascii() {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, true);
    let guess = detector.guess(None, true);
    let resolved = resolve_charset(guess.name());

    tracing::debug!(
        guess = guess.name(),
        resolved = resolved.name(),
        sample_bytes = sample.len(),
        "Encoding detected"
    );
    resolved
}

/// Map a charset name to a decoder.
///
/// Shift-JIS in any common spelling resolves to the Windows Japanese code
/// page (932), which the statistical detector cannot tell apart from plain
/// Shift-JIS; encoding_rs's `SHIFT_JIS` decoder is that superset. Unknown
/// names fall back to UTF-8.
pub fn resolve_charset(label: &str) -> &'static Encoding {
    let normalised = label.trim().to_ascii_lowercase().replace('-', "_");
    match normalised.as_str() {
        "shift_jis" | "sjis" | "windows_31j" | "cp932" | "ms932" => SHIFT_JIS,
        _ => Encoding::for_label(label.trim().as_bytes())
            .or_else(|| Encoding::for_label(normalised.as_bytes()))
            .unwrap_or_else(|| {
                tracing::debug!(label, "Unrecognised charset; falling back to UTF-8");
                UTF_8
            }),
    }
}

/// Decode `bytes` lossily. A leading BOM is only honoured and stripped when
/// the bytes start at offset 0 of the file.
pub fn decode(bytes: &[u8], encoding: &'static Encoding, at_file_start: bool) -> String {
    let (text, had_errors) = if at_file_start {
        let (text, _used, had_errors) = encoding.decode(bytes);
        (text, had_errors)
    } else {
        encoding.decode_without_bom_handling(bytes)
    };
    if had_errors {
        tracing::debug!(
            encoding = encoding.name(),
            "Malformed byte sequences replaced during decode"
        );
    }
    text.into_owned()
}
