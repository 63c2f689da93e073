//! Best-effort decoding of server text.
//!
//! Servers send text in whatever 8-bit code page their host happens to use. A
//! self-reported language is tried first, then a statistical guess over all of the
//! server's text fields, and finally the bytes are taken as they are.

use {
    chardetng::EncodingDetector,
    encoding_rs::{
        Encoding, EUC_KR, GB18030, SHIFT_JIS, WINDOWS_1250, WINDOWS_1251, WINDOWS_1253,
        WINDOWS_1254, WINDOWS_1256,
    },
    tracing::trace,
};

use crate::protocols::helpers::lossy;

/// Maps a self-reported server language to its legacy code page.
pub fn encoding_for_language(language: &str) -> Option<&'static Encoding> {
    let language = language.trim().to_lowercase();

    Some(match language.as_str() {
        "russian" | "ru" | "ru-ru" | "ukrainian" | "uk" | "uk-ua" | "belarusian" | "be"
        | "bulgarian" | "bg" | "macedonian" | "mk" | "serbian" | "sr" => WINDOWS_1251,
        "chinese" | "zh" | "zh-cn" | "zh-tw" => GB18030,
        "korean" | "ko" | "ko-kr" => EUC_KR,
        "japanese" | "ja" | "ja-jp" => SHIFT_JIS,
        "polish" | "pl" | "czech" | "cs" | "slovak" | "sk" | "hungarian" | "hu" | "romanian"
        | "ro" => WINDOWS_1250,
        "turkish" | "tr" | "kurdish" | "ku" => WINDOWS_1254,
        "greek" | "el" => WINDOWS_1253,
        "arabic" | "ar" | "persian" | "fa" | "urdu" | "ur" => WINDOWS_1256,
        _ => return None,
    })
}

/// Joins the server's text fields into one sample for charset detection.
pub fn detection_sample(hostname: &[u8], gamemode: &[u8], language: &[u8]) -> Vec<u8> {
    [hostname, gamemode, language].join(&b' ')
}

fn decode_with(encoding: &'static Encoding, raw: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(|s| s.into_owned())
}

fn guess_encoding(sample: &[u8]) -> Option<&'static Encoding> {
    if sample.is_empty() {
        return None;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, true);
    Some(detector.guess(None, true))
}

/// Decodes `raw` text using `language` as a hint and `sample` for detection.
/// Falls back to the bytes as-is when nothing better works.
pub fn decode_text(raw: &[u8], sample: &[u8], language: &str) -> String {
    if let Some(encoding) = encoding_for_language(language) {
        if let Some(decoded) = decode_with(encoding, raw) {
            return decoded;
        }
        trace!("{} does not decode as {}", language, encoding.name());
    }

    guess_encoding(sample)
        .and_then(|encoding| {
            trace!("Guessed {} for server text", encoding.name());
            decode_with(encoding, raw)
        })
        .unwrap_or_else(|| lossy(raw))
}
