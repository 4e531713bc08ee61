use std::sync::OnceLock;

use regex::Regex;

/// `file: 'https://...'` property of a player setup call.
pub fn extract_file_property(script: &str) -> Option<&str> {
    static FILE_PROPERTY_RE: OnceLock<Regex> = OnceLock::new();
    FILE_PROPERTY_RE
        .get_or_init(|| Regex::new(r#"file:\s?['"](?<file>[^'"]+)['"]"#).unwrap())
        .captures(script)
        .and_then(|m| Some(m.name("file")?.as_str()))
}

/// `"hls2": "https://....m3u8?..."` property of a player setup call.
pub fn extract_hls_property(script: &str) -> Option<&str> {
    static HLS_PROPERTY_RE: OnceLock<Regex> = OnceLock::new();
    HLS_PROPERTY_RE
        .get_or_init(|| {
            Regex::new(r#""hls[^"}]*":\s?"(?<file>https?://[^"]+\.m3u8[^"]*)""#).unwrap()
        })
        .captures(script)
        .and_then(|m| Some(m.name("file")?.as_str()))
}

pub fn to_full_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.into()
    }
}
