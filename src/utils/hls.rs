use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF:";
const MEDIA_SEGMENT_TAG: &str = "#EXTINF:";

/// One rendition entry of a master playlist.
///
/// `link` is always absolute, `source_order` is the 0-based position of the
/// entry in the playlist text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamVariant {
    pub quality: String,
    pub link: String,
    pub source_order: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedPlaylist {
    pub variants: Vec<StreamVariant>,
    /// The fetched "master" url turned out to be a media playlist; `variants`
    /// holds a single synthetic `auto` entry pointing back at it.
    pub is_media_playlist_fallback: bool,
}

/// Parses master playlist text into quality-labeled variants.
///
/// Relative variant uris are resolved against `playlist_url` (the url the
/// text was actually fetched from). Unrecognizable text yields an empty
/// result, never an error; a stream-inf tag without a following uri line is
/// skipped.
pub fn parse_master_playlist(playlist_text: &str, playlist_url: &str) -> ParsedPlaylist {
    let lines: Vec<&str> = playlist_text.lines().map(str::trim).collect();
    let mut variants: Vec<StreamVariant> = vec![];

    for (idx, line) in lines.iter().enumerate() {
        if !line.starts_with(STREAM_INF_TAG) {
            continue;
        }

        let uri = match lines.get(idx + 1) {
            Some(next) if !next.is_empty() && !next.starts_with('#') => next,
            _ => continue,
        };

        variants.push(StreamVariant {
            quality: quality_label(line),
            link: resolve_uri(playlist_url, uri),
            source_order: variants.len(),
        });
    }

    if variants.is_empty() && playlist_text.contains(MEDIA_SEGMENT_TAG) {
        return ParsedPlaylist {
            variants: vec![StreamVariant {
                quality: "auto".into(),
                link: playlist_url.into(),
                source_order: 0,
            }],
            is_media_playlist_fallback: true,
        };
    }

    ParsedPlaylist {
        variants,
        is_media_playlist_fallback: false,
    }
}

/// Quality tag for a stream-inf line: resolution height wins over bandwidth,
/// bandwidth renders as kbps, anything else is `auto`. Values are taken as
/// written, without sanity checks.
fn quality_label(tag_line: &str) -> String {
    static RESOLUTION_RE: OnceLock<Regex> = OnceLock::new();
    static BANDWIDTH_RE: OnceLock<Regex> = OnceLock::new();

    let height = RESOLUTION_RE
        .get_or_init(|| Regex::new(r"[:,]RESOLUTION=-?\d+x(?<height>-?\d+)").unwrap())
        .captures(tag_line)
        .and_then(|m| Some(m.name("height")?.as_str()));
    if let Some(height) = height {
        return format!("{height}p");
    }

    let bits = BANDWIDTH_RE
        .get_or_init(|| Regex::new(r"[:,]BANDWIDTH=(?<bits>-?\d+)").unwrap())
        .captures(tag_line)
        .and_then(|m| m.name("bits")?.as_str().parse::<i64>().ok());
    match bits {
        Some(bits) => format!("{}k", (bits as f64 / 1000.0).round() as i64),
        None => "auto".into(),
    }
}

/// Resolves a variant uri against the playlist url it came from.
fn resolve_uri(base_url: &str, uri: &str) -> String {
    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(uri) {
            return resolved.to_string();
        }
    }

    // last resort for base urls the url crate refuses to parse
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return uri.into();
    }
    match base_url.rfind('/') {
        Some(pos) => format!("{}/{}", &base_url[..pos], uri),
        None => format!("{base_url}/{uri}"),
    }
}

/// Display ordering used by callers: variants grouped by language/category
/// tag in first-seen order, each group sorted by descending quality number
/// (`auto` and unparsable labels last), ties kept in playlist order.
pub fn group_variants_for_display(
    tagged: impl IntoIterator<Item = (String, StreamVariant)>,
) -> IndexMap<String, Vec<StreamVariant>> {
    let mut groups: IndexMap<String, Vec<StreamVariant>> = IndexMap::new();

    for (tag, variant) in tagged {
        groups.entry(tag).or_default().push(variant);
    }

    for group in groups.values_mut() {
        group.sort_by(|a, b| {
            quality_rank(&b.quality)
                .cmp(&quality_rank(&a.quality))
                .then_with(|| a.source_order.cmp(&b.source_order))
        });
    }

    groups
}

fn quality_rank(quality: &str) -> Option<u32> {
    static DIGITS_RE: OnceLock<Regex> = OnceLock::new();
    DIGITS_RE
        .get_or_init(|| Regex::new(r"\d+").unwrap())
        .find(quality)
        .and_then(|m| m.as_str().parse().ok())
}
