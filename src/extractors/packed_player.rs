use std::{collections::HashMap, sync::OnceLock};

use anyhow::anyhow;
use regex::Regex;
use scraper::Selector;

use crate::{
    models::MediaItemSource,
    utils::{self, hls, text, unpack::packerjs},
};

/// Extracts streams from an embed page that hides its player config behind
/// p.a.c.k.e.r. packed js.
///
/// Provider differences are limited to `url`, `referer` and the `prefix`
/// used in source descriptions; the unpack/parse pipeline itself is shared.
pub async fn extract(
    url: &str,
    referer: &str,
    prefix: &str,
) -> anyhow::Result<Vec<MediaItemSource>> {
    let client = utils::create_client();

    let html = client
        .get(url)
        .header("Referer", referer)
        .send()
        .await?
        .text()
        .await?;

    let packer_script = find_packer_script(&html)
        .ok_or_else(|| anyhow!("[packed_player] no packer script found: {url}"))?;
    let unpacked = packerjs::unpack(&packer_script)?;

    let playlist_url = text::extract_hls_property(&unpacked)
        .or_else(|| text::extract_file_property(&unpacked))
        .map(text::to_full_url)
        .ok_or_else(|| anyhow!("[packed_player] no playlist url in unpacked script: {url}"))?;

    // resolution base is the url the playlist is fetched from, not the embed page
    let playlist_text = client
        .get(&playlist_url)
        .header("Referer", referer)
        .send()
        .await?
        .text()
        .await?;
    let parsed = hls::parse_master_playlist(&playlist_text, &playlist_url);

    let mut sources = variants_to_sources(parsed.variants, prefix, referer);
    sources.extend(subtitle_tracks(&unpacked, prefix));
    Ok(sources)
}

fn find_packer_script(html: &str) -> Option<String> {
    static SCRIPT_SELECTOR: OnceLock<Selector> = OnceLock::new();

    let document = scraper::Html::parse_document(html);
    document
        .select(SCRIPT_SELECTOR.get_or_init(|| Selector::parse("script").unwrap()))
        .filter_map(|el| el.text().next())
        .find(|script| packerjs::detect(script))
        .map(str::to_owned)
}

fn variants_to_sources(
    variants: Vec<hls::StreamVariant>,
    prefix: &str,
    referer: &str,
) -> Vec<MediaItemSource> {
    variants
        .into_iter()
        .map(|variant| MediaItemSource::Video {
            link: variant.link,
            description: format!("{prefix} {}", variant.quality),
            headers: Some(HashMap::from([("Referer".into(), referer.into())])),
        })
        .collect()
}

fn subtitle_tracks(script: &str, prefix: &str) -> Vec<MediaItemSource> {
    static TRACK_RE: OnceLock<Regex> = OnceLock::new();
    TRACK_RE
        .get_or_init(|| {
            Regex::new(
                r#"\{\s*file\s*:\s*['"](?<file>[^'"]+)['"]\s*,\s*label\s*:\s*['"](?<label>[^'"]+)['"]\s*,\s*kind\s*:\s*['"](?:captions?|subtitles?)['"]"#,
            )
            .unwrap()
        })
        .captures_iter(script)
        .map(|m| MediaItemSource::Subtitle {
            link: text::to_full_url(&m["file"]),
            description: format!("{prefix} {}", &m["label"]),
            headers: None,
        })
        .collect()
}
