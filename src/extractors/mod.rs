pub mod packed_player;

use futures::future::join_all;
use log::warn;

use crate::models::MediaItemSource;

/// One embed server candidate for a title.
#[derive(Debug, Clone)]
pub struct EmbedServer {
    pub name: String,
    pub url: String,
    pub referer: String,
}

/// Runs the packed-player extractor against every server concurrently.
/// A failing server logs the reason and contributes nothing; the result is
/// empty only when all servers fail.
pub async fn extract_servers(servers: &[EmbedServer]) -> Vec<MediaItemSource> {
    let extractions = servers.iter().map(|server| async move {
        match packed_player::extract(&server.url, &server.referer, &server.name).await {
            Ok(sources) => sources,
            Err(err) => {
                warn!("[extractors] server '{}' failed: {err}", server.name);
                vec![]
            }
        }
    });

    join_all(extractions).await.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn no_servers_yield_no_sources() {
        assert!(extract_servers(&[]).await.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn unreachable_server_degrades_to_empty() {
        let servers = [EmbedServer {
            name: "dead".into(),
            url: "http://127.0.0.1:9/e/abcdef".into(),
            referer: "http://127.0.0.1:9/".into(),
        }];

        assert!(extract_servers(&servers).await.is_empty());
    }
}
