//! M3U playlist parsing and download.
//!
//! The parser is deliberately tolerant: a directive line without a usable
//! URL line after it is dropped (and counted), never an error. Duplicate
//! entries are kept; the working set treats them as independent channels.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use regex::Regex;
use std::time::Duration;

use crate::models::ChannelRecord;

/// Upload/download cap, enforced before the full body is in memory.
const BYTES_PER_MB: u64 = 1024 * 1024;

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).unwrap();

    static ref PLAYLISTS_PARSED: IntCounter = register_int_counter!(
        "painel_playlists_parsed_total",
        "Playlists parsed into a working set"
    )
    .unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum M3uError {
    #[error("arquivo não é um M3U válido (cabeçalho #EXTM3U ausente)")]
    MissingHeader,
    #[error("playlist muito grande: {size_mb:.1}MB (limite {limit_mb}MB)")]
    TooLarge { size_mb: f64, limit_mb: usize },
    #[error("HTTP {0} ao baixar a playlist")]
    Http(u16),
    #[error("falha de rede ao baixar a playlist: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result of one parse: the channels in playlist order plus how many
/// directive lines were dropped for lacking a URL line.
#[derive(Debug)]
pub struct ParsedPlaylist {
    pub channels: Vec<ChannelRecord>,
    pub skipped: usize,
}

/// Attributes and display name carried by one `#EXTINF:` line.
#[derive(Debug, Default)]
struct Directive {
    tvg_id: String,
    tvg_name: String,
    tvg_logo: String,
    group_title: String,
    name: String,
}

fn parse_directive(line: &str) -> Directive {
    let mut directive = Directive::default();

    for caps in ATTR_REGEX.captures_iter(line) {
        let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        match caps.get(1).map(|m| m.as_str()).unwrap_or_default() {
            "tvg-id" => directive.tvg_id = value.to_string(),
            "tvg-name" => directive.tvg_name = value.to_string(),
            "tvg-logo" => directive.tvg_logo = value.to_string(),
            "group-title" => directive.group_title = value.to_string(),
            _ => {}
        }
    }

    // Display name is everything after the first comma of the line.
    if let Some(pos) = line.find(',') {
        directive.name = line[pos + 1..].trim().to_string();
    }

    directive
}

/// Parse raw M3U text into channel records.
///
/// The first line must start with `#EXTM3U` or the whole parse fails. After
/// that, each `#EXTINF:` directive expects the next line to be its stream
/// URL; an accepted entry consumes both lines, a rejected directive consumes
/// only itself so the following line is examined normally. Comments and
/// blank lines are skipped. An empty playlist is a valid result.
pub fn parse_m3u(text: &str) -> Result<ParsedPlaylist, M3uError> {
    let mut lines = text.lines();
    match lines.next() {
        Some(first) if first.trim_end().starts_with("#EXTM3U") => {}
        _ => return Err(M3uError::MissingHeader),
    }

    let mut lines = lines.peekable();
    let mut channels = Vec::new();
    let mut skipped = 0usize;

    while let Some(line) = lines.next() {
        let line = line.trim();
        if !line.starts_with("#EXTINF:") {
            continue;
        }

        let directive = parse_directive(line);

        // The URL line must be non-empty and not a directive/comment.
        let url = match lines.peek().map(|next| next.trim()) {
            Some(next) if !next.is_empty() && !next.starts_with('#') => {
                let url = next.to_string();
                lines.next();
                url
            }
            _ => {
                skipped += 1;
                continue;
            }
        };

        channels.push(ChannelRecord {
            tvg_id: directive.tvg_id,
            tvg_name: directive.tvg_name,
            tvg_logo: directive.tvg_logo,
            group_title: directive.group_title,
            name: directive.name,
            url,
        });
    }

    PLAYLISTS_PARSED.inc();

    Ok(ParsedPlaylist { channels, skipped })
}

/// Downloads M3U playlists over HTTP with a hard size cap.
pub struct PlaylistFetcher {
    client: reqwest::Client,
    max_size_mb: usize,
}

impl PlaylistFetcher {
    pub fn new(user_agent: &str, timeout_ms: u64, max_size_mb: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(timeout_ms))
            .gzip(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            max_size_mb,
        }
    }

    /// Fetch the playlist body as text, enforcing the size cap while the
    /// body streams in so an oversized list never lands whole in memory.
    pub async fn fetch(&self, url: &str) -> Result<String, M3uError> {
        use futures::StreamExt;

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(M3uError::Http(status.as_u16()));
        }

        let max_bytes = self.max_size_mb as u64 * BYTES_PER_MB;
        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(M3uError::TooLarge {
                    size_mb: len as f64 / BYTES_PER_MB as f64,
                    limit_mb: self.max_size_mb,
                });
            }
        }

        let mut stream = response.bytes_stream();
        let mut received = 0u64;
        let mut body: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            if received > max_bytes {
                return Err(M3uError::TooLarge {
                    size_mb: received as f64 / BYTES_PER_MB as f64,
                    limit_mb: self.max_size_mb,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_entry() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"1\" tvg-name=\"A\" group-title=\"G\",Display\nhttp://x/1\n";
        let parsed = parse_m3u(text).unwrap();

        assert_eq!(parsed.channels.len(), 1);
        assert_eq!(parsed.skipped, 0);

        let channel = &parsed.channels[0];
        assert_eq!(channel.tvg_id, "1");
        assert_eq!(channel.tvg_name, "A");
        assert_eq!(channel.group_title, "G");
        assert_eq!(channel.name, "Display");
        assert_eq!(channel.url, "http://x/1");
        assert_eq!(channel.tvg_logo, "");
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let err = parse_m3u("#EXTINF:-1,Canal\nhttp://x/1\n").unwrap_err();
        assert!(matches!(err, M3uError::MissingHeader));

        assert!(matches!(parse_m3u(""), Err(M3uError::MissingHeader)));
        assert!(matches!(
            parse_m3u("qualquer coisa"),
            Err(M3uError::MissingHeader)
        ));
    }

    #[test]
    fn test_header_is_prefix_match_on_first_line() {
        // Extra attributes on the header line are fine.
        let parsed = parse_m3u("#EXTM3U url-tvg=\"http://epg\"\n").unwrap();
        assert!(parsed.channels.is_empty());

        // A header anywhere else does not count.
        assert!(matches!(
            parse_m3u("\n#EXTM3U\n"),
            Err(M3uError::MissingHeader)
        ));
    }

    #[test]
    fn test_directive_without_url_is_dropped() {
        // First directive has no URL line; the second is parsed normally.
        let text = "#EXTM3U\n#EXTINF:-1,Sem URL\n#EXTINF:-1,Com URL\nhttp://x/2\n";
        let parsed = parse_m3u(text).unwrap();

        assert_eq!(parsed.channels.len(), 1);
        assert_eq!(parsed.channels[0].name, "Com URL");
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_directive_at_eof_is_dropped() {
        let parsed = parse_m3u("#EXTM3U\n#EXTINF:-1,Final\n").unwrap();
        assert!(parsed.channels.is_empty());
        assert_eq!(parsed.skipped, 1);

        let parsed = parse_m3u("#EXTM3U\n#EXTINF:-1,Final\n\n").unwrap();
        assert!(parsed.channels.is_empty());
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_empty_playlist_is_success() {
        let parsed = parse_m3u("#EXTM3U\n").unwrap();
        assert!(parsed.channels.is_empty());
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let text = "#EXTM3U\n\n#EXTVLCOPT:network-caching=1000\n#EXTINF:-1,Canal\nhttp://x/1\n\n";
        let parsed = parse_m3u(text).unwrap();
        assert_eq!(parsed.channels.len(), 1);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let text = "#EXTM3U\n#EXTINF:-1,Canal\nhttp://x/1\n#EXTINF:-1,Canal\nhttp://x/1\n";
        let parsed = parse_m3u(text).unwrap();
        assert_eq!(parsed.channels.len(), 2);
    }

    #[test]
    fn test_display_name_after_first_comma() {
        // Commas inside the free-text name are preserved.
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"x\",Notícias, Agora\nhttp://x/1\n";
        let parsed = parse_m3u(text).unwrap();
        assert_eq!(parsed.channels[0].name, "Notícias, Agora");
    }

    #[test]
    fn test_crlf_lines() {
        let text = "#EXTM3U\r\n#EXTINF:-1 tvg-name=\"A\",Display\r\nhttp://x/1\r\n";
        let parsed = parse_m3u(text).unwrap();
        assert_eq!(parsed.channels.len(), 1);
        assert_eq!(parsed.channels[0].url, "http://x/1");
    }

    #[test]
    fn test_absent_attributes_default_empty() {
        let text = "#EXTM3U\n#EXTINF:-1,Canal Teste\nhttp://x/1\n";
        let channel = &parse_m3u(text).unwrap().channels[0];
        assert_eq!(channel.tvg_id, "");
        assert_eq!(channel.tvg_name, "");
        assert_eq!(channel.tvg_logo, "");
        assert_eq!(channel.group_title, "");
        assert_eq!(channel.name, "Canal Teste");
    }
}
