use serde::{Deserialize, Serialize};

/// Stream protocol accepted by the Emby IPTV plugin.
///
/// Serialized exactly as the plugin expects ("Http", "File", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamProtocol {
    Http,
    File,
    Rtmp,
    Rtsp,
}

impl Default for StreamProtocol {
    fn default() -> Self {
        Self::Http
    }
}

impl std::fmt::Display for StreamProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamProtocol::Http => write!(f, "Http"),
            StreamProtocol::File => write!(f, "File"),
            StreamProtocol::Rtmp => write!(f, "Rtmp"),
            StreamProtocol::Rtsp => write!(f, "Rtsp"),
        }
    }
}

/// One entry parsed from an M3U playlist.
///
/// Absent attributes are kept as empty strings. Duplicate entries (same URL
/// or tvg-id) are legal and stay independently selectable downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub tvg_id: String,
    pub tvg_name: String,
    pub tvg_logo: String,
    pub group_title: String,
    /// Free-text display name after the first comma of the directive line.
    pub name: String,
    pub url: String,
}

impl ChannelRecord {
    /// Name shown to the operator and sent to the server: tvg-name when
    /// present, inline name otherwise.
    pub fn display_name(&self) -> &str {
        if self.tvg_name.is_empty() {
            &self.name
        } else {
            &self.tvg_name
        }
    }
}

/// A channel inside one import session's working set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingChannel {
    #[serde(flatten)]
    pub record: ChannelRecord,
    pub selected: bool,
    pub protocol: StreamProtocol,
}

impl WorkingChannel {
    pub fn new(record: ChannelRecord) -> Self {
        Self {
            record,
            selected: true,
            protocol: StreamProtocol::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_tvg_name() {
        let mut record = ChannelRecord {
            tvg_id: "1".to_string(),
            tvg_name: "Globo HD".to_string(),
            tvg_logo: String::new(),
            group_title: "TV".to_string(),
            name: "Globo".to_string(),
            url: "http://x/1".to_string(),
        };
        assert_eq!(record.display_name(), "Globo HD");

        record.tvg_name.clear();
        assert_eq!(record.display_name(), "Globo");
    }

    #[test]
    fn test_protocol_wire_values() {
        assert_eq!(
            serde_json::to_string(&StreamProtocol::Http).unwrap(),
            "\"Http\""
        );
        assert_eq!(
            serde_json::to_string(&StreamProtocol::Rtsp).unwrap(),
            "\"Rtsp\""
        );
        let p: StreamProtocol = serde_json::from_str("\"File\"").unwrap();
        assert_eq!(p, StreamProtocol::File);
    }

    #[test]
    fn test_new_working_channel_defaults() {
        let record = ChannelRecord {
            tvg_id: String::new(),
            tvg_name: String::new(),
            tvg_logo: String::new(),
            group_title: String::new(),
            name: "Canal".to_string(),
            url: "http://x/1".to_string(),
        };
        let wc = WorkingChannel::new(record);
        assert!(wc.selected);
        assert_eq!(wc.protocol, StreamProtocol::Http);
    }
}
