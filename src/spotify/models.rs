use serde::Deserialize;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Normalized view of the track the user is listening to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub title: String,
    pub artist_name: String,
    pub artwork_url: String,
    pub is_playing: bool,
    pub progress_ms: u64,
    pub duration_ms: u64,
}

impl TrackSnapshot {
    /// What a consumer displays when a poll yields nothing.
    pub fn nothing_playing() -> Self {
        Self {
            title: "No track playing".to_string(),
            artist_name: "Spotify".to_string(),
            artwork_url: String::new(),
            is_playing: false,
            progress_ms: 0,
            duration_ms: 0,
        }
    }

    pub fn is_nothing_playing(&self) -> bool {
        *self == Self::nothing_playing()
    }

    pub fn progress_label(&self) -> String {
        format!(
            "{} / {}",
            format_duration(self.progress_ms),
            format_duration(self.duration_ms)
        )
    }
}

/// Outcome of a now-playing poll that keeps "nothing" apart from failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playback {
    Nothing,
    Track(TrackSnapshot),
}

impl Playback {
    pub fn into_snapshot(self) -> Option<TrackSnapshot> {
        match self {
            Playback::Nothing => None,
            Playback::Track(track) => Some(track),
        }
    }
}

/// Formats milliseconds as `m:ss`.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentlyPlayingResponse {
    pub item: Option<ApiTrack>,
    #[serde(default)]
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ApiArtist>,
    pub album: Option<ApiAlbum>,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiAlbum {
    #[serde(default)]
    pub images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiImage {
    pub url: String,
}

impl CurrentlyPlayingResponse {
    /// `None` when the player reports no playable item.
    pub fn into_snapshot(self) -> Option<TrackSnapshot> {
        let item = self.item?;

        let artist_name = item
            .artists
            .into_iter()
            .next()
            .map(|a| a.name)
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        let artwork_url = item
            .album
            .and_then(|album| album.images.into_iter().next())
            .map(|image| image.url)
            .unwrap_or_default();

        Some(TrackSnapshot {
            title: item.name,
            artist_name,
            artwork_url,
            is_playing: self.is_playing,
            progress_ms: self.progress_ms.unwrap_or(0),
            duration_ms: item.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> Option<TrackSnapshot> {
        serde_json::from_value::<CurrentlyPlayingResponse>(json)
            .unwrap()
            .into_snapshot()
    }

    #[test]
    fn test_normalizes_representative_payload() {
        let snapshot = parse(serde_json::json!({
            "item": {
                "name": "Song",
                "artists": [{"name": "Artist"}],
                "album": {"images": [{"url": "http://x/img.png"}]},
                "duration_ms": 200000
            },
            "is_playing": true,
            "progress_ms": 5000
        }));

        assert_eq!(
            snapshot,
            Some(TrackSnapshot {
                title: "Song".to_string(),
                artist_name: "Artist".to_string(),
                artwork_url: "http://x/img.png".to_string(),
                is_playing: true,
                progress_ms: 5000,
                duration_ms: 200000,
            })
        );
    }

    #[test]
    fn test_first_artist_and_image_win() {
        let snapshot = parse(serde_json::json!({
            "item": {
                "name": "Under Pressure",
                "artists": [{"name": "Queen"}, {"name": "David Bowie"}],
                "album": {"images": [{"url": "http://x/640.png"}, {"url": "http://x/64.png"}]},
                "duration_ms": 248000
            },
            "is_playing": false,
            "progress_ms": 0
        }))
        .unwrap();

        assert_eq!(snapshot.artist_name, "Queen");
        assert_eq!(snapshot.artwork_url, "http://x/640.png");
        assert!(!snapshot.is_playing);
    }

    #[test]
    fn test_empty_artists_and_images_fall_back() {
        let snapshot = parse(serde_json::json!({
            "item": {
                "name": "Untitled",
                "artists": [],
                "album": {"images": []},
                "duration_ms": 1000
            },
            "is_playing": true,
            "progress_ms": 10
        }))
        .unwrap();

        assert_eq!(snapshot.artist_name, UNKNOWN_ARTIST);
        assert_eq!(snapshot.artwork_url, "");
    }

    #[test]
    fn test_missing_item_is_nothing() {
        assert_eq!(
            parse(serde_json::json!({"item": null, "is_playing": false, "progress_ms": null})),
            None
        );
        assert_eq!(parse(serde_json::json!({"is_playing": true})), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(5000), "0:05");
        assert_eq!(format_duration(200000), "3:20");
    }

    #[test]
    fn test_nothing_playing_sentinel() {
        let sentinel = TrackSnapshot::nothing_playing();
        assert_eq!(sentinel.title, "No track playing");
        assert_eq!(sentinel.artist_name, "Spotify");
        assert!(sentinel.is_nothing_playing());
        assert_eq!(sentinel.progress_label(), "0:00 / 0:00");
    }
}
