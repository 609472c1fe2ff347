//! Media item model shared between the core and platform bridges.
//!
//! A [`PlayableItem`] is what a [`SourcePreparer`](crate::source::SourcePreparer)
//! produces and what a [`PlayerHandle`](crate::player::PlayerHandle) plays.
//! The core never inspects media bytes; it only reads the descriptive fields
//! below to build load events and now-playing metadata.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Identifier suffixes of container metadata that carry encoder/loudness
/// bookkeeping rather than anything displayable.
pub const NOISE_METADATA_IDENTIFIERS: &[&str] = &["iTunSMPB", "iTunNORM"];

/// Logical key of a metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    Title,
    Artist,
    Artwork,
    Other(String),
}

/// Value of a metadata entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    Data(Bytes),
}

/// One metadata entry as reported by the platform.
///
/// `identifier` is the container-specific identifier (for example
/// `id3/TIT2` or `itsk/iTunSMPB`); `key` is its logical meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataItem {
    pub identifier: String,
    pub key: MetadataKey,
    pub value: MetadataValue,
}

impl MetadataItem {
    pub fn text(identifier: impl Into<String>, key: MetadataKey, value: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            key,
            value: MetadataValue::Text(value.into()),
        }
    }

    pub fn data(identifier: impl Into<String>, key: MetadataKey, value: impl Into<Bytes>) -> Self {
        Self {
            identifier: identifier.into(),
            key,
            value: MetadataValue::Data(value.into()),
        }
    }

    /// Returns the trimmed text value, or `None` for binary or blank values.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            MetadataValue::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            MetadataValue::Data(_) => None,
        }
    }

    /// Returns `true` for loudness/normalization bookkeeping entries.
    pub fn is_noise(&self) -> bool {
        NOISE_METADATA_IDENTIFIERS
            .iter()
            .any(|noise| self.identifier.contains(noise))
    }
}

/// Video dimensions reported on load.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NaturalSize {
    pub width: f64,
    pub height: f64,
}

impl NaturalSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn orientation(&self) -> &'static str {
        if self.width > self.height {
            "landscape"
        } else if self.width < self.height {
            "portrait"
        } else {
            "square"
        }
    }
}

/// An audio or text track exposed by the current item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

/// Which track group a selection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Text,
}

/// Track selection criteria as sent by the host.
///
/// Deserializes from `{"type": "language", "value": "en"}` style objects.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SelectedTrack {
    #[default]
    System,
    Disabled,
    Title(String),
    Language(String),
    Index(u32),
}

/// A prepared item ready to be handed to a player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableItem {
    /// Platform identity of the prepared asset.
    pub id: String,
    /// Identifier of the source descriptor this item was prepared from.
    pub source_id: Option<String>,
    pub uri: String,
    /// Seconds. NaN while unknown, infinite for live streams.
    pub duration_secs: f64,
    pub is_live: bool,
    pub natural_size: NaturalSize,
    pub audio_tracks: Vec<TrackInfo>,
    pub text_tracks: Vec<TrackInfo>,
    /// Metadata embedded in the container.
    pub common_metadata: Vec<MetadataItem>,
    /// Metadata attached by the host or the preparer.
    pub external_metadata: Vec<MetadataItem>,
}

impl PlayableItem {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: None,
            uri: uri.into(),
            duration_secs: f64::NAN,
            is_live: false,
            natural_size: NaturalSize::default(),
            audio_tracks: Vec::new(),
            text_tracks: Vec::new(),
            common_metadata: Vec::new(),
            external_metadata: Vec::new(),
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = duration_secs;
        self.is_live = duration_secs.is_infinite();
        self
    }

    pub fn with_natural_size(mut self, width: f64, height: f64) -> Self {
        self.natural_size = NaturalSize::new(width, height);
        self
    }

    pub fn with_common_metadata(mut self, items: Vec<MetadataItem>) -> Self {
        self.common_metadata = items;
        self
    }

    pub fn with_external_metadata(mut self, items: Vec<MetadataItem>) -> Self {
        self.external_metadata = items;
        self
    }

    pub fn with_tracks(mut self, audio: Vec<TrackInfo>, text: Vec<TrackInfo>) -> Self {
        self.audio_tracks = audio;
        self.text_tracks = text;
        self
    }

    /// Duration in seconds, `0.0` when unknown or infinite.
    pub fn finite_duration_secs(&self) -> f64 {
        if self.duration_secs.is_finite() {
            self.duration_secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_detection() {
        let smpb = MetadataItem::text("itsk/iTunSMPB", MetadataKey::Other("smpb".into()), "x");
        let title = MetadataItem::text("id3/TIT2", MetadataKey::Title, "Song");
        assert!(smpb.is_noise());
        assert!(!title.is_noise());
    }

    #[test]
    fn test_blank_text_is_not_a_value() {
        let item = MetadataItem::text("common/title", MetadataKey::Title, "   ");
        assert_eq!(item.as_text(), None);
    }

    #[test]
    fn test_live_item_has_zero_finite_duration() {
        let item = PlayableItem::new("a", "https://example.com/live.m3u8").with_duration(f64::INFINITY);
        assert!(item.is_live);
        assert_eq!(item.finite_duration_secs(), 0.0);
    }

    #[test]
    fn test_selected_track_wire_shape() {
        let language: SelectedTrack =
            serde_json::from_str(r#"{"type":"language","value":"en"}"#).unwrap();
        assert_eq!(language, SelectedTrack::Language("en".into()));

        let disabled: SelectedTrack = serde_json::from_str(r#"{"type":"disabled"}"#).unwrap();
        assert_eq!(disabled, SelectedTrack::Disabled);

        let index: SelectedTrack = serde_json::from_str(r#"{"type":"index","value":2}"#).unwrap();
        assert_eq!(index, SelectedTrack::Index(2));
    }
}
