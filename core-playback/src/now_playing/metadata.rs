//! Display metadata extraction for the now-playing entry.
//!
//! Candidates come from three places, in order of preference:
//!
//! 1. custom metadata the host attached to the source descriptor
//! 2. the item's external metadata
//! 3. the item's common (embedded container) metadata
//!
//! Within that order the first non-empty value per logical key wins. An
//! identifier already seen in an earlier source is skipped, as are entries
//! with blank identifiers and loudness/normalization noise. Artwork bytes
//! must decode as an image to be published.

use bridge_traits::media::{MetadataItem, MetadataKey, MetadataValue, PlayableItem};
use bridge_traits::now_playing::{Artwork, DEFAULT_ARTIST, DEFAULT_TITLE};
use bridge_traits::source::CustomMetadata;
use bytes::Bytes;
use std::collections::HashSet;
use tracing::debug;

const CUSTOM_TITLE: &str = "custom/title";
const CUSTOM_ARTIST: &str = "custom/artist";
const CUSTOM_SUBTITLE: &str = "custom/subtitle";
const CUSTOM_DESCRIPTION: &str = "custom/description";
const CUSTOM_IMAGE: &str = "custom/imageUri";

/// Title, artist and artwork resolved for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMetadata {
    pub title: String,
    pub artist: String,
    pub artwork: Artwork,
}

impl Default for DisplayMetadata {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            artist: DEFAULT_ARTIST.to_string(),
            artwork: Artwork::Placeholder,
        }
    }
}

/// Resolves display metadata for `item`, preferring `custom` where set.
pub fn extract(custom: Option<&CustomMetadata>, item: &PlayableItem) -> DisplayMetadata {
    let candidates = candidates(custom, item);
    let mut resolved = DisplayMetadata::default();

    if let Some(title) = first_text(&candidates, &MetadataKey::Title) {
        resolved.title = title.to_string();
    }
    if let Some(artist) = first_text(&candidates, &MetadataKey::Artist) {
        resolved.artist = artist.to_string();
    }
    if let Some(artwork) = candidates
        .iter()
        .filter(|c| c.key == MetadataKey::Artwork)
        .find_map(resolve_artwork)
    {
        resolved.artwork = artwork;
    }
    resolved
}

/// Merged candidate list in preference order, deduplicated by identifier.
pub fn candidates(custom: Option<&CustomMetadata>, item: &PlayableItem) -> Vec<MetadataItem> {
    let custom_items = custom.map(custom_items).unwrap_or_default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for source in [
        custom_items.as_slice(),
        item.external_metadata.as_slice(),
        item.common_metadata.as_slice(),
    ] {
        let mut added = Vec::new();
        for candidate in source {
            if candidate.identifier.is_empty()
                || candidate.is_noise()
                || seen.contains(&candidate.identifier)
                || added.contains(&candidate.identifier)
            {
                continue;
            }
            added.push(candidate.identifier.clone());
            merged.push(candidate.clone());
        }
        seen.extend(added);
    }
    merged
}

fn custom_items(custom: &CustomMetadata) -> Vec<MetadataItem> {
    let fields = [
        (CUSTOM_TITLE, MetadataKey::Title, &custom.title),
        (CUSTOM_ARTIST, MetadataKey::Artist, &custom.artist),
        (
            CUSTOM_SUBTITLE,
            MetadataKey::Other("subtitle".to_string()),
            &custom.subtitle,
        ),
        (
            CUSTOM_DESCRIPTION,
            MetadataKey::Other("description".to_string()),
            &custom.description,
        ),
        (CUSTOM_IMAGE, MetadataKey::Artwork, &custom.image_uri),
    ];

    fields
        .into_iter()
        .filter_map(|(identifier, key, value)| {
            value
                .as_deref()
                .map(|value| MetadataItem::text(identifier, key, value))
        })
        .collect()
}

fn first_text<'a>(candidates: &'a [MetadataItem], key: &MetadataKey) -> Option<&'a str> {
    candidates
        .iter()
        .filter(|c| &c.key == key)
        .find_map(MetadataItem::as_text)
}

fn resolve_artwork(candidate: &MetadataItem) -> Option<Artwork> {
    match &candidate.value {
        MetadataValue::Text(_) => candidate.as_text().map(|uri| Artwork::Remote {
            uri: uri.to_string(),
        }),
        MetadataValue::Data(data) => decode_artwork(data),
    }
}

/// Decodes `data` to check it is a usable image.
pub fn decode_artwork(data: &Bytes) -> Option<Artwork> {
    match image::load_from_memory(data) {
        Ok(img) => Some(Artwork::Image {
            data: data.clone(),
            width: img.width(),
            height: img.height(),
        }),
        Err(e) => {
            debug!(error = %e, len = data.len(), "Skipping undecodable artwork");
            None
        }
    }
}
