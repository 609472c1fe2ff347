//! Source descriptors and the preparation capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{error::Result, media::PlayableItem, platform::PlatformSendSync};

/// Display metadata supplied by the host alongside a source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_uri: Option<String>,
}

impl CustomMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.subtitle.is_none()
            && self.artist.is_none()
            && self.description.is_none()
            && self.image_uri.is_none()
    }
}

/// A source as assigned by the host through `setSrc` or `setQueue`.
///
/// The core treats it as opaque apart from its identifier, its URI and the
/// optional display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub is_network: bool,
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    #[serde(default)]
    pub metadata: Option<CustomMetadata>,
    /// Milliseconds.
    #[serde(default)]
    pub start_position: Option<u64>,
    #[serde(default)]
    pub ad_tag_url: Option<String>,
}

impl SourceDescriptor {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let is_network = uri.starts_with("http://") || uri.starts_with("https://");
        Self {
            uri: Some(uri),
            is_network,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: CustomMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_start_position(mut self, position_ms: u64) -> Self {
        self.start_position = Some(position_ms);
        self
    }

    pub fn with_ad_tag_url(mut self, url: impl Into<String>) -> Self {
        self.ad_tag_url = Some(url.into());
        self
    }

    /// The non-blank URI, if any.
    pub fn playable_uri(&self) -> Option<&str> {
        self.uri.as_deref().map(str::trim).filter(|uri| !uri.is_empty())
    }

    /// The identifier reported in track-change events: the explicit id,
    /// falling back to the URI.
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.uri.as_deref())
    }
}

/// Turns a source descriptor into a playable item.
///
/// Covers asset resolution, DRM license acquisition and caching. This is the
/// only long-latency operation the core awaits; the core may abandon the
/// result if a newer source was requested in the meantime.
#[async_trait]
pub trait SourcePreparer: PlatformSendSync {
    async fn prepare(&self, source: &SourceDescriptor) -> Result<PlayableItem>;
}
