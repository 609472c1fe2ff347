//! Outbound host capabilities: the notification sink and the ads SDK.

use serde_json::Value;

use crate::platform::PlatformSendSync;

/// Accepts named events with JSON payloads on their way to the application
/// layer. The wire format beyond `(name, payload)` belongs to the bridge.
pub trait EventSink: PlatformSendSync {
    fn emit(&self, name: &str, payload: Value);
}

/// Advertising insertion, driven by content progress.
pub trait AdsController: PlatformSendSync {
    fn request_ads(&self, ad_tag_url: &str);

    fn notify_content_complete(&self);
}
