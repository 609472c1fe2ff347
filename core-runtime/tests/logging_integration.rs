//! Integration tests for the logging system

use bridge_traits::log::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_uri, LogFormat, LoggingConfig,
};

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.redact_pii);
    assert!(config.logger_sink.is_none());
    assert!(config.filter.is_none());
}

#[test]
fn test_signed_media_urls_are_redacted() {
    let signed = "https://video.example.net/hls/master.m3u8?Policy=abc&Signature=def";
    let redacted = redact_uri(signed);

    assert!(!redacted.contains("Signature"));
    assert!(redacted.starts_with("https://video.example.net/hls/master.m3u8"));
}

#[test]
fn test_drm_fields_are_redacted() {
    assert_eq!(redact_if_sensitive("license_key", "0xdeadbeef"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("cookie", "session=1"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("source_id", "ep-7"), "ep-7");
}

#[test]
fn test_init_logging_rejects_invalid_filter_then_succeeds_once() {
    let invalid = LoggingConfig::default().with_filter("core_playback=[");
    assert!(init_logging(invalid).is_err());

    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);
    assert!(init_logging(config.clone()).is_ok());
    // A second global subscriber cannot be installed.
    assert!(init_logging(config).is_err());
}
