mod support;

use bridge_traits::external::ExternalMediaService;
use bridge_traits::lifecycle::{AudioSessionEvent, HostSignal, LifecycleEvent};
use bridge_traits::media::{SelectedTrack, TrackKind};
use bridge_traits::now_playing::{CommandStatus, RemoteCommandEvent};
use bridge_traits::player::PlaybackFailure;
use core_async::time::{sleep, Duration};
use core_playback::{ControlsConfig, NowPlayingConfig, NowPlayingCoordinator, PlaybackConfig};
use core_runtime::config::{CoreConfig, CoreConfigBuilder};
use core_runtime::events::{CoreEvent, FullscreenEvent, PlaybackEvent, QueueEvent};
use core_service::{CoreError, CoreService, VideoController};
use mockall::mock;
use mockall::predicate::eq;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use support::{
    event_names, flush, source, ChannelObserver, FakePlayer, FakePresentationHost,
    InstantPreparer, RecordingAds, RecordingCommandCenter, RecordingRenderSurface,
    RecordingSink, RecordingSurface,
};

mock! {
    pub Service {}

    impl ExternalMediaService for Service {
        fn service_id(&self) -> String;
        fn is_connected(&self) -> bool;
        fn on_seek_completed(&self, position_ms: u64);
        fn on_volume_changed(&self, volume: f32);
    }
}

fn builder() -> CoreConfigBuilder {
    CoreConfig::builder().source_preparer(Arc::new(InstantPreparer))
}

fn view_with(builder: CoreConfigBuilder) -> (Arc<FakePlayer>, CoreService, Arc<VideoController>) {
    let service = CoreService::new(builder.build().unwrap(), PlaybackConfig::default()).unwrap();
    let player = FakePlayer::new();
    let view = service.create_controller(player.clone(), None).unwrap();
    (player, service, view)
}

struct NowPlayingRig {
    player: Arc<FakePlayer>,
    coordinator: Arc<NowPlayingCoordinator>,
    commands: Arc<RecordingCommandCenter>,
    view: Arc<VideoController>,
}

fn now_playing_rig() -> NowPlayingRig {
    let surface = RecordingSurface::new();
    let commands = RecordingCommandCenter::new();
    let coordinator = NowPlayingCoordinator::new(
        surface.clone(),
        commands.clone(),
        NowPlayingConfig::default(),
    );
    let config = builder()
        .now_playing_surface(surface)
        .remote_command_center(commands.clone())
        .enable_now_playing(true)
        .build()
        .unwrap();
    let service =
        CoreService::with_coordinator(config, PlaybackConfig::default(), coordinator.clone())
            .unwrap();
    let player = FakePlayer::new();
    let view = service.create_controller(player.clone(), None).unwrap();
    NowPlayingRig {
        player,
        coordinator,
        commands,
        view,
    }
}

#[core_async::test]
async fn test_load_events_reach_the_sink() {
    let sink = RecordingSink::new();
    let (_, _service, view) = view_with(builder().event_sink(sink.clone()));

    view.set_src(source("ep-1")).unwrap();
    flush().await;

    assert_eq!(sink.names(), vec!["loadStart", "load"]);
    let load = sink.last_payload("load").unwrap();
    assert_eq!(load["duration"], json!(120.0));
    assert_eq!(load["naturalSize"]["orientation"], json!("landscape"));
    assert_eq!(
        sink.last_payload("loadStart").unwrap()["src"]["id"],
        json!("ep-1")
    );
}

#[core_async::test]
async fn test_seek_and_play_state_are_reported() {
    let sink = RecordingSink::new();
    let (_, _service, view) = view_with(builder().event_sink(sink.clone()));
    view.set_src(source("ep-1")).unwrap();
    flush().await;

    view.play().unwrap();
    view.seek(30_000, 0).unwrap();
    flush().await;

    assert_eq!(
        sink.last_payload("playbackStateChanged").unwrap(),
        json!({ "isPlaying": true, "isSeeking": false })
    );
    assert_eq!(
        sink.last_payload("seek").unwrap(),
        json!({ "currentTime": 30.0, "seekTime": 30.0 })
    );
}

#[core_async::test]
async fn test_item_failure_reports_error_with_domain() {
    let sink = RecordingSink::new();
    let (player, _service, view) = view_with(builder().event_sink(sink.clone()));
    view.set_src(source("broken")).unwrap();
    flush().await;

    player.fail(PlaybackFailure::new(-11800, "decode failed").with_domain("AVFoundationErrorDomain"));
    flush().await;

    assert_eq!(
        sink.last_payload("error").unwrap(),
        json!({
            "code": -11800,
            "description": "decode failed",
            "domain": "AVFoundationErrorDomain",
        })
    );
}

#[core_async::test(start_paused)]
async fn test_progress_clamps_current_time_to_duration() {
    let (player, _service, view) = view_with(builder());
    let mut stream = view
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Progress { .. })));

    view.set_src(source("clip")).unwrap();
    flush().await;
    player.advance(150_000);

    sleep(Duration::from_millis(260)).await;
    flush().await;

    match stream.drain().last() {
        Some(CoreEvent::Playback(PlaybackEvent::Progress {
            current_time,
            playable_duration,
            ..
        })) => {
            assert_eq!(*current_time, 120.0);
            assert_eq!(*playable_duration, 120.0);
        }
        other => panic!("expected progress, got {other:?}"),
    }
}

#[core_async::test(start_paused)]
async fn test_progress_interval_can_be_changed() {
    let (_, _service, view) = view_with(builder());
    let mut stream = view
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Progress { .. })));
    view.set_src(source("clip")).unwrap();
    flush().await;

    view.set_progress_update_interval(1_000);
    sleep(Duration::from_millis(900)).await;
    flush().await;
    assert!(stream.drain().is_empty());

    sleep(Duration::from_millis(200)).await;
    flush().await;
    assert_eq!(stream.drain().len(), 1);
}

#[core_async::test]
async fn test_unwanted_resume_is_paused_again() {
    let (player, _service, view) = view_with(builder());
    let mut stream = view.subscribe_events().filter(|event| {
        matches!(event, CoreEvent::Playback(PlaybackEvent::StateChanged { .. }))
    });
    view.set_src(source("ep-1")).unwrap();
    flush().await;
    view.play().unwrap();
    view.pause().unwrap();
    stream.drain();
    let pauses = player.state.lock().pauses;

    // The platform resumed on its own, e.g. after a route change.
    player.external_rate(1.0);

    assert_eq!(player.rate_now(), 0.0);
    assert_eq!(player.state.lock().pauses, pauses + 1);
    assert_eq!(
        stream.drain(),
        vec![CoreEvent::Playback(PlaybackEvent::StateChanged {
            is_playing: false,
            is_seeking: false,
        })]
    );
}

#[core_async::test]
async fn test_track_selections_are_reapplied_on_each_item() {
    let (player, _service, view) = view_with(builder());

    view.set_selected_text_track(SelectedTrack::Language("en".to_string()))
        .unwrap();
    assert!(player.state.lock().selections.is_empty());

    view.set_src(source("a")).unwrap();
    flush().await;
    view.set_selected_audio_track(SelectedTrack::Index(1)).unwrap();

    view.set_src(source("b")).unwrap();
    flush().await;

    let selections = player.state.lock().selections.clone();
    assert_eq!(
        selections,
        vec![
            (TrackKind::Text, SelectedTrack::Language("en".to_string())),
            (TrackKind::Audio, SelectedTrack::Index(1)),
            (TrackKind::Text, SelectedTrack::Language("en".to_string())),
            (TrackKind::Audio, SelectedTrack::Index(1)),
        ]
    );
}

#[core_async::test]
async fn test_ads_requested_once_per_source_and_completed_on_end() {
    let ads = RecordingAds::new();
    let sink = RecordingSink::new();
    let (player, _service, view) =
        view_with(builder().ads_controller(ads.clone()).event_sink(sink.clone()));

    view.set_src(source("promo").with_ad_tag_url("https://ads.example.com/vast"))
        .unwrap();
    flush().await;

    view.report_progress();
    assert!(ads.requests.lock().is_empty());

    player.advance(1);
    view.report_progress();
    player.advance(500);
    view.report_progress();
    assert_eq!(
        *ads.requests.lock(),
        vec!["https://ads.example.com/vast".to_string()]
    );

    player.reach_end();
    flush().await;
    assert_eq!(ads.completions.load(Ordering::SeqCst), 1);
    assert!(sink.names().contains(&"end".to_string()));

    // A source without a tag never requests ads.
    view.set_src(source("plain")).unwrap();
    flush().await;
    player.advance(2_000);
    view.report_progress();
    assert_eq!(ads.requests.lock().len(), 1);
}

#[core_async::test]
async fn test_resign_and_become_active_pause_and_resume() {
    let (player, _service, view) = view_with(builder());
    view.set_src(source("ep-1")).unwrap();
    flush().await;
    view.play().unwrap();

    view.handle_lifecycle(LifecycleEvent::WillResignActive);
    assert_eq!(player.rate_now(), 0.0);

    view.handle_lifecycle(LifecycleEvent::DidBecomeActive);
    assert_eq!(player.rate_now(), 1.0);

    // An explicit pause survives the round trip.
    view.pause().unwrap();
    view.handle_lifecycle(LifecycleEvent::WillResignActive);
    view.handle_lifecycle(LifecycleEvent::DidBecomeActive);
    assert_eq!(player.rate_now(), 0.0);
}

#[core_async::test]
async fn test_play_when_inactive_keeps_playing() {
    let (player, _service, view) = view_with(builder());
    view.set_play_when_inactive(true);
    view.set_src(source("ep-1")).unwrap();
    flush().await;
    view.play().unwrap();

    view.handle_lifecycle(LifecycleEvent::WillResignActive);
    view.handle_lifecycle(LifecycleEvent::ScreenLocked);

    assert_eq!(player.rate_now(), 1.0);
}

#[core_async::test]
async fn test_interruption_pauses_and_resumes() {
    let (player, _service, view) = view_with(builder());
    let mut stream = view.subscribe_events().filter(|event| {
        matches!(
            event,
            CoreEvent::Playback(PlaybackEvent::StateChanged { .. })
                | CoreEvent::Playback(PlaybackEvent::AudioBecomingNoisy)
        )
    });
    view.set_src(source("ep-1")).unwrap();
    flush().await;
    view.play().unwrap();
    stream.drain();

    view.handle_audio_session(AudioSessionEvent::InterruptionBegan);
    assert_eq!(player.rate_now(), 0.0);
    // Exactly one state event per transition.
    assert_eq!(
        stream.drain(),
        vec![CoreEvent::Playback(PlaybackEvent::StateChanged {
            is_playing: false,
            is_seeking: false,
        })]
    );

    // Becoming active mid-interruption does not resume.
    view.handle_lifecycle(LifecycleEvent::DidBecomeActive);
    assert_eq!(player.rate_now(), 0.0);

    view.handle_audio_session(AudioSessionEvent::InterruptionEnded);
    assert_eq!(player.rate_now(), 1.0);
    assert_eq!(
        stream.drain(),
        vec![CoreEvent::Playback(PlaybackEvent::StateChanged {
            is_playing: true,
            is_seeking: false,
        })]
    );

    view.handle_audio_session(AudioSessionEvent::RouteChanged {
        old_device_unavailable: true,
    });
    assert_eq!(event_names(&mut stream), vec!["audioBecomingNoisy"]);
}

#[core_async::test]
async fn test_background_playback_detaches_and_reattaches_surface() {
    let service = CoreService::new(builder().build().unwrap(), PlaybackConfig::default()).unwrap();
    let player = FakePlayer::new();
    let surface = RecordingRenderSurface::new();
    let view = service
        .create_controller(player.clone(), Some(surface.clone()))
        .unwrap();
    assert_eq!(surface.attaches.load(Ordering::SeqCst), 1);

    view.set_play_in_background(true);
    view.set_src(source("podcast")).unwrap();
    flush().await;
    view.play().unwrap();

    view.handle_lifecycle(LifecycleEvent::WillResignActive);
    view.handle_lifecycle(LifecycleEvent::DidEnterBackground);
    assert_eq!(surface.detaches.load(Ordering::SeqCst), 1);
    assert_eq!(player.rate_now(), 1.0);

    view.handle_lifecycle(LifecycleEvent::WillEnterForeground);
    assert_eq!(surface.attaches.load(Ordering::SeqCst), 2);
    assert_eq!(player.rate_now(), 1.0);
}

#[core_async::test]
async fn test_lifecycle_observer_feeds_the_controller() {
    let (sender, observer) = ChannelObserver::new();
    let (player, _service, view) = view_with(builder().lifecycle_observer(observer));
    let mut stream = view
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::AudioBecomingNoisy)));
    view.set_src(source("ep-1")).unwrap();
    flush().await;
    view.play().unwrap();

    sender
        .send(HostSignal::Lifecycle(LifecycleEvent::WillResignActive))
        .unwrap();
    sender
        .send(HostSignal::AudioSession(AudioSessionEvent::RouteChanged {
            old_device_unavailable: true,
        }))
        .unwrap();
    flush().await;

    assert_eq!(player.rate_now(), 0.0);
    assert_eq!(event_names(&mut stream), vec!["audioBecomingNoisy"]);
}

#[core_async::test(start_paused)]
async fn test_notification_controls_register_after_scheduling_delay() {
    let rig = now_playing_rig();
    rig.view.set_src(source("ep-1")).unwrap();
    flush().await;
    rig.view.play().unwrap();

    rig.view.set_show_notification_controls(true);
    sleep(Duration::from_millis(150)).await;
    assert!(!rig.coordinator.is_registered(rig.view.session_id()));

    sleep(Duration::from_millis(100)).await;
    assert!(rig.coordinator.is_registered(rig.view.session_id()));
    assert_eq!(
        rig.coordinator.current_session_id(),
        Some(rig.view.session_id())
    );

    rig.view.set_show_notification_controls(false);
    assert!(!rig.coordinator.is_registered(rig.view.session_id()));
    assert_eq!(rig.coordinator.registered_count(), 0);
    assert!(rig.player.has_listener());
}

#[core_async::test(start_paused)]
async fn test_remote_next_outside_queue_mode_is_delegated_to_host() {
    let rig = now_playing_rig();
    rig.view.set_src(source("ep-1")).unwrap();
    flush().await;
    rig.view.play().unwrap();
    rig.view.set_show_notification_controls(true);
    sleep(Duration::from_millis(250)).await;
    let mut stream = rig
        .view
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Queue(_)));

    assert_eq!(
        rig.commands.dispatch(RemoteCommandEvent::NextTrack),
        CommandStatus::Success
    );
    flush().await;

    assert_eq!(
        stream.drain(),
        vec![CoreEvent::Queue(QueueEvent::NextTrack {
            queue_index: None,
            source_id: None,
            native_handled: false,
        })]
    );
}

#[core_async::test(start_paused)]
async fn test_remote_next_in_queue_mode_advances_the_queue() {
    let rig = now_playing_rig();
    rig.view
        .set_queue(vec![source("a"), source("b"), source("c")])
        .unwrap();
    flush().await;
    sleep(Duration::from_millis(250)).await;
    assert_eq!(rig.player.rate_now(), 1.0);

    rig.view.set_show_notification_controls(true);
    sleep(Duration::from_millis(250)).await;
    let mut stream = rig
        .view
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Queue(_)));

    assert_eq!(
        rig.commands.dispatch(RemoteCommandEvent::NextTrack),
        CommandStatus::Success
    );
    flush().await;
    sleep(Duration::from_millis(250)).await;
    flush().await;

    assert_eq!(rig.view.session().item_id().as_deref(), Some("b"));
    assert_eq!(
        stream.drain(),
        vec![CoreEvent::Queue(QueueEvent::NextTrack {
            queue_index: Some(1),
            source_id: Some("b".to_string()),
            native_handled: true,
        })]
    );
}

#[core_async::test(start_paused)]
async fn test_fullscreen_round_trip_through_the_controller() {
    let host = FakePresentationHost::new();
    let (_, _service, view) = view_with(
        builder()
            .presentation_host(host.clone())
            .enable_fullscreen(true),
    );
    let mut stream = view
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Fullscreen(_)));
    view.set_src(source("feature")).unwrap();
    flush().await;
    view.play().unwrap();

    view.set_fullscreen(true).await.unwrap();
    view.set_fullscreen(true).await.unwrap();
    assert_eq!(host.mirrors.lock().len(), 1);
    assert!(host.mirrors.lock()[0].state.lock().muted);

    view.set_controls_config(ControlsConfig {
        hide_next: true,
        ..ControlsConfig::default()
    });
    assert_eq!(host.controls.lock().len(), 2);

    view.set_fullscreen(false).await.unwrap();
    assert_eq!(host.dismisses.load(Ordering::SeqCst), 1);
    assert_eq!(
        stream.drain(),
        vec![
            CoreEvent::Fullscreen(FullscreenEvent::WillPresent),
            CoreEvent::Fullscreen(FullscreenEvent::DidPresent),
            CoreEvent::Fullscreen(FullscreenEvent::WillDismiss),
            CoreEvent::Fullscreen(FullscreenEvent::DidDismiss),
        ]
    );
}

#[core_async::test]
async fn test_fullscreen_without_host_is_a_missing_capability() {
    let (_, _service, view) = view_with(builder());
    view.set_src(source("feature")).unwrap();
    flush().await;

    assert!(matches!(
        view.set_fullscreen(true).await,
        Err(CoreError::CapabilityMissing { .. })
    ));
}

#[core_async::test]
async fn test_external_services_follow_seek_and_volume() {
    let mut service_mock = MockService::new();
    service_mock
        .expect_service_id()
        .return_const("cast".to_string());
    service_mock.expect_is_connected().return_const(true);
    service_mock
        .expect_on_seek_completed()
        .with(eq(30_000))
        .times(1)
        .return_const(());
    service_mock
        .expect_on_volume_changed()
        .with(eq(0.5))
        .times(1)
        .return_const(());

    let (_, service, view) = view_with(builder().enable_external_services(true));
    service
        .external_services()
        .unwrap()
        .register(Arc::new(service_mock))
        .unwrap();

    view.set_src(source("ep-1")).unwrap();
    flush().await;
    view.seek(30_000, 0).unwrap();
    view.set_volume(0.5).unwrap();
}

#[core_async::test(start_paused)]
async fn test_release_tears_down_in_order_and_is_idempotent() {
    let rig = now_playing_rig();
    let mut progress = rig
        .view
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Progress { .. })));
    rig.view.set_src(source("ep-1")).unwrap();
    flush().await;
    rig.view.play().unwrap();
    rig.view.set_show_notification_controls(true);
    sleep(Duration::from_millis(250)).await;
    assert!(rig.coordinator.is_registered(rig.view.session_id()));

    rig.view.release().await;
    rig.view.release().await;
    progress.drain();

    assert!(rig.view.is_released());
    assert!(!rig.coordinator.is_registered(rig.view.session_id()));
    assert_eq!(rig.view.session().subscriber_count(), 0);
    assert!(rig.player.state.lock().released);
    assert!(!rig.player.has_listener());
    assert!(rig.view.play().is_err());
    assert!(rig.view.set_src(source("again")).is_err());

    sleep(Duration::from_millis(1_000)).await;
    assert!(progress.drain().is_empty());
}
