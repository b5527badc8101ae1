//! Integration tests for tab-eq.
//!
//! Everything runs against the mock capture host, so no audio hardware is
//! required. Tests that need a real input device live next to the device
//! host and are `#[ignore]`d.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tab_eq::capture::MockCaptureHost;
use tab_eq::{
    ControlSurface, DeactivationReason, PipelineEvent, Preset, SourceId, SourceSettings,
    StaticLicense, TabEq, TabEqError, Tier,
};

fn engine(premium: bool) -> (ControlSurface, Arc<MockCaptureHost>, Arc<StaticLicense>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let host = Arc::new(MockCaptureHost::new(48000, 1));
    let license = Arc::new(if premium {
        StaticLicense::premium()
    } else {
        StaticLicense::free()
    });
    let surface = TabEq::builder()
        .capture_host(host.clone())
        .license(license.clone())
        .build()
        .expect("engine builds");
    (surface, host, license)
}

#[tokio::test]
async fn free_tier_second_activation_evicts_first() {
    let (surface, host, _) = engine(false);
    let tab1 = SourceId::for_tab(1);
    let tab2 = SourceId::for_tab(2);

    surface.activate_source(&tab1).await.unwrap();
    assert_eq!(surface.active_sources(), vec![tab1.clone()]);

    surface.activate_source(&tab2).await.unwrap();

    assert_eq!(surface.active_sources(), vec![tab2]);
    assert!(host.stream_stopped(&tab1));
}

#[tokio::test]
async fn premium_tier_runs_sources_concurrently() {
    let (surface, _host, _) = engine(true);
    let tab1 = SourceId::for_tab(1);
    let tab2 = SourceId::for_tab(2);

    surface.activate_source(&tab1).await.unwrap();
    surface.activate_source(&tab2).await.unwrap();

    assert_eq!(surface.active_sources().len(), 2);

    // Both pipelines respond to gain writes independently.
    surface.set_gain(&tab1, 0, 6.0);
    surface.set_gain(&tab2, 0, -6.0);

    let registry = surface.registry();
    assert_eq!(registry.get(&tab1).unwrap().band_gains()[0], 6.0);
    assert_eq!(registry.get(&tab2).unwrap().band_gains()[0], -6.0);
}

#[tokio::test]
async fn premium_tier_scales_past_two() {
    let (surface, _host, _) = engine(true);

    for tab in 1..=5 {
        surface
            .activate_source(&SourceId::for_tab(tab))
            .await
            .unwrap();
    }

    assert_eq!(surface.active_sources().len(), 5);
}

#[tokio::test]
async fn denied_capture_surfaces_and_leaves_registry_empty() {
    let (surface, host, _) = engine(false);
    let tab = SourceId::for_tab(9);
    host.deny(tab.clone());

    let result = surface.activate_source(&tab).await;

    assert!(matches!(result, Err(TabEqError::CaptureUnavailable { .. })));
    assert!(surface.active_sources().is_empty());
    assert!(!surface.is_active(&tab));
}

#[tokio::test]
async fn spectrum_snapshot_after_gain_write() {
    let (surface, _host, _) = engine(false);
    let tab = SourceId::for_tab(1);

    surface.activate_source(&tab).await.unwrap();
    surface.set_gain(&tab, 2, 4.0);

    // Give the pipeline task a few blocks of the mock tone.
    tokio::time::sleep(Duration::from_millis(120)).await;

    let spectrum = surface.get_spectrum(&tab);
    assert_eq!(spectrum.len(), 128);
    assert!(spectrum.iter().any(|&b| b > 0), "expected spectral energy");
}

#[tokio::test]
async fn spectrum_after_deactivation_is_empty_not_an_error() {
    let (surface, _host, _) = engine(false);
    let tab = SourceId::for_tab(1);

    surface.activate_source(&tab).await.unwrap();
    surface.deactivate_source(&tab).await;

    assert!(surface.get_spectrum(&tab).is_empty());
}

#[tokio::test]
async fn repeated_activation_reuses_pipeline_and_capture() {
    let (surface, host, _) = engine(false);
    let tab = SourceId::for_tab(1);

    surface.activate_source(&tab).await.unwrap();
    surface.activate_source(&tab).await.unwrap();

    assert_eq!(surface.active_sources().len(), 1);
    assert_eq!(host.acquire_count(&tab), 1);
}

#[tokio::test]
async fn repeated_deactivation_is_a_no_op() {
    let (surface, _host, _) = engine(false);
    let tab = SourceId::for_tab(1);

    surface.activate_source(&tab).await.unwrap();
    surface.deactivate_source(&tab).await;
    surface.deactivate_source(&tab).await;

    assert!(!surface.is_active(&tab));
}

#[tokio::test]
async fn writes_to_inactive_source_are_no_ops() {
    let (surface, _host, _) = engine(false);
    let tab = SourceId::for_tab(7);

    // Nothing active: none of these may panic or error.
    surface.set_gain(&tab, 0, 3.0);
    surface.set_volume(&tab, 1.5);
    assert!(surface.get_spectrum(&tab).is_empty());
}

#[tokio::test]
async fn tier_upgrade_applies_to_subsequent_activations() {
    let (surface, host, license) = engine(false);
    let tab1 = SourceId::for_tab(1);
    let tab2 = SourceId::for_tab(2);
    let tab3 = SourceId::for_tab(3);

    surface.activate_source(&tab1).await.unwrap();
    surface.activate_source(&tab2).await.unwrap();
    // Free tier: tab1 is already gone.
    assert!(host.stream_stopped(&tab1));

    license.set_premium(true);
    surface.activate_source(&tab3).await.unwrap();

    // The upgrade raised the ceiling but did not resurrect tab1.
    assert_eq!(surface.active_sources(), vec![tab2, tab3]);
}

#[tokio::test]
async fn band_layout_matches_tier() {
    let (surface, _host, _) = engine(false);

    assert_eq!(surface.band_layout(Tier::Free).len(), 6);
    assert_eq!(surface.band_layout(Tier::Premium).len(), 15);
    assert_eq!(surface.band_layout(Tier::Free).frequencies()[0], 60.0);
}

#[tokio::test]
async fn premium_activation_gets_fifteen_bands() {
    let (surface, _host, _) = engine(true);
    let tab = SourceId::for_tab(1);

    surface.activate_source(&tab).await.unwrap();

    let pipeline = surface.registry().get(&tab).unwrap();
    assert_eq!(pipeline.layout().len(), 15);
    assert_eq!(pipeline.band_gains().len(), 15);
}

#[tokio::test]
async fn source_lost_forces_deactivation() {
    let (surface, host, _) = engine(false);
    let tab = SourceId::for_tab(4);

    surface.activate_source(&tab).await.unwrap();
    surface.notify_source_lost(&tab).await;

    assert!(!surface.is_active(&tab));
    assert!(host.stream_stopped(&tab));
}

#[tokio::test]
async fn lifecycle_events_are_emitted_in_order() {
    let events: Arc<Mutex<Vec<PipelineEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();

    let host = Arc::new(MockCaptureHost::new(48000, 1));
    let surface = TabEq::builder()
        .capture_host(host)
        .on_event(move |event| events_clone.lock().push(event))
        .build()
        .unwrap();

    let tab1 = SourceId::for_tab(1);
    let tab2 = SourceId::for_tab(2);
    surface.activate_source(&tab1).await.unwrap();
    surface.activate_source(&tab2).await.unwrap();
    surface.deactivate_source(&tab2).await;

    let events = events.lock();
    assert_eq!(events.len(), 4);
    assert!(matches!(
        &events[0],
        PipelineEvent::PipelineActivated { source_id } if *source_id == tab1
    ));
    assert!(matches!(
        &events[1],
        PipelineEvent::PipelineDeactivated { source_id, reason: DeactivationReason::Evicted }
            if *source_id == tab1
    ));
    assert!(matches!(
        &events[2],
        PipelineEvent::PipelineActivated { source_id } if *source_id == tab2
    ));
    assert!(matches!(
        &events[3],
        PipelineEvent::PipelineDeactivated { source_id, reason: DeactivationReason::Explicit }
            if *source_id == tab2
    ));
}

#[tokio::test]
async fn capture_failure_emits_event() {
    let events: Arc<Mutex<Vec<PipelineEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();

    let host = Arc::new(MockCaptureHost::new(48000, 1));
    host.deny(SourceId::for_tab(1));
    let surface = TabEq::builder()
        .capture_host(host)
        .on_event(move |event| events_clone.lock().push(event))
        .build()
        .unwrap();

    let _ = surface.activate_source(&SourceId::for_tab(1)).await;

    let events = events.lock();
    assert!(matches!(&events[0], PipelineEvent::CaptureFailed { .. }));
}

#[tokio::test]
async fn preset_applies_to_active_pipeline() {
    let (surface, _host, _) = engine(false);
    let tab = SourceId::for_tab(1);

    surface.activate_source(&tab).await.unwrap();
    surface.apply_preset(&tab, Preset::BassLight);

    let gains = surface.registry().get(&tab).unwrap().band_gains();
    assert_eq!(gains, vec![4.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
}

#[tokio::test]
async fn settings_record_replays_gains_and_volume() {
    let (surface, _host, _) = engine(false);
    let tab = SourceId::for_tab(1);
    surface.activate_source(&tab).await.unwrap();

    let settings = SourceSettings {
        band_gains: vec![1.0, 2.0, 3.0, -1.0, -2.0, -3.0],
        master_volume: 1.5,
        preset: None,
    };
    surface.apply_settings(&tab, &settings);

    let pipeline = surface.registry().get(&tab).unwrap();
    assert_eq!(pipeline.band_gains(), settings.band_gains);
    assert_eq!(pipeline.master_volume(), 1.5);
}

#[tokio::test]
async fn deactivation_during_slow_activation_cancels_it() {
    let (surface, host, _) = engine(false);
    let tab = SourceId::for_tab(1);
    let registry = surface.registry();

    // The host takes a while to open the stream; deactivate lands in the
    // middle of that wait.
    host.delay_open(Duration::from_millis(150));

    let activate = {
        let registry = registry.clone();
        let tab = tab.clone();
        tokio::spawn(async move { registry.activate_source(&tab, Tier::Free).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    registry.deactivate_source(&tab).await;

    let result = activate.await.unwrap();

    // The activation completed after the cancel: its stream was released
    // immediately and nothing was left registered or running.
    assert!(matches!(result, Err(TabEqError::ActivationCancelled { .. })));
    assert_eq!(registry.active_count(), 0);
    assert!(host.stream_stopped(&tab));
}
