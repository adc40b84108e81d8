//! End-to-end collection tests against the in-memory backend.
//!
//! Tests run on a paused clock so the signal settle delays and per-modem
//! deadlines elapse instantly.

mod common;

use common::{exporter, CallLog, FakeBearer, FakeManager, FakeModem};
use modem_exporter::modem::types::{ModemState, RegistrationState, SignalSample};
use modem_exporter::{ExporterConfig, PipelineProfile};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

fn paths(modems: &[modem_exporter::CollectedModem]) -> Vec<&str> {
    modems.iter().map(|m| m.snapshot.path.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_unidentifiable_modem_is_skipped() {
    let log = CallLog::default();
    let manager = FakeManager::new(vec![
        FakeModem::new(0, &log),
        FakeModem::new(1, &log).failing("sim"),
        FakeModem::new(2, &log),
    ]);
    let exporter = exporter(manager, ExporterConfig::default());

    for profile in [PipelineProfile::pull(), PipelineProfile::push()] {
        let modems = exporter.collect(&profile).await.unwrap();
        assert_eq!(
            paths(&modems),
            vec![
                "/org/freedesktop/ModemManager1/Modem/0",
                "/org/freedesktop/ModemManager1/Modem/2"
            ]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_disabled_modem_is_enabled_without_reconnect() {
    let log = CallLog::default();
    let manager = FakeManager::new(vec![FakeModem::new(0, &log).with_state(ModemState::Disabled)]);
    let exporter = exporter(manager, ExporterConfig::default());

    let modems = exporter.collect(&PipelineProfile::pull()).await.unwrap();
    assert_eq!(modems.len(), 1);

    let modem = &modems[0];
    assert_eq!(modem.snapshot.state, Some(ModemState::Registered));
    assert_eq!(modem.derived.registered, Some(true));
    assert_eq!(modem.derived.connected, Some(false));

    assert!(log.contains("enable"));
    assert_eq!(log.count_prefix("connect"), 0);
    assert_eq!(log.count_prefix("disconnect"), 0);
    assert_eq!(log.count_prefix("delete"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_modem_that_cannot_be_enabled_is_skipped() {
    let log = CallLog::default();
    let manager = FakeManager::new(vec![
        FakeModem::new(0, &log)
            .with_state(ModemState::Disabled)
            .failing("enable"),
        FakeModem::new(1, &log),
    ]);
    let exporter = exporter(manager, ExporterConfig::default());

    let modems = exporter.collect(&PipelineProfile::push()).await.unwrap();
    assert_eq!(paths(&modems), vec!["/org/freedesktop/ModemManager1/Modem/1"]);
}

#[tokio::test(start_paused = true)]
async fn test_registered_modem_is_reconnected() {
    let log = CallLog::default();
    let modem = FakeModem::new(0, &log)
        .with_bearer(FakeBearer::new("/org/freedesktop/ModemManager1/Bearer/0", &log))
        .with_bearer(FakeBearer::new("/org/freedesktop/ModemManager1/Bearer/1", &log));
    let manager = FakeManager::new(vec![modem]);
    let config = ExporterConfig::default().with_apn(Some("internet".into()));
    let exporter = exporter(manager, config);

    let modems = exporter.collect(&PipelineProfile::push()).await.unwrap();
    assert_eq!(modems.len(), 1);
    // Bearers were read before reconciliation tore them down.
    assert_eq!(modems[0].snapshot.bearers.as_ref().map(Vec::len), Some(2));

    let reconcile_calls: Vec<String> = log
        .calls()
        .into_iter()
        .filter(|c| !c.starts_with("setup_signal"))
        .collect();
    assert_eq!(
        reconcile_calls,
        vec![
            "disconnect /org/freedesktop/ModemManager1/Bearer/0",
            "delete /org/freedesktop/ModemManager1/Bearer/0",
            "disconnect /org/freedesktop/ModemManager1/Bearer/1",
            "delete /org/freedesktop/ModemManager1/Bearer/1",
            "connect internet",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_still_reports_modem() {
    let log = CallLog::default();
    let modem = FakeModem::new(0, &log)
        .with_bearer(FakeBearer::new("/org/freedesktop/ModemManager1/Bearer/0", &log).failing("disconnect"))
        .failing("connect");
    let manager = FakeManager::new(vec![modem]);
    let config = ExporterConfig::default().with_apn(Some("internet".into()));
    let exporter = exporter(manager, config);

    let out = exporter.scrape_prometheus().await.unwrap();
    assert!(out.contains("modem_registered{"));
    assert!(log.contains("delete /org/freedesktop/ModemManager1/Bearer/0"));
    assert!(log.contains("connect internet"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_reconnect_keeps_collected_modem() {
    let log = CallLog::default();
    let modem = FakeModem::new(0, &log).with_connect_delay(Duration::from_secs(120));
    let manager = FakeManager::new(vec![modem]);
    let config = ExporterConfig::default().with_apn(Some("internet".into()));
    let exporter = exporter(manager, config);

    // connect outlasts the 60 second deadline; the read itself does not.
    let out = exporter.scrape_prometheus().await.unwrap();
    assert!(out.contains("modem_registered{"));
    assert!(out.contains("imei=\"867962041234560\""));
    assert!(log.contains("connect internet"));

    let modems = exporter.collect(&PipelineProfile::push()).await.unwrap();
    assert_eq!(modems.len(), 1);
    assert_eq!(log.count_prefix("connect"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connected_modem_is_left_alone() {
    let log = CallLog::default();
    let modem = FakeModem::new(0, &log)
        .with_state(ModemState::Connected)
        .with_bearer(FakeBearer::new("/org/freedesktop/ModemManager1/Bearer/0", &log));
    let manager = FakeManager::new(vec![modem]);
    let config = ExporterConfig::default().with_apn(Some("internet".into()));
    let exporter = exporter(manager, config);

    let modems = exporter.collect(&PipelineProfile::pull()).await.unwrap();
    assert_eq!(modems[0].derived.connected, Some(true));
    assert_eq!(log.count_prefix("connect"), 0);
    assert_eq!(log.count_prefix("delete"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_signal_survives_failed_teardown() {
    let log = CallLog::default();
    let mut lte = SignalSample::new("lte");
    lte.rsrp = Some(-98.0);
    let mut umts = SignalSample::new("umts");
    umts.rssi = Some(-71.0);

    let modem = FakeModem::new(0, &log)
        .with_signals(vec![lte, umts])
        .failing("disable_signal");
    let exporter = exporter(FakeManager::new(vec![modem]), ExporterConfig::default());

    let out = exporter.scrape_influx().await.unwrap();
    let signal_lines: Vec<&str> = out.lines().filter(|l| l.starts_with("modem_signal,")).collect();
    assert_eq!(signal_lines.len(), 2);
    assert!(signal_lines[0].contains(",type=lte rsrp=-98 "));
    assert!(signal_lines[1].contains(",type=umts rssi=-71 "));

    assert_eq!(log.calls(), vec!["setup_signal 1", "setup_signal 0"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_signal_read_still_disables_reporting() {
    for profile in [PipelineProfile::pull(), PipelineProfile::push()] {
        let log = CallLog::default();
        let modem = FakeModem::new(0, &log).failing("current_signals");
        let exporter = exporter(FakeManager::new(vec![modem]), ExporterConfig::default());

        let modems = exporter.collect(&profile).await.unwrap();
        assert_eq!(modems.len(), 1);
        assert_eq!(modems[0].snapshot.signal, None);
        assert_eq!(modems[0].snapshot.location.as_ref().map(|l| l.tac_hex.as_str()), Some("A1B2"));

        // Teardown happens in line, not from a spawned task.
        assert_eq!(log.calls(), vec!["setup_signal 1", "setup_signal 0"]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_signal_polling_waits_for_values() {
    let log = CallLog::default();
    let modem = FakeModem::new(0, &log).with_empty_signal_reads(2);
    let reads = modem.signal_reads.clone();
    let exporter = exporter(FakeManager::new(vec![modem]), ExporterConfig::default());

    let started = Instant::now();
    let modems = exporter.collect(&PipelineProfile::push()).await.unwrap();
    let elapsed = started.elapsed();

    let signal = modems[0].snapshot.signal.as_ref().unwrap();
    assert_eq!(signal.len(), 1);
    assert_eq!(signal[0].rsrp, Some(-95.0));
    assert_eq!(reads.load(Ordering::SeqCst), 3);
    assert!(elapsed >= Duration::from_millis(1200));
    assert!(elapsed < Duration::from_millis(1600));
}

#[tokio::test(start_paused = true)]
async fn test_signal_polling_gives_up_after_max() {
    let log = CallLog::default();
    let modem = FakeModem::new(0, &log).with_empty_signal_reads(usize::MAX);
    let reads = modem.signal_reads.clone();
    let exporter = exporter(FakeManager::new(vec![modem]), ExporterConfig::default());

    let modems = exporter.collect(&PipelineProfile::push()).await.unwrap();
    let signal = modems[0].snapshot.signal.as_ref().unwrap();
    assert!(!signal[0].has_values());
    // 400ms steps until two seconds have been waited.
    assert_eq!(reads.load(Ordering::SeqCst), 5);
    assert_eq!(log.calls(), vec!["setup_signal 1", "setup_signal 0"]);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_technologies() {
    let log = CallLog::default();
    let manager = FakeManager::new(vec![FakeModem::new(0, &log).with_technologies(&["LTE", "UMTS"])]);
    let exporter = exporter(manager, ExporterConfig::default());

    let pushed = exporter.collect(&PipelineProfile::push()).await.unwrap();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].identity.rat, "lte");

    let pulled = exporter.collect(&PipelineProfile::pull()).await.unwrap();
    assert!(pulled.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_field_is_omitted() {
    let log = CallLog::default();
    let manager = FakeManager::new(vec![FakeModem::new(0, &log).failing("location")]);
    let exporter = exporter(manager, ExporterConfig::default());

    let prometheus = exporter.scrape_prometheus().await.unwrap();
    assert!(prometheus.contains("modem_registered{"));
    assert!(!prometheus.contains("modem_cellid"));
    assert!(!prometheus.contains("modem_lac"));
    // Reading stops at the first failure on the pull path.
    assert!(!prometheus.contains("modem_roaming"));
    assert!(!prometheus.contains("modem_rssi"));

    let influx = exporter.scrape_influx().await.unwrap();
    let status = influx.lines().find(|l| l.starts_with("modem_status,")).unwrap();
    assert!(!status.contains("cellid="));
    assert!(!status.contains("lac="));
    assert!(status.contains("roaming=false"));
    assert!(status.contains("operatorcode=26201i"));
    assert!(influx.lines().any(|l| l.starts_with("modem_signal,")));
}

#[tokio::test(start_paused = true)]
async fn test_prometheus_exposition() {
    let log = CallLog::default();
    let manager = FakeManager::new(vec![FakeModem::new(0, &log)]);
    let exporter = exporter(manager, ExporterConfig::default());

    let out = exporter.scrape_prometheus().await.unwrap();
    assert!(out.contains("modem_up 1"));
    assert!(out.contains("imei=\"867962041234560\""));
    assert!(out.contains("rat=\"lte\""));
    assert!(out.contains("} 28623369"));
    assert!(out.contains("} 65534"));
    assert!(out.contains("} 41394"));
    assert!(out.contains("} 26201"));
    assert!(out.contains("} -65"));
    assert!(out.contains("} -95"));
}

#[tokio::test(start_paused = true)]
async fn test_line_protocol_records() {
    let log = CallLog::default();
    let modem = FakeModem::new(0, &log)
        .with_state(ModemState::Connected)
        .with_bearer(FakeBearer::new("/org/freedesktop/ModemManager1/Bearer/3", &log));
    let exporter = exporter(FakeManager::new(vec![modem]), ExporterConfig::default());

    let out = exporter.scrape_influx().await.unwrap();
    let status = out.lines().find(|l| l.starts_with("modem_status,")).unwrap();
    assert!(status.starts_with(
        "modem_status,imei=867962041234560,icc=8949022000000000000,imsi=262010000000000,\
         operatorid=26201,operator=Telekom.de,v_operator=Telekom.de,rat=lte up=true,"
    ));
    assert!(status.contains("state=\"connected\""));
    assert!(status.contains("cellid=28623369i"));
    assert!(status.contains("cellid_hex=\"01B4C209\""));
    assert!(status.contains("power_state=\"on\""));
    assert!(status.contains("messages=1i"));

    let bearer = out.lines().find(|l| l.starts_with("modem_bearer,")).unwrap();
    assert!(bearer.contains(",bearer=3,interface=wwan0,apn=internet,bearer_type=default "));
    assert!(bearer.contains("rx_bytes=1024i"));

    let ip = out.lines().find(|l| l.starts_with("modem_bearer_ip,")).unwrap();
    assert!(ip.contains(",bearer=3,family=ipv4 address=\"10.64.1.2\",prefix=30i"));

    // Every record of a modem shares its timestamp.
    let stamps: Vec<&str> = out.lines().filter_map(|l| l.rsplit(' ').next()).collect();
    assert!(stamps.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test(start_paused = true)]
async fn test_roaming_requires_registration() {
    let log = CallLog::default();
    let mut roaming = FakeModem::new(0, &log);
    roaming.three_gpp.registration_state = Some(RegistrationState::Roaming);
    let mut searching = FakeModem::new(1, &log).with_state(ModemState::Searching);
    searching.three_gpp.registration_state = Some(RegistrationState::Roaming);

    let exporter = exporter(FakeManager::new(vec![roaming, searching]), ExporterConfig::default());
    let modems = exporter.collect(&PipelineProfile::pull()).await.unwrap();

    assert_eq!(modems[0].derived.roaming, Some(true));
    assert_eq!(modems[1].derived.registered, Some(false));
    assert_eq!(modems[1].derived.roaming, Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_listing_failure() {
    let exporter = exporter(FakeManager::failing_listing(), ExporterConfig::default());

    let prometheus = exporter.scrape_prometheus().await.unwrap();
    assert!(!prometheus.contains("modem_up"));
    assert!(exporter.scrape_influx().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_slow_modem_times_out_and_releases_signal() {
    let log = CallLog::default();
    let manager = FakeManager::new(vec![FakeModem::new(0, &log)]);
    let config = ExporterConfig::default().with_modem_timeout_secs(1);
    let exporter = exporter(manager, config);

    // The fixed two second settle outlasts the deadline.
    let modems = exporter.collect(&PipelineProfile::pull()).await.unwrap();
    assert!(modems.is_empty());

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(log.calls(), vec!["setup_signal 1", "setup_signal 0"]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_collection() {
    let log = CallLog::default();
    let manager = FakeManager::new((0..3).map(|i| FakeModem::new(i, &log)).collect());
    let config = ExporterConfig::default().with_concurrent_modems(true);
    let exporter = exporter(manager, config);

    let modems = exporter.collect(&PipelineProfile::push()).await.unwrap();
    assert_eq!(modems.len(), 3);
    assert_eq!(log.count_prefix("setup_signal 0"), 3);
}
