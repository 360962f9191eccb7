mod common;

use std::collections::BTreeSet;

use common::{endpoint, fill, AdapterLab, Harness, LoadBehavior};
use rewarded_engine::{
    AdErrorKind, AdResponse, AdapterCatalog, ListenerEvent, LoadStatus, RequestParameters,
    Reward, SettingsBag, TrackedCall,
};

fn units(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Loads `names` in order against one shared `(demo, net-1)` adapter pair and
/// drains every load-success.
async fn load_shared(h: &mut Harness, names: &[&str], response: AdResponse) {
    for (loaded, name) in names.iter().enumerate() {
        h.transport.respond_always(endpoint(name), Ok(response.clone()));
        h.load(name);
        // Each success fans out to every unit already bound to the pair.
        for _ in 0..=loaded {
            assert!(matches!(h.next_event().await, ListenerEvent::LoadSuccess(_)));
        }
    }
}

fn shared_lab() -> (AdapterLab, AdapterCatalog) {
    let lab = AdapterLab::new("net-1", LoadBehavior::Succeed);
    let catalog = lab.register(AdapterCatalog::new(), "demo");
    (lab, catalog)
}

#[test_timeout::tokio_timeout_test(10)]
async fn load_success_fans_out_to_units_sharing_a_network() {
    let (_lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    h.transport.respond_always(endpoint("u1"), Ok(fill("demo")));
    h.transport.respond_always(endpoint("u2"), Ok(fill("demo")));

    h.load("u1");
    assert_eq!(h.next_event().await, ListenerEvent::LoadSuccess("u1".into()));
    h.load("u2");
    let mut heard = BTreeSet::new();
    for _ in 0..2 {
        match h.next_event().await {
            ListenerEvent::LoadSuccess(unit) => {
                heard.insert(unit);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(heard, units(&["u1", "u2"]));
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn same_network_id_under_other_kind_is_not_shared() {
    let first = AdapterLab::new("shared", LoadBehavior::Succeed);
    let second = AdapterLab::new("shared", LoadBehavior::Succeed);
    let catalog = second.register(first.register(AdapterCatalog::new(), "alpha"), "beta");
    let mut h = Harness::start(catalog);
    h.transport.respond_always(endpoint("u1"), Ok(fill("alpha")));
    h.transport.respond_always(endpoint("u2"), Ok(fill("beta")));

    h.load("u1");
    assert_eq!(h.next_event().await, ListenerEvent::LoadSuccess("u1".into()));
    h.load("u2");
    assert_eq!(h.next_event().await, ListenerEvent::LoadSuccess("u2".into()));
    h.assert_quiet().await;

    second.events(0).closed("shared");
    assert_eq!(h.next_event().await, ListenerEvent::Closed("u2".into()));
    h.assert_quiet().await;
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn playback_error_reaches_only_the_displaying_unit() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    load_shared(&mut h, &["u1", "u2"], fill("demo")).await;

    h.show("u1");
    h.settle().await;
    lab.events(1)
        .playback_failed("net-1", AdErrorKind::VideoPlayback);
    assert_eq!(
        h.next_event().await,
        ListenerEvent::PlaybackError("u1".into(), AdErrorKind::VideoPlayback)
    );
    h.assert_quiet().await;

    assert_eq!(h.status("u1").await, LoadStatus::Failed);
    assert_eq!(h.status("u2").await, LoadStatus::Loaded);
    assert!(!h.snapshot("u1").await.displaying);
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn playback_events_fan_out_when_nothing_is_displayed() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    load_shared(&mut h, &["u1", "u2"], fill("demo")).await;

    lab.events(0).closed("net-1");
    assert_eq!(h.next_event().await, ListenerEvent::Closed("u1".into()));
    assert_eq!(h.next_event().await, ListenerEvent::Closed("u2".into()));
    // Neither unit was playing, so both stay loaded.
    assert_eq!(h.status("u1").await, LoadStatus::Loaded);
    assert_eq!(h.status("u2").await, LoadStatus::Loaded);
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn impression_and_click_urls_fire_once() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    let response = AdResponse {
        adapter_kind: Some("demo".into()),
        impression_tracking_url: Some("https://track.test/imp".into()),
        click_tracking_url: Some("https://track.test/click".into()),
        ..AdResponse::default()
    };
    h.transport.respond_always(endpoint("u1"), Ok(response));
    h.load("u1");
    h.next_event().await;
    h.show("u1");

    let events = lab.events(0);
    events.started("net-1");
    events.started("net-1");
    events.clicked("net-1");
    events.clicked("net-1");
    for expected in [
        ListenerEvent::Started("u1".into()),
        ListenerEvent::Started("u1".into()),
        ListenerEvent::Clicked("u1".into()),
        ListenerEvent::Clicked("u1".into()),
    ] {
        assert_eq!(h.next_event().await, expected);
    }
    assert_eq!(
        h.tracker.beacons(),
        vec![
            "https://track.test/imp".to_string(),
            "https://track.test/click".to_string()
        ]
    );
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn completion_pays_last_shown_terms_to_every_sharing_unit() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    let response = AdResponse {
        adapter_kind: Some("demo".into()),
        currency_name: Some("coins".into()),
        currency_amount: Some("5".into()),
        ..AdResponse::default()
    };
    load_shared(&mut h, &["u1", "u2"], response).await;

    h.show("u1");
    lab.events(1).completed("net-1", Reward::success("generic", 1));
    assert_eq!(
        h.next_event().await,
        ListenerEvent::Completed(units(&["u1", "u2"]), Reward::success("coins", 5))
    );
    h.assert_quiet().await;
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn unsuccessful_completion_is_passed_through() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    let response = AdResponse {
        adapter_kind: Some("demo".into()),
        currency_name: Some("coins".into()),
        currency_amount: Some("5".into()),
        ..AdResponse::default()
    };
    load_shared(&mut h, &["u1"], response).await;

    h.show("u1");
    lab.events(0).completed("net-1", Reward::failure());
    assert_eq!(
        h.next_event().await,
        ListenerEvent::Completed(units(&["u1"]), Reward::failure())
    );
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn completion_without_shown_terms_uses_reported_reward() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    load_shared(&mut h, &["u1"], fill("demo")).await;

    lab.events(0).completed("net-1", Reward::success("gems", 2));
    assert_eq!(
        h.next_event().await,
        ListenerEvent::Completed(units(&["u1"]), Reward::success("gems", 2))
    );
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn server_completion_url_replaces_local_payout() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    let response = AdResponse {
        adapter_kind: Some("demo".into()),
        completion_url: Some("https://rewards.test/confirm".into()),
        ..AdResponse::default()
    };
    h.transport.respond_always(endpoint("u1"), Ok(response));
    h.handle
        .load(
            "u1",
            RequestParameters::default().customer_id("cust-42"),
            SettingsBag::new(),
        )
        .unwrap();
    h.next_event().await;
    h.show("u1");

    lab.events(0).completed("net-1", Reward::success("coins", 5));
    h.assert_quiet().await;
    assert_eq!(
        h.tracker.calls(),
        vec![TrackedCall::Completion {
            url: "https://rewards.test/confirm".into(),
            customer_id: Some("cust-42".into()),
        }]
    );
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn events_from_replaced_binding_are_ignored() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    load_shared(&mut h, &["u1"], fill("demo")).await;

    h.load("u1");
    assert_eq!(h.next_event().await, ListenerEvent::LoadSuccess("u1".into()));
    assert!(lab.disposed(0));

    let stale = lab.events(0);
    stale.started("net-1");
    stale.load_failed("net-1", AdErrorKind::NoFill);
    stale.completed("net-1", Reward::success("coins", 1));
    h.assert_quiet().await;
    assert_eq!(h.status("u1").await, LoadStatus::Loaded);
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn load_failure_fans_out_to_sharing_units() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    load_shared(&mut h, &["u1", "u2"], fill("demo")).await;

    lab.events(1).load_failed("net-1", AdErrorKind::NoFill);
    let mut failed = BTreeSet::new();
    for _ in 0..2 {
        match h.next_event().await {
            ListenerEvent::LoadFailure(unit, AdErrorKind::NoFill) => {
                failed.insert(unit);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(failed, units(&["u1", "u2"]));
    assert_eq!(h.status("u1").await, LoadStatus::Failed);
    assert_eq!(h.status("u2").await, LoadStatus::Failed);
    h.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10)]
async fn failed_adapter_is_retired_while_failover_runs() {
    let (lab, catalog) = shared_lab();
    let mut h = Harness::start(catalog);
    let mut primary = fill("demo");
    primary.failover_url = Some(endpoint("u1-backup"));
    h.transport.respond_always(endpoint("u1"), Ok(primary));
    h.transport.respond_always(endpoint("u1-backup"), Ok(fill("demo")));

    h.load("u1");
    assert_eq!(h.next_event().await, ListenerEvent::LoadSuccess("u1".into()));

    h.transport.hold();
    lab.events(0).load_failed("net-1", AdErrorKind::NoFill);
    h.settle().await;
    let snapshot = h.snapshot("u1").await;
    assert_eq!(snapshot.status, LoadStatus::Loading);
    assert!(snapshot.binding.is_none());
    assert!(lab.disposed(0));

    lab.events(0).load_succeeded("net-1");
    h.assert_quiet().await;
    assert_eq!(h.status("u1").await, LoadStatus::Loading);

    h.transport.release();
    assert_eq!(h.next_event().await, ListenerEvent::LoadSuccess("u1".into()));
    assert_eq!(h.transport.request_count(), 2);
    assert_eq!(lab.instances(), 2);
    h.shutdown().await;
}
