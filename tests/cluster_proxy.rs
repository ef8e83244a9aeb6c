//! End-to-end behaviour of a cluster proxy against the in-process channel
#![cfg(feature = "tokio-runtime")]

use markercluster::prelude::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup() -> (Arc<LoopbackChannel>, Arc<MarkerCluster>) {
    init();
    let channel = Arc::new(LoopbackChannel::new());
    let cluster = MarkerCluster::builder()
        .channel(channel.clone())
        .build()
        .expect("channel supplied");
    (channel, cluster)
}

#[tokio::test]
async fn test_default_configuration() {
    let (_, cluster) = setup();
    let options = cluster.options();

    assert_eq!(options.max_cluster_radius, 80);
    assert_eq!(options.chunk_interval, 200);
    assert_eq!(options.chunk_delay, 50);
    assert!(options.show_coverage_on_hover);
    assert!(options.zoom_to_bounds_on_click);
    assert!(options.spiderfy_on_max_zoom);
    assert!(options.remove_outside_visible_bounds);
    assert!(options.animate);
    assert!(!options.animate_adding_markers);
    assert!(!options.single_marker_mode);
    assert!(!options.chunked_loading);
}

#[tokio::test]
async fn test_construction_without_channel_fails() {
    init();
    let result = MarkerClusterBuilder::new().channel_opt(None).build();
    assert!(matches!(result, Err(ClusterError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_remove_layer_success() {
    let (channel, cluster) = setup();
    channel.seed_cluster(cluster.id(), ["layerA"]);

    cluster.remove_layer("layerA").await.unwrap();

    assert_eq!(
        channel.calls(),
        vec![RecordedCall {
            command: "removeToClusterLayer".to_string(),
            args: vec![json!(cluster.id().as_str()), json!("layerA")],
        }]
    );
    assert_eq!(channel.members(cluster.id()), Some(vec![]));
}

#[tokio::test]
async fn test_remove_unknown_layer_is_rejected_without_retry() {
    let (channel, cluster) = setup();
    channel.seed_cluster(cluster.id(), ["layerA"]);

    let err = cluster.remove_layer("layerZ").await.unwrap_err();

    assert!(matches!(err, ClusterError::RemoteRejected(_)));
    assert!(!err.is_transport());
    assert_eq!(channel.calls().len(), 1);
    assert_eq!(channel.members(cluster.id()), Some(vec!["layerA".to_string()]));
}

#[tokio::test]
async fn test_remove_layer_on_unmaterialized_cluster_is_rejected() {
    let (_, cluster) = setup();
    let err = cluster.remove_layer("layerA").await.unwrap_err();
    assert!(matches!(err, ClusterError::RemoteRejected(_)));
}

#[tokio::test]
async fn test_remove_layer_on_closed_channel() {
    let (channel, cluster) = setup();
    channel.seed_cluster(cluster.id(), ["layerA"]);
    channel.close();

    let err = cluster.remove_layer("layerA").await.unwrap_err();

    assert!(matches!(err, ClusterError::BoundaryUnavailable(_)));
    assert!(err.is_transport());
    channel.reopen();
    assert_eq!(channel.members(cluster.id()), Some(vec!["layerA".to_string()]));
}

#[tokio::test]
async fn test_remove_marker_after_materialize() {
    let (channel, cluster) = setup();
    let depot = Marker::new("depot", LatLng::new(52.52, 13.40));
    cluster.add_marker(depot.clone());
    cluster.add_marker(Marker::new("shop", LatLng::new(52.51, 13.39)));

    cluster.materialize("map-main").await.unwrap();
    cluster.remove_marker(&depot).await.unwrap();

    assert_eq!(channel.map_of(cluster.id()).as_deref(), Some("map-main"));
    assert_eq!(channel.members(cluster.id()), Some(vec!["shop".to_string()]));
}

#[tokio::test]
async fn test_two_subscribers_receive_event_once() {
    let (channel, cluster) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second"] {
        let seen = seen.clone();
        let expected_id = cluster.id().clone();
        cluster.on_move(move |sender, event| {
            assert_eq!(sender.id(), &expected_id);
            seen.lock().unwrap().push((name, event.clone()));
            Ok(())
        });
    }

    let event = ClusterEvent::new("move")
        .with_field("latlng", json!({ "lat": 10.0, "lng": 20.0 }))
        .with_field("oldLatLng", json!({ "lat": 9.0, "lng": 20.0 }));
    channel.emit_move(cluster.id(), &event).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], ("first", event.clone()));
    assert_eq!(seen[1], ("second", event));
}

#[tokio::test]
async fn test_sender_is_the_proxy_instance() {
    let (_, cluster) = setup();
    let sender_ptr = Arc::new(AtomicUsize::new(0));

    let slot = sender_ptr.clone();
    cluster.on_move(move |sender, _| {
        slot.store(sender as *const MarkerCluster as usize, Ordering::SeqCst);
        Ok(())
    });
    cluster.notify_move(&ClusterEvent::new("move"));

    assert_eq!(
        sender_ptr.load(Ordering::SeqCst),
        Arc::as_ptr(&cluster) as usize
    );
}

#[tokio::test]
async fn test_unsubscribed_handler_is_skipped() {
    let (channel, cluster) = setup();
    let kept = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));

    let counter = kept.clone();
    cluster.on_move(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let counter = removed.clone();
    let subscription = cluster.on_move(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(cluster.off_move(subscription));
    assert!(!cluster.off_move(subscription));
    channel.emit_move(cluster.id(), &ClusterEvent::new("move")).unwrap();

    assert_eq!(kept.load(Ordering::SeqCst), 1);
    assert_eq!(removed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_inbound_routes_to_correct_instance() {
    init();
    let channel = Arc::new(LoopbackChannel::new());
    let a = MarkerCluster::new(channel.clone());
    let b = MarkerCluster::new(channel.clone());
    let hits_a = Arc::new(AtomicUsize::new(0));
    let hits_b = Arc::new(AtomicUsize::new(0));

    let counter = hits_a.clone();
    a.on_move(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let counter = hits_b.clone();
    b.on_move(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    channel.emit_move(b.id(), &ClusterEvent::new("move")).unwrap();
    channel.emit_move(b.id(), &ClusterEvent::new("move")).unwrap();

    assert_ne!(a.id(), b.id());
    assert_eq!(hits_a.load(Ordering::SeqCst), 0);
    assert_eq!(hits_b.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_move_delivered_while_remove_pending() {
    init();
    let channel = Arc::new(LoopbackChannel::new().with_latency(Duration::from_millis(50)));
    let cluster = MarkerCluster::new(channel.clone());
    channel.seed_cluster(cluster.id(), ["layerA"]);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    cluster.on_move(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let pending = {
        let cluster = cluster.clone();
        tokio::spawn(async move { cluster.remove_layer("layerA").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    channel.emit_move(cluster.id(), &ClusterEvent::new("move")).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    pending.await.unwrap().unwrap();
    assert_eq!(channel.members(cluster.id()), Some(vec![]));
}

#[tokio::test]
async fn test_remove_layer_timeout() {
    init();
    let channel = Arc::new(LoopbackChannel::new().with_latency(Duration::from_millis(200)));
    let cluster = MarkerCluster::new(channel.clone());
    channel.seed_cluster(cluster.id(), ["layerA"]);

    let err = cluster
        .remove_layer_with_timeout("layerA", Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, ClusterError::Timeout(d) if d == Duration::from_millis(20)));
}

#[tokio::test]
async fn test_profile_snapshot_reaches_visual_layer() {
    init();
    let channel = Arc::new(LoopbackChannel::new());
    let cluster = MarkerCluster::builder()
        .channel(channel.clone())
        .with_profile(ClusterProfile::LargeDataset)
        .configure(|o| o.disable_clustering_at_zoom = Some(18))
        .build()
        .unwrap();

    cluster.materialize("map").await.unwrap();
    let remote = channel.remote_options(cluster.id()).unwrap();

    assert_eq!(remote["chunkedLoading"], json!(true));
    assert_eq!(remote["disableClusteringAtZoom"], json!(18));
    assert!(remote.get("chunkProgress").is_none());
}

#[tokio::test]
async fn test_reused_id_keeps_routing_to_live_cluster() {
    init();
    let channel = Arc::new(LoopbackChannel::new());
    let first = MarkerCluster::builder()
        .channel(channel.clone())
        .with_id("page")
        .build()
        .unwrap();
    let second = MarkerCluster::builder()
        .channel(channel.clone())
        .with_id("page")
        .build()
        .unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    second.on_move(move |sender, _| {
        assert_eq!(sender.id().as_str(), "page");
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    drop(first);
    channel
        .emit_move(&ClusterId::from_raw("page"), &ClusterEvent::new("move"))
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);

    drop(second);
    let err = channel
        .emit_move(&ClusterId::from_raw("page"), &ClusterEvent::new("move"))
        .unwrap_err();
    assert!(matches!(err, ClusterError::UnknownTarget(_)));
}

#[tokio::test]
async fn test_event_payload_reaches_subscribers_unchanged() {
    let (channel, cluster) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    cluster.on_move(move |_, event| {
        sink.lock().unwrap().push(event.payload().clone());
        Ok(())
    });

    channel
        .emit(cluster.id(), "NotifyMove", json!({ "x": 1 }))
        .unwrap();
    channel
        .emit(cluster.id(), "NotifyMove", json!({ "type": null, "x": 1 }))
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![json!({ "x": 1 }), json!({ "type": null, "x": 1 })]
    );
}
