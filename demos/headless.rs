use markercluster::prelude::*;
use serde_json::json;

/// Drive a cluster proxy against the in-process visual layer, no browser needed
#[tokio::main]
async fn main() -> markercluster::Result<()> {
    markercluster::init_logging();

    let channel = Arc::new(LoopbackChannel::new());
    let cluster = MarkerCluster::builder()
        .channel(channel.clone())
        .with_profile(ClusterProfile::LargeDataset)
        .configure(|o| o.max_cluster_radius = 60)
        .with_markers([
            Marker::new("berlin", LatLng::new(52.5200, 13.4050)).with_title("Berlin"),
            Marker::new("potsdam", LatLng::new(52.3906, 13.0645)).with_title("Potsdam"),
            Marker::new("leipzig", LatLng::new(51.3397, 12.3731)).with_title("Leipzig"),
        ])
        .build()?;

    println!("Cluster {} created", cluster.id());

    cluster.on_move(|sender, event| {
        println!(
            "  move on {}: {:?} -> {:?}",
            sender.id(),
            event.old_lat_lng(),
            event.lat_lng()
        );
        Ok(())
    });

    cluster.materialize("map").await?;
    println!("Materialized with {:?}", channel.members(cluster.id()));

    cluster.remove_layer("potsdam").await?;
    println!("After removal: {:?}", channel.members(cluster.id()));

    match cluster.remove_layer("hamburg").await {
        Ok(()) => println!("Unexpected success"),
        Err(e) => println!("Remove of unknown layer failed as expected: {}", e),
    }

    let event = ClusterEvent::new("move")
        .with_field("oldLatLng", json!({ "lat": 52.52, "lng": 13.405 }))
        .with_field("latlng", json!({ "lat": 52.53, "lng": 13.41 }));
    channel.emit_move(cluster.id(), &event)?;

    println!("Outbound calls issued: {}", channel.calls().len());
    Ok(())
}
