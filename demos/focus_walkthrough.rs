//! Walk through loading hotspots, finding the nearest one and focusing a
//! clustered marker.
//!
//! Run with: cargo run --example focus_walkthrough

use hotspot_locator::{
    AnonymousSession, Locator, LocatorConfig, LocatorEvent, MapCommand, PointId, PositionSample,
};
use serde_json::json;
use std::time::{Duration, Instant};

fn main() {
    let mut locator = Locator::new(LocatorConfig::default(), Box::new(AnonymousSession));
    let start = Instant::now();

    // Three hotspots in the same block, one across town, one malformed row
    let records = vec![
        json!({ "Id": 1, "NOME-WIFI": "Lobby", "LATITUDE": "-20,3000", "LONGITUDE": "-40,3000" }),
        json!({ "Id": 2, "NOME-WIFI": "Cafe", "LATITUDE": -20.3000, "LONGITUDE": -40.3005 }),
        json!({ "Id": 3, "NOME-WIFI": "Gym", "LATITUDE": -20.3000, "LONGITUDE": -40.3010 }),
        json!({ "Id": 4, "NOME-WIFI": "Depot", "LATITUDE": -20.3500, "LONGITUDE": -40.2500 }),
        json!({ "Id": 5, "NOME-WIFI": "Broken", "LATITUDE": "abc", "LONGITUDE": "-40.4" }),
    ];

    println!("Hotspot Locator Walkthrough\n");

    let commands = locator.handle(LocatorEvent::PointsLoaded(records), start);
    let report = locator.last_report();
    println!("1. Loaded {} hotspots ({} dropped)", report.accepted, report.dropped);
    print_commands(&commands);

    locator.handle(LocatorEvent::PositionUpdated(PositionSample::new(-20.3005, -40.3005, 0)), start);
    match locator.proximity_card() {
        Some(card) => println!(
            "2. Nearest: {} at {:.1}m (within threshold: {})\n",
            card.name(),
            card.distance_meters,
            card.within
        ),
        None => println!("2. No nearest hotspot\n"),
    }

    locator.handle(LocatorEvent::ViewportChanged { zoom: 12 }, start);
    println!(
        "3. At zoom 12: {} clusters, {} single markers",
        locator.view().clusters().len(),
        locator.view().singletons().len()
    );

    let Some(cluster) = locator.view().clusters().first().map(|c| c.id) else {
        println!("   Nothing clustered");
        return;
    };
    locator.handle(LocatorEvent::ClusterActivated(cluster), start);
    for item in locator.disambiguation().items() {
        println!("   - {} ({})", item.payload.name, item.id);
    }

    println!("\n4. Selecting \"Cafe\" from the list:");
    let commands = locator.handle(LocatorEvent::ListItemSelected(PointId::from("2")), start);
    print_commands(&commands);

    // Play the host's part: finish each camera move as soon as it is issued
    let mut pending = commands;
    while let Some(command) = pending.pop() {
        let next = match command {
            MapCommand::Reveal { ticket, zoom, .. } => {
                locator.handle(LocatorEvent::ViewportChanged { zoom }, start);
                locator.handle(LocatorEvent::RevealCompleted(ticket), start)
            }
            MapCommand::FlyTo { ticket, zoom, .. } => {
                locator.handle(LocatorEvent::ViewportChanged { zoom }, start);
                locator.handle(LocatorEvent::MoveCompleted(ticket), start)
            }
            _ => Vec::new(),
        };
        print_commands(&next);
        pending.extend(next);
    }

    let state = locator.focus_state();
    println!("\n5. Focused: {:?}", state.target.as_ref().map(PointId::as_str));

    locator.handle(LocatorEvent::Tick, start + Duration::from_secs(5));
    println!("6. After 5s: {:?}", locator.focus_state().target);
}

fn print_commands(commands: &[MapCommand]) {
    for command in commands {
        println!("   -> {:?}", command);
    }
    if !commands.is_empty() {
        println!();
    }
}
