//! Payload and packet builders shared by unit tests and benchmarks

#![cfg(any(test, feature = "benchmark"))]

use serde_json::{Value, json};

use crate::telemetry::TelemetryPacket;

/// Raw session object for one driver with the given lap times.
///
/// Every lap is marked valid and split into three equal sectors.
pub fn session_payload(track: &str, username: &str, car: &str, lap_times: &[f64]) -> Value {
    let laps: Vec<Value> = lap_times
        .iter()
        .map(|time| json!({ "time": time, "valid": 1, "sectors": [time / 3.0, time / 3.0, time / 3.0] }))
        .collect();

    json!({
        "track": track,
        "players": [{ "name": username, "car": car }],
        "sessions": [{ "laps": laps }]
    })
}

/// A list payload of `sessions` sessions with `laps_per_session` laps each.
///
/// Sessions rotate through a small pool of drivers, tracks and cars so that
/// resolution sees both new and existing entities.
pub fn bulk_payload(sessions: usize, laps_per_session: usize) -> Value {
    const TRACKS: [&str; 4] = ["Monza", "Spa", "Suzuka", "Imola"];
    const CARS: [&str; 3] = ["GT3", "GT4", "F1"];
    const DRIVERS: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

    let list = (0..sessions)
        .map(|n| {
            let times: Vec<f64> = (0..laps_per_session)
                .map(|lap| 90_000.0 + (n * 131 + lap * 17) as f64)
                .collect();
            session_payload(
                TRACKS[n % TRACKS.len()],
                DRIVERS[n % DRIVERS.len()],
                CARS[n % CARS.len()],
                &times,
            )
        })
        .collect();

    Value::Array(list)
}

/// Deterministic packets with increasing ids.
pub fn sample_packets(count: usize) -> Vec<TelemetryPacket> {
    (0..count)
        .map(|n| TelemetryPacket {
            packet_id: n as i32,
            speed_kmh: 120.0 + (n % 80) as f32,
            rpm: 4000.0 + (n % 40) as f32 * 100.0,
            gear: 1 + (n % 6) as i32,
        })
        .collect()
}
