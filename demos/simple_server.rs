//! Simple telemetry server example backed by the in-memory store
//!
//! Run with: cargo run --example simple_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                    # binds to 0.0.0.0:8080
//!   cargo run --example simple_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example simple_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! `TELEMETRY_*` environment variables are applied first; a command line
//! address overrides `TELEMETRY_BIND_ADDR`.
//!
//! ## Watching a farm
//!
//! With websocat:
//!   websocat 'ws://localhost:8080/ws?farm_id=F1'
//!
//! ## Reporting a position
//!
//! Inside the seeded paddock:
//!   curl -i -X POST localhost:8080/api/v1/iot/gps -H 'X-Device-Key: k1' \
//!     -d '{"lat":-20.0,"lng":-54.0,"speed_kmh":2.5,"battery":90}'
//!
//! Outside it (also raises an out_of_zone alert):
//!   curl -i -X POST localhost:8080/api/v1/iot/gps -H 'X-Device-Key: k1' \
//!     -d '{"lat":-20.05,"lng":-54.0,"speed_kmh":6.0,"battery":89}'

use std::net::SocketAddr;
use std::sync::Arc;

use telemetry_hub::store::{DeviceCredential, DeviceId, DeviceRecord, Geofence};
use telemetry_hub::{
    EntityId, GeoPoint, InMemoryStore, Polygon, ServerConfig, TelemetryServer, TenantId,
};

/// Parse bind address from command line argument
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "127.0.0.1:9000" -> 127.0.0.1:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8080)");
}

/// One farm, one animal wearing collar D1, one 200 m square paddock
async fn seed(store: &InMemoryStore) {
    let farm = TenantId::new("F1");
    let animal = EntityId::new("A1");

    store
        .insert_device(
            DeviceCredential::new("k1"),
            DeviceRecord {
                device_id: DeviceId::new("D1"),
                tenant_id: farm.clone(),
                entity_id: Some(animal.clone()),
                is_active: true,
            },
        )
        .await;

    store
        .assign_geofence(
            farm,
            animal,
            Geofence {
                zone_id: "Z1".into(),
                name: "North paddock".into(),
                polygon: Polygon::square_around(GeoPoint::new(-20.0, -54.0), 200.0),
            },
        )
        .await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telemetry_hub=debug".parse()?)
                .add_directive("simple_server=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    let store = Arc::new(InMemoryStore::new());
    seed(&store).await;

    println!("Starting telemetry server on {}", config.bind_addr);
    println!("Seeded device key 'k1' -> animal A1 on farm F1");
    println!();

    let server = TelemetryServer::with_store(config, store);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!("Server stopped");
    Ok(())
}
