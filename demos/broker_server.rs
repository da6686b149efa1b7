//! Broker server example
//!
//! Run with: cargo run --example broker_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example broker_server                    # LISTEN_ADDRESS or localhost:9261
//!   cargo run --example broker_server 0.0.0.0:9261       # all interfaces
//!   LISTEN_ADDRESS=127.0.0.1:9300 cargo run --example broker_server
//!
//! Stop with Ctrl+C; the broker prints its counters on the way out.

use juju_rs::{BrokerServer, ServerConfig};

fn print_usage() {
    println!("Usage: broker_server [BIND_ADDR]");
    println!();
    println!("BIND_ADDR defaults to $LISTEN_ADDRESS, then localhost:9261");
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
                .add_directive("juju_rs=debug".parse()?)
                .add_directive("broker_server=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::from_env();
    if let Some(addr) = args.get(1) {
        config = config.bind(addr);
    }

    println!("Starting broker on {}", config.bind_addr);

    let server = BrokerServer::new(config);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await?;

    let stats = server.stats();
    println!(
        "Stats: connections={} subscriptions={} publishes={} deliveries={} failed={}",
        stats.connections_accepted,
        stats.subscriptions,
        stats.publishes,
        stats.deliveries,
        stats.failed_deliveries,
    );

    Ok(())
}
