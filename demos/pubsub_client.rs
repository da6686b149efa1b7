//! Publish/subscribe client example
//!
//! Run with: cargo run --example pubsub_client <MODE> <CHANNEL> [ARGS]
//!
//! Examples:
//!   cargo run --example pubsub_client sub alerts              # print every message
//!   cargo run --example pubsub_client sub alerts 3            # stop after 3 messages
//!   cargo run --example pubsub_client pub alerts fire         # broadcast
//!   cargo run --example pubsub_client xpub jobs work-item-1   # exclusive
//!
//! Set BROKER_ADDR to reach a broker other than localhost:9261.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use juju_rs::{Client, ClientConfig};

fn print_usage() {
    println!("Usage:");
    println!("  pubsub_client sub <CHANNEL> [COUNT]");
    println!("  pubsub_client pub <CHANNEL> <MESSAGE>");
    println!("  pubsub_client xpub <CHANNEL> <MESSAGE>");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let (mode, channel) = match (args.get(1), args.get(2)) {
        (Some(mode), Some(channel)) => (mode.as_str(), channel.clone()),
        _ => {
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("juju_rs=info".parse()?),
        )
        .init();

    let config = ClientConfig::new(std::env::var("BROKER_ADDR").unwrap_or_default());
    let client = Client::new(config);
    client.connect("").await?;

    match mode {
        "sub" => {
            let limit: Option<usize> = args.get(3).and_then(|n| n.parse().ok());
            let received = Arc::new(AtomicUsize::new(0));
            let handle = client.unsubscribe_handle();

            println!("Subscribed to {}", channel);

            client
                .subscribe(&channel, move |delivery| {
                    let count = received.fetch_add(1, Ordering::Relaxed) + 1;
                    println!(
                        "[{}] {}: {}",
                        count,
                        delivery.channel,
                        String::from_utf8_lossy(&delivery.payload)
                    );

                    if limit.is_some_and(|limit| count >= limit) {
                        handle.unsubscribe();
                    }
                })
                .await?;
        }
        "pub" | "xpub" => {
            let message = args.get(3).map(String::as_str).unwrap_or_default();
            client
                .publish(&channel, message.as_bytes(), mode == "xpub")
                .await?;
            println!("Published {} bytes to {}", message.len(), channel);
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }

    client.disconnect().await?;
    Ok(())
}
