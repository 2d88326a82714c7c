//! Librarian broker launcher
//!
//! Run with: librarian [hostname port]
//!
//! Defaults to localhost:8081. Endpoints and clients connect to the same
//! port; endpoints identify themselves by registering.

use std::net::SocketAddr;

use librarian::broker::{BrokerConfig, Librarian, DEFAULT_BROKER_PORT};

fn parse_addr(hostname: &str, port: &str) -> Result<SocketAddr, String> {
    let host = if hostname == "localhost" {
        "127.0.0.1"
    } else {
        hostname
    };
    let ip: std::net::IpAddr = host
        .parse()
        .map_err(|_| format!("Invalid hostname: '{}'", hostname))?;
    let port: u16 = port.parse().map_err(|_| format!("Invalid port: '{}'", port))?;
    Ok(SocketAddr::new(ip, port))
}

fn print_usage() {
    eprintln!("Usage: librarian [hostname port]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  hostname   Address to bind to (default: localhost)");
    eprintln!("  port       Port to bind to (default: {})", DEFAULT_BROKER_PORT);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match (args.get(1), args.get(2)) {
        (Some(host), Some(port)) => match parse_addr(host, port) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        (None, _) => SocketAddr::from(([127, 0, 0, 1], DEFAULT_BROKER_PORT)),
        _ => {
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("librarian=info".parse()?),
        )
        .init();

    println!("Starting librarian on {}", bind_addr);

    let librarian = Librarian::new(BrokerConfig::with_addr(bind_addr));
    librarian
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
