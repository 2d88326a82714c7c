//! Demo library endpoint launcher
//!
//! Run with: endpoint [myHost myPort [libHost libPort]]
//!
//! Defaults to advertising localhost:8082 and registering with a broker at
//! localhost:8081. Serves the bundled in-memory sample catalogue.

use std::net::SocketAddr;

use librarian::broker::DEFAULT_BROKER_PORT;
use librarian::endpoint::{EndpointConfig, EndpointService, DEFAULT_ENDPOINT_PORT};
use librarian::store::MemoryStore;

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
    eprintln!("Usage: endpoint [myHost myPort [libHost libPort]]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!(
        "  myHost myPort     Advertised endpoint address (default: localhost {})",
        DEFAULT_ENDPOINT_PORT
    );
    eprintln!(
        "  libHost libPort   Broker to register with (default: localhost {})",
        DEFAULT_BROKER_PORT
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let (my_host, my_port) = match (args.get(1), args.get(2)) {
        (Some(host), Some(port)) => {
            let port: u16 = match port.parse() {
                Ok(p) => p,
                Err(_) => {
                    eprintln!("Error: Invalid port: '{}'", port);
                    eprintln!();
                    print_usage();
                    std::process::exit(1);
                }
            };
            (host.clone(), port)
        }
        (None, _) => ("localhost".to_string(), DEFAULT_ENDPOINT_PORT),
        _ => {
            print_usage();
            std::process::exit(1);
        }
    };

    let broker_addr = match (args.get(3), args.get(4)) {
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

    let store = MemoryStore::sample_catalogue();
    let config = EndpointConfig::default()
        .advertise(my_host, my_port)
        .broker(broker_addr)
        .supported_types(store.supported_types())
        .dynamic_transforms(store.dynamic_transforms());

    println!(
        "Starting endpoint {}:{} against broker {}",
        config.hostname, config.port, broker_addr
    );

    let mut service = EndpointService::new(config, store);
    tokio::select! {
        result = service.run() => {
            if let Err(e) = result {
                eprintln!("Endpoint error: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
