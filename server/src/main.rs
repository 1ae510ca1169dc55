use clap::Parser;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::Config;
use server::hub::Hub;
use server::network::Server;

/// Parses the command line, then runs the hub and the TCP server until
/// either stops or Ctrl+C arrives.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    env_logger::Builder::new()
        .filter_level(config.log_level)
        .parse_default_env()
        .init();

    let rng = match config.seed {
        Some(seed) => {
            info!("Using seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let (hub, handle) = Hub::new(
        config.combat_settings(),
        config.default_players as usize,
        config.hub_command_buffer as usize,
        rng,
    );
    let server = Server::bind(&config.address(), handle, config.client_send_buffer as usize).await?;
    let hub_task = tokio::spawn(hub.run());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        result = hub_task => {
            if let Err(e) = result {
                error!("Hub task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
