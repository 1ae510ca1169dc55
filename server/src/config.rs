//! Command-line configuration of the combat server.

use clap::Parser;
use log::LevelFilter;
use shared::Vector;

use crate::combat::CombatSettings;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9003")]
    pub port: u16,

    /// Capacity of the hub and match mailboxes
    #[arg(long, default_value = "2048", value_parser = clap::value_parser!(u64).range(1..))]
    pub hub_command_buffer: u64,

    /// Capacity of each player's outbound mailbox
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u64).range(1..))]
    pub client_send_buffer: u64,

    /// Seed for target generation; random when absent
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    pub log_level: LevelFilter,

    /// Edge length of generated targets (odd)
    #[arg(long, default_value = "5", value_parser = parse_odd_extent)]
    pub target_size: i32,

    /// Fraction of the target volume that is filled
    #[arg(long, default_value = "0.5", value_parser = parse_fraction)]
    pub target_density: f64,

    /// Growth rate of the shape generator per round
    #[arg(long, default_value = "0.1", value_parser = parse_fraction)]
    pub spreading_factor: f64,

    /// Pieces handed to each player
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    pub pieces_per_player: u64,

    /// Capacity of the match created when a client lists an empty server
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u64).range(1..))]
    pub default_players: u64,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn combat_settings(&self) -> CombatSettings {
        CombatSettings {
            target_size: Vector::new(self.target_size, self.target_size, self.target_size),
            density: self.target_density,
            spreading_factor: self.spreading_factor,
            pieces_per_player: self.pieces_per_player as usize,
        }
    }
}

fn parse_odd_extent(value: &str) -> Result<i32, String> {
    let extent: i32 = value.parse().map_err(|e| format!("{}", e))?;
    if extent > 0 && extent % 2 == 1 {
        Ok(extent)
    } else {
        Err(format!("{} is not a positive odd number", extent))
    }
}

fn parse_fraction(value: &str) -> Result<f64, String> {
    let fraction: f64 = value.parse().map_err(|e| format!("{}", e))?;
    if (0.0..=1.0).contains(&fraction) {
        Ok(fraction)
    } else {
        Err(format!("{} is not within [0, 1]", fraction))
    }
}
