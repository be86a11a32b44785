//! mstflash - Firmware updater for Realtek RTD2142 DisplayPort MST hubs
//!
//! The RTD2142 keeps its firmware in an external 1 MiB SPI flash with
//! two user banks; updates go to the inactive bank and flip its
//! activation flag, so a working image always remains. This binary is a
//! thin front-end over `mstflash-core` (the chip protocol) and
//! `mstflash-linux-i2c` (the i2c-dev transport and DP-AUX bus
//! discovery).

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let result = match cli.command {
        Commands::Info { device } => commands::info::run(&device),
        Commands::Update { device, input } => commands::update::run(&device, &input),
        Commands::Read { device, output } => commands::read::run(&device, &output, false),
        Commands::Dump { device, output } => commands::read::run(&device, &output, true),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
