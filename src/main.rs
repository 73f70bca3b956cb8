use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use std::error::Error;
use std::io;

use accelplay::player;
use accelplay::player::rate::RateConfig;

#[derive(Parser)]
#[command(name = "accelplay")]
#[command(about = "A terminal audio player that speeds up as the song progresses")]
#[command(version)]
struct Cli {
    /// Audio file to load on startup (WAV or FLAC)
    file: Option<String>,

    /// Playback rate at the start of the song
    #[arg(long, default_value_t = 1.0)]
    start_rate: f64,

    /// Playback rate reached at the end of the song
    #[arg(long, default_value_t = 2.0)]
    max_rate: f64,

    /// Curve exponent: 1.0 is linear, lower accelerates earlier
    #[arg(long, default_value_t = 0.5)]
    acceleration: f64,

    /// Generate shell completions and exit
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let config = RateConfig {
        start_rate: cli.start_rate,
        max_rate: cli.max_rate,
        acceleration: cli.acceleration,
    };
    if !config.is_valid() {
        return Err("invalid rate configuration: rates must be positive \
                    and finite, start-rate <= max-rate, acceleration > 0"
            .into());
    }

    player::run(cli.file.as_deref(), config)
}
