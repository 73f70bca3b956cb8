pub mod app;
pub mod audio;
pub mod browser;
pub mod rate;
pub mod session;
pub mod ui;

use std::error::Error;

use rate::RateConfig;

pub fn run(file: Option<&str>, config: RateConfig) -> Result<(), Box<dyn Error>> {
    app::run(file, config)
}
