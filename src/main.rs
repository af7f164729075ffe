use anyhow::Result;
use log::{info, warn};
use std::env;
use std::io::{self, BufRead};

use pwmctl::config::ControllerConfig;
use pwmctl::supervisor::Supervisor;
use pwmctl::{logger, status, transport};

fn main() -> Result<()> {
    logger::init(logger::level_from_env());
    info!("Starting PWM controller");

    let config = match env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {}", path);
            ControllerConfig::load(&path)?
        }
        None => ControllerConfig::default(),
    };
    config.validate()?;

    let transport = transport::open(&config)?;
    let supervisor = Supervisor::start(&config, transport)?;

    if let Some(port) = config.status_port {
        if let Err(e) = status::spawn_status_feed(port, supervisor.state(), config.channel_pins) {
            warn!("Status feed disabled: {}", e);
        }
    }

    supervisor.run(io::stdin().lock().lines());
    supervisor.shutdown()?;
    Ok(())
}
