use std::sync::Arc;

use anyhow::Context;

use acceptd::{
    ServerConfig, Shutdown, StdoutObserver, Supervisor, install_signal_handlers, logging,
};

fn main() -> anyhow::Result<()> {
    logging::init().context("failed to install log subscriber")?;

    let config = ServerConfig::default();
    let shutdown = Shutdown::new();
    install_signal_handlers(&shutdown)?;

    let supervisor = Supervisor::bind(config, Arc::new(StdoutObserver), shutdown)
        .context("listener setup failed")?;
    supervisor.run()?;
    Ok(())
}
