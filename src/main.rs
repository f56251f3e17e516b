//! svclinkd - service link daemon.
//!
//! Loads the configuration, builds the command/hook registry, and runs one
//! independent session per configured network. Sessions share no mutable
//! state; each owns its socket, mirror, and UID generator.

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use svclinkd::config::Config;
use svclinkd::dispatch::{CommandEffect, Dispatcher};
use svclinkd::state::Network;
use svclinkd::sync::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "failed to load config");
        e
    })?;

    info!(
        networks = config.networks.len(),
        "starting svclinkd {}",
        env!("CARGO_PKG_VERSION")
    );

    // The registry is built once and shared by reference with every
    // session. Plugins would register their commands and hooks here.
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .command("version", cmd_version)
            .build(),
    );

    let mut sessions = JoinSet::new();
    for net_config in config.networks {
        let dispatcher = Arc::clone(&dispatcher);
        let name = net_config.name.clone();
        let tables = net_config
            .modes
            .build()
            .with_context(|| format!("mode tables for network {name:?}"))?;
        sessions.spawn(async move {
            let result = async {
                let mut session = Session::connect(net_config, tables, dispatcher).await?;
                session.run().await
            }
            .await;
            (name, result)
        });
    }

    let mut failed = false;
    while let Some(joined) = sessions.join_next().await {
        match joined {
            Ok((name, Ok(()))) => info!(network = %name, "session finished"),
            Ok((name, Err(e))) => {
                error!(network = %name, error = %e, "session failed");
                failed = true;
            }
            Err(e) => {
                error!(error = %e, "session task panicked");
                failed = true;
            }
        }
    }

    if failed {
        anyhow::bail!("one or more sessions terminated with errors");
    }
    Ok(())
}

/// Built-in `version` command.
fn cmd_version(
    net: &Network,
    _source: &str,
    _args: &[String],
) -> anyhow::Result<Vec<CommandEffect>> {
    Ok(vec![CommandEffect::Reply(format!(
        "svclinkd-{} on {} [casemapping:{}]",
        env!("CARGO_PKG_VERSION"),
        net.name,
        net.casemapping
    ))])
}
