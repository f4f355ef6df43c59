//! Startup wiring: configuration, credential, client, then the interactive session.

use anyhow::{Context, Result};
use log::info;
use tokio::io::BufReader;

use crate::completion::CompletionClient;
use crate::config::{Config, ConfigOverrides};
use crate::credential::load_credential;
use crate::palm::{ModelDescriptor, PalmService};
use crate::repl::{Repl, SessionEnd};
use crate::runtime::Runtime;

/// Loads everything once, then talks to the user over stdin/stdout.
/// Startup failures abort before the first prompt.
pub async fn run<R: Runtime>(runtime: R, overrides: ConfigOverrides) -> Result<SessionEnd> {
    let config = Config::load(&runtime, overrides).context("Invalid configuration")?;
    let credential = load_credential(&runtime, &config.credential_path)?;

    let service = PalmService::new(&credential, &config.endpoint)?;
    let client = CompletionClient::new(service, config.retry.clone());
    let repl = Repl::new(client)
        .with_model(config.model.map(ModelDescriptor::named))
        .with_temperature(config.temperature);

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let end = repl.run(&mut stdin, &mut stdout).await?;

    info!("Session ended: {:?}", end);
    Ok(end)
}
