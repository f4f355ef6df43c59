use anyhow::Result;
use clap::Parser;
use codepal::config::ConfigOverrides;
use codepal::credential::DEFAULT_CREDENTIAL_FILE;
use std::path::PathBuf;

/// codepal - ask a large language model coding questions from the terminal
///
/// Reads the API key from the first line of ./api_key, then prompts for questions
/// until you type "exit" or "quit".
///
/// If the GOOGLE_API_BASE environment variable is set, it replaces the default
/// service endpoint.
#[derive(Parser, Debug)]
#[command(author, version = env!("CODEPAL_VERSION"), about)]
struct Cli {
    /// File whose first line holds the API key
    #[arg(
        long = "key-file",
        env = "CODEPAL_KEY_FILE",
        value_name = "PATH",
        default_value = DEFAULT_CREDENTIAL_FILE
    )]
    key_file: PathBuf,

    /// Service endpoint (overrides GOOGLE_API_BASE)
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Model to use instead of the first one supporting text generation
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Sampling temperature between 0.0 and 1.0
    #[arg(long, value_name = "FLOAT")]
    temperature: Option<f32>,

    /// Attempts per request, the first one included
    #[arg(long = "max-attempts", value_name = "N")]
    max_attempts: Option<usize>,
}

impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        ConfigOverrides {
            key_file: Some(cli.key_file),
            endpoint: cli.endpoint,
            model: cli.model,
            temperature: cli.temperature,
            max_attempts: cli.max_attempts,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = codepal::runtime::RealRuntime;

    codepal::run(runtime, cli.into()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_no_arguments() {
        let cli = Cli::try_parse_from(["codepal"]).unwrap();
        let overrides = ConfigOverrides::from(cli);
        assert_eq!(overrides.endpoint, None);
        assert_eq!(overrides.model, None);
        assert_eq!(overrides.temperature, None);
        assert_eq!(overrides.max_attempts, None);
    }

    #[test]
    fn test_cli_all_options() {
        let cli = Cli::try_parse_from([
            "codepal",
            "--key-file",
            "/tmp/key",
            "--endpoint",
            "http://localhost:8080",
            "--model",
            "text-bison-001",
            "--temperature",
            "0.4",
            "--max-attempts",
            "5",
        ])
        .unwrap();
        let overrides = ConfigOverrides::from(cli);
        assert_eq!(overrides.key_file, Some(PathBuf::from("/tmp/key")));
        assert_eq!(overrides.endpoint.as_deref(), Some("http://localhost:8080"));
        assert_eq!(overrides.model.as_deref(), Some("text-bison-001"));
        assert_eq!(overrides.temperature, Some(0.4));
        assert_eq!(overrides.max_attempts, Some(5));
    }

    #[test]
    fn test_cli_rejects_positional_arguments() {
        let result = Cli::try_parse_from(["codepal", "write a function"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_non_numeric_temperature() {
        let result = Cli::try_parse_from(["codepal", "--temperature", "warm"]);
        assert!(result.is_err());
    }
}
