use std::fmt;
use std::time::Duration;

use liqi::prelude::*;
use liqi::DEFAULT_ORIGIN;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Configuration from the environment
// ---------------------------------------------------------------------------

struct Settings {
    endpoint: String,
    origin: String,
    account: String,
    password: String,
    random_key: Option<String>,
    client_version: String,
    output_dir: String,
    max_records: Option<usize>,
}

impl Settings {
    /// Reads settings through `var`, so tests can supply their own values.
    fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let required = |name: &str| var(name).ok_or_else(|| format!("{name} is not set"));
        let max_records = match var("LIQI_MAX_RECORDS") {
            Some(raw) => Some(
                raw.parse()
                    .map_err(|e| format!("LIQI_MAX_RECORDS={raw:?}: {e}"))?,
            ),
            None => None,
        };

        Ok(Self {
            endpoint: required("LIQI_ENDPOINT")?,
            origin: var("LIQI_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            account: required("LIQI_ACCOUNT")?,
            password: required("LIQI_PASSWORD")?,
            random_key: var("LIQI_RANDOM_KEY"),
            client_version: var("LIQI_CLIENT_VERSION").unwrap_or_default(),
            output_dir: var("LIQI_OUTPUT_DIR").unwrap_or_else(|| "records".to_string()),
            max_records,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("origin", &self.origin)
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .field("random_key", &self.random_key)
            .field("client_version", &self.client_version)
            .field("output_dir", &self.output_dir)
            .field("max_records", &self.max_records)
            .finish()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load(|name| std::env::var(name).ok())?;
    tracing::info!(endpoint = %settings.endpoint, output = %settings.output_dir, "starting export");

    let session = LobbySessionBuilder::new(
        &settings.endpoint,
        Credentials::new(&settings.account, &settings.password),
    )
    .origin(&settings.origin)
    .login_options(LoginOptions {
        random_key: settings.random_key,
        client_version: settings.client_version,
        ..LoginOptions::default()
    })
    .export_config(ExportConfig {
        max_records: settings.max_records,
        call_timeout: Some(Duration::from_secs(30)),
        ..ExportConfig::default()
    })
    .build();

    match session.export(&JsonDirSink::new(&settings.output_dir)).await? {
        ExportOutcome::Completed { exported, skipped } => {
            tracing::info!(exported, skipped = skipped.len(), "export finished");
            for uuid in skipped {
                eprintln!("skipped {uuid}");
            }
        }
        ExportOutcome::LoginRejected(err) => {
            eprintln!("login rejected by the lobby: {err}");
            std::process::exit(1);
        }
    }
    Ok(())
}
