//! CLI command implementations

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use crate::auth::{InMemoryCredentialStore, TokenService};
use crate::file_storage::{MemoryBackend, StorageAdminController};
use crate::http_server::{AppState, HttpServer};
use crate::migrations::{InMemorySchemaTarget, MigrationRunner, USERS_MIGRATIONS};
use crate::observability::{Event, Logger};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config } => serve(&config),
        Command::CheckConfig { config } => {
            let rendered = check_config(&config)?;
            write_json(&rendered)
        }
        Command::SchemaPlan { from, to } => {
            let rendered = schema_plan(from, to)?;
            write_json(&rendered)
        }
    }
}

/// Backend `serve` runs against
pub const STORAGE_BACKEND: &str = "memory";

/// Wire the services over the in-memory store and backend
pub fn build_state(config: &Config) -> CliResult<AppState> {
    let store = Arc::new(InMemoryCredentialStore::new());
    let backend = MemoryBackend::new(config.storage.admin_user.clone());
    let admin = StorageAdminController::new(Arc::new(backend.clone()), Arc::new(backend));

    let tokens = TokenService::new(config.token_config()?, store.clone())
        .map_err(|e| CliError::config_error(e.to_string()))?;

    Ok(AppState::new(
        store,
        admin,
        tokens,
        config.storage.max_upload_bytes,
    ))
}

/// Start the HTTP API and block until it stops
///
/// Accounts and files live in process memory; `storage.endpoint` and the
/// other networked-backend settings are not dialled.
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.severity()?);

    let path = config_path.display().to_string();
    Event::ConfigLoaded.emit(&[
        ("path", &path),
        ("storage_backend", STORAGE_BACKEND),
    ]);

    let state = build_state(&config)?;
    let server = HttpServer::new(config.http.clone(), state);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async { server.start().await }).map_err(|e| {
        let reason = e.to_string();
        Event::ServerFailed.emit(&[("reason", &reason)]);
        CliError::boot_failed(format!("HTTP server failed: {}", reason))
    })
}

/// Validate a config file and return its effective values without secrets
pub fn check_config(config_path: &Path) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    Ok(json!({
        "valid": true,
        "storage_backend": STORAGE_BACKEND,
        "config": config.redacted(),
    }))
}

/// Statements that would move the users schema from `from` to `to`
pub fn schema_plan(from: u32, to: Option<u32>) -> CliResult<Value> {
    let target = InMemorySchemaTarget::new();
    let runner = MigrationRunner::new(USERS_MIGRATIONS, &target);
    let to = to.unwrap_or_else(|| runner.latest_version());

    let steps: Vec<Value> = runner
        .plan(from, to)?
        .into_iter()
        .map(|step| {
            json!({
                "version": step.version,
                "direction": step.direction.to_string(),
                "description": step.description,
                "statement": step.statement,
            })
        })
        .collect();

    Ok(json!({ "from": from, "to": to, "steps": steps }))
}

fn write_json(value: &Value) -> CliResult<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_config(temp_dir: &TempDir) -> std::path::PathBuf {
        let config_path = temp_dir.path().join("homevault.json");
        let config = json!({
            "http": { "port": 9000 },
            "tokens": {
                "access_secret": "a-secret",
                "refresh_secret": "r-secret"
            }
        });
        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    #[test]
    fn test_check_config_reports_effective_values() {
        let temp_dir = TempDir::new().unwrap();
        let rendered = check_config(&create_config(&temp_dir)).unwrap();
        assert_eq!(rendered["valid"], json!(true));
        assert_eq!(rendered["config"]["http"]["port"], json!(9000));
        assert_eq!(rendered["storage_backend"], json!("memory"));
        assert!(!rendered.to_string().contains("a-secret"));
    }

    #[test]
    fn test_check_config_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = check_config(&temp_dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_build_state_registers_accounts() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&create_config(&temp_dir)).unwrap();
        let state = build_state(&config).unwrap();

        let (account, _) = state
            .saga
            .register("alice", "pw", "alice@example.com")
            .unwrap();
        assert!(state.files.list_files(account.id, "", true).unwrap().is_empty());
    }

    #[test]
    fn test_schema_plan_up_and_down() {
        let plan = schema_plan(0, None).unwrap();
        assert_eq!(plan["to"], json!(2));
        assert_eq!(plan["steps"].as_array().unwrap().len(), 2);
        assert_eq!(plan["steps"][0]["direction"], json!("up"));

        let plan = schema_plan(2, Some(1)).unwrap();
        assert_eq!(plan["steps"][0]["version"], json!(2));
        assert_eq!(plan["steps"][0]["direction"], json!("down"));
    }

    #[test]
    fn test_schema_plan_unknown_version() {
        let err = schema_plan(0, Some(9)).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::SchemaError);
    }
}
