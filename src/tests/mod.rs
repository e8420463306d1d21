//! Integration tests for the logvault CLI binary
use assert_cmd::Command;
use predicates::str::contains;

/// A command with its own database file and pinned pipeline settings, so
/// tests neither share state nor inherit stray environment values.
fn logvault_cmd(test_name: &str) -> Command {
    let db_url = format!(
        "sqlite://{}/logvault-test-{}-{}.db",
        std::env::temp_dir().display(),
        std::process::id(),
        test_name
    );
    let mut cmd = Command::cargo_bin("logvault").unwrap();
    cmd.env("LOGVAULT_DB_URL", db_url)
        .env("LOGVAULT_BATCH_SIZE", "50")
        .env("LOGVAULT_FLUSH_INTERVAL_SECS", "0.1")
        .env("LOGVAULT_MAX_RETRIES", "3")
        .env("LOGVAULT_RETRY_BASE_DELAY_SECS", "0.01")
        .env("LOGVAULT_RETRY_MAX_DELAY_SECS", "0.1")
        .env("LOGVAULT_LOG_LEVEL", "logvault=info");
    cmd
}

#[test]
fn migrate_reports_applied() {
    let mut cmd = logvault_cmd("migrate");
    cmd.arg("migrate");
    cmd.assert()
        .success()
        .stdout(contains("All pending migrations applied."));
}

#[test]
fn list_migrations_shows_status() {
    let mut cmd = logvault_cmd("list");
    cmd.arg("list-migrations");
    cmd.assert()
        .success()
        .stdout(contains("Applied migrations"));
}

#[test]
fn schema_lists_application_logs_table() {
    let mut cmd = logvault_cmd("schema");
    cmd.arg("schema");
    cmd.assert()
        .success()
        .stdout(contains("application_logs"));
}

#[test]
fn start_ingests_stdin_until_eof() {
    let mut cmd = logvault_cmd("start");
    cmd.arg("start")
        .write_stdin("INFO hello from the pipeline\n");
    cmd.assert()
        .success()
        .stdout(contains("hello from the pipeline"));
}
