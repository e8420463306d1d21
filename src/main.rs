use logvault::{cli, database, env};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = env::get_config();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let pool = database::initialize_database(&config.database_url)
        .await
        .expect("Failed to initialize database");

    cli::parse_cli_commands(pool, config).await;
}
