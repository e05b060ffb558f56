// Entrypoint for the CLI application.
// - Keeps `main` small: load config, obtain a token, hand a drive client
//   to the UI loop.
// - Returns `anyhow::Result` to simplify error handling.

use drivezip_cli::{
    auth::CredentialProvider, config::AppConfig, drive::DriveClient, ui::main_menu,
};

fn main() -> anyhow::Result<()> {
    // Log filtering comes from RUST_LOG; the default keeps interactive
    // output clean while still surfacing degraded folder listings.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // Configuration lives in a JSON file found via `DRIVEZIP_CONFIG` or
    // the per-user config directory. See `config::AppConfig::load`.
    let config = AppConfig::load()?;

    // Authentication is fatal when it fails: without a valid access token
    // there is nothing useful the menu could do.
    let provider = CredentialProvider::new(&config)?;
    let token = provider.access_token()?;
    println!("Authenticated successfully!");

    let drive = DriveClient::new(&config.api_base, &config.upload_base, token)?;

    // Start the interactive menu. This call blocks until the user exits.
    main_menu(&config, &drive)?;
    Ok(())
}
