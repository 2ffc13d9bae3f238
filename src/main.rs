use color_eyre::eyre::{Result, WrapErr};
use reqprinter::{RequestPrinter, Settings, bootstrap};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Diagnostics go to stderr; stdout carries only request records
    tracing_subscriber::fmt()
        .with_env_filter("reqprinter=info")
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::default();

    bootstrap::run(settings, RequestPrinter::stdout())
        .await
        .wrap_err("Request printer stopped")?;

    Ok(())
}
