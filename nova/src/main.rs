//! Aqua Nova logbook driver.
//!
//! A line-oriented interface over the persistence engine, for scripting
//! and for poking at saves without the browser front end.
//!
//! ```bash
//! cargo run -p nova -- --storage saves --content data
//! ```

mod headless;

use nova_core::{ManagerConfig, SaveManager};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = headless::parse_config_from_args(ManagerConfig::from_env(), &args);
    tracing::info!(
        storage_dir = %config.storage_dir.display(),
        content_root = %config.content_root,
        "starting logbook driver"
    );

    let manager = SaveManager::from_config(config);
    headless::run_headless(manager).await
}

fn print_help() {
    println!("Aqua Nova logbook driver");
    println!();
    println!("USAGE:");
    println!("    nova [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --storage <DIR>      Directory for save slots (default: saves)");
    println!("    --content <ROOT>     Content directory or http(s) base URL (default: data)");
    println!("    --bootstrap <NAME>   Campaign document name (default: campaign.json)");
    println!("    --contacts <NAME>    Contact definitions name (default: contacts.json)");
    println!("    -h, --help           Print help");
    println!();
    println!("ENVIRONMENT:");
    println!("    NOVA_STORAGE_DIR, NOVA_CONTENT_ROOT, NOVA_BOOTSTRAP, NOVA_CONTACTS, NOVA_AUTHOR");
    println!("    RUST_LOG controls log verbosity (default: info)");
    println!();
    println!("Type #help once running for the command list.");
}
