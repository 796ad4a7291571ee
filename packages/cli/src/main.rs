#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for market data lookups.
//!
//! ```text
//! realmarket lookup "1600 Pennsylvania Ave NW, Washington, DC" [--json]
//! realmarket cached
//! realmarket evict "1600 Pennsylvania Ave NW, Washington, DC"
//! realmarket tract --state 11 --county 001 --tract 006202
//! realmarket serve
//! ```
//!
//! Configuration comes from the same environment variables as the server.

mod render;

use clap::{Parser, Subcommand};
use realmarket_market::{AppConfig, build_service};

#[derive(Parser)]
#[command(name = "realmarket", about = "Socio-economic market profiles for U.S. addresses")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up the market profile of an address
    Lookup {
        /// Street address
        address: String,
        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached addresses
    Cached,
    /// Remove an address from the cache
    Evict {
        /// Street address
        address: String,
    },
    /// Print a census tract boundary as GeoJSON
    Tract {
        /// 2-digit state FIPS code
        #[arg(long)]
        state: String,
        /// 3-digit county FIPS code
        #[arg(long)]
        county: String,
        /// 6-digit tract code
        #[arg(long)]
        tract: String,
    },
    /// Start the API server
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    if matches!(cli.command, Commands::Serve) {
        // The server uses actix-web's runtime, so it runs in a blocking
        // task to avoid nesting tokio runtimes.
        tokio::task::spawn_blocking(move || {
            actix_web::rt::System::new().block_on(realmarket_server::run_server(config))
        })
        .await??;
        return Ok(());
    }

    let service = build_service(&config)?;

    match cli.command {
        Commands::Lookup { address, json } => {
            let snapshot = service.get_market_data(&address).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", render::summary(&snapshot));
            }
        }
        Commands::Cached => {
            let addresses = service.list_cached_addresses().await?;
            if addresses.is_empty() {
                println!("No cached addresses.");
                return Ok(());
            }
            for address in &addresses {
                println!("{address}");
            }
            println!("\n{} cached address(es)", addresses.len());
        }
        Commands::Evict { address } => {
            let removed = service.delete_cached(&address).await?;
            if removed == 0 {
                println!("No cache entry for {address:?}");
            } else {
                println!("Evicted {address:?}");
            }
        }
        Commands::Tract {
            state,
            county,
            tract,
        } => {
            let collection = service.tract_boundary(&state, &county, &tract).await?;
            println!("{}", serde_json::to_string_pretty(&collection)?);
        }
        Commands::Serve => log::debug!("Serve is handled before the service is built"),
    }

    Ok(())
}
