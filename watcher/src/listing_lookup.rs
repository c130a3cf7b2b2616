//! # Listing Lookup
//!
//! One-shot detail lookup for a listing reference: phone number, contact, or
//! both. Lookups are single attempts; a missing value is reported, not retried.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;

#[path = "watch_logic/logger.rs"]
mod logger;

use lib_listings::retrieve::DetailsClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Detail {
    Phone,
    Contact,
    All,
}

#[derive(Parser, Debug)]
#[clap(about = "Looks up the phone number and/or contact of a listing", version)]
struct Args {
    /// Listing reference, as carried in the listing id or URL.
    reference: String,

    #[clap(long, value_enum, default_value = "all")]
    detail: Detail,

    #[clap(long, env = "LISTINGS_DETAILS_URL", default_value = "http://127.0.0.1:3000/api")]
    details_url: String,

    #[clap(long, env = "LISTINGS_LOG_DIR", default_value = "./logs")]
    log_dir: PathBuf,

    #[clap(long, env = "LISTINGS_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logger::setup_logging(&args.log_dir, &args.log_level, "listing_lookup")?;

    let client = DetailsClient::new(&args.details_url)?;

    if matches!(args.detail, Detail::Phone | Detail::All) {
        match client.phone_number(&args.reference).await {
            Some(phone) => println!("{} {}", "phone:".bold(), phone),
            None => println!("{} {}", "phone:".bold(), "not available".dimmed()),
        }
    }

    if matches!(args.detail, Detail::Contact | Detail::All) {
        match client.contact(&args.reference).await {
            Some(contact) => {
                println!("{} {}", "name:".bold(), contact.name);
                println!("{} {}", "address:".bold(), contact.address);
            }
            None => println!("{} {}", "contact:".bold(), "not available".dimmed()),
        }
    }

    Ok(())
}
