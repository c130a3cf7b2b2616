use chrono::{Duration, Utc};
use clap::Parser;
use lib_listings::{ListingSession, LogSink, Presence, Snapshot, StreamConfig};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Reports per-minute listing rates from a live feed", long_about = None)]
struct Args {
    /// Feed endpoint
    #[clap(short, long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// Report interval in minutes
    #[clap(short, long, default_value_t = 1)]
    report_interval_minutes: u64,
}

#[derive(Default)]
struct Stats {
    seen: HashSet<String>,
    global_timestamps: VecDeque<chrono::DateTime<Utc>>,
    location_timestamps: HashMap<String, VecDeque<chrono::DateTime<Utc>>>,
}

impl Stats {
    fn record(&mut self, snapshot: &Snapshot) {
        let now = Utc::now();
        for listing in snapshot.iter() {
            if !self.seen.insert(listing.id.clone()) {
                continue;
            }
            self.global_timestamps.push_back(now);
            let location = listing.location.clone().unwrap_or_else(|| "unknown".to_string());
            self.location_timestamps.entry(location).or_default().push_back(now);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let args = Args::parse();

    let config = StreamConfig::for_endpoint(&args.url)?;
    let session = ListingSession::start(config, Arc::new(LogSink), Presence::new(false))?;

    let stats = Arc::new(Mutex::new(Stats::default()));
    let recorder = Arc::clone(&stats);
    session.subscribe(move |snapshot: &Snapshot| -> anyhow::Result<()> {
        recorder.lock().unwrap_or_else(PoisonError::into_inner).record(snapshot);
        Ok(())
    });

    // Reporter
    let stats_reporter = Arc::clone(&stats);
    let ingest = Arc::clone(session.stats());
    let report_interval_seconds = args.report_interval_minutes * 60;
    let reporter = tokio::spawn(async move {
        loop {
            sleep(std::time::Duration::from_secs(report_interval_seconds)).await;
            let one_minute_ago = Utc::now() - Duration::minutes(1);

            let mut data = stats_reporter.lock().unwrap_or_else(PoisonError::into_inner);

            while data.global_timestamps.front().is_some_and(|&t| t < one_minute_ago) {
                data.global_timestamps.pop_front();
            }
            let global_rate = data.global_timestamps.len();

            let mut rates: Vec<(String, usize)> = Vec::new();
            for (location, dq) in data.location_timestamps.iter_mut() {
                while dq.front().is_some_and(|&t| t < one_minute_ago) {
                    dq.pop_front();
                }
                if !dq.is_empty() {
                    rates.push((location.clone(), dq.len()));
                }
            }
            rates.sort_by(|a, b| b.1.cmp(&a.1));

            let report = rates
                .iter()
                .map(|(l, r)| format!("{}: {}/min", l, r))
                .collect::<Vec<_>>()
                .join(", ");

            println!("\n----- 1-Minute Summary -----");
            println!("New listings: {}/min", global_rate);
            println!("Locations: {}", if report.is_empty() { "No data" } else { &report });
            println!(
                "Totals: connections={} frames={} rejected={} added={}",
                ingest.connections(),
                ingest.frames(),
                ingest.rejected(),
                ingest.added()
            );
            println!("----------------------------\n");
        }
    });

    println!("Watching {}. Press Ctrl+C to stop.", args.url);
    tokio::signal::ctrl_c().await?;

    reporter.abort();
    session.shutdown().await;
    Ok(())
}
