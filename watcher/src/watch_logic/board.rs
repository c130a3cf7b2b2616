use std::io::Write;

use colored::Colorize;
use lib_listings::{Listing, Snapshot, SnapshotListener};

/// Prints the newest listings every time a snapshot arrives.
pub struct BoardPrinter {
    rows: usize,
}

impl BoardPrinter {
    pub fn new(rows: usize) -> Self {
        Self { rows: rows.max(1) }
    }

    pub fn render(&self, snapshot: &Snapshot) -> String {
        let mut out = format!(
            "{} {} listing(s), newest first\n",
            chrono::Local::now().format("[%H:%M:%S]"),
            snapshot.len()
        );
        if snapshot.is_empty() {
            out.push_str("  (no listings yet)\n");
        }
        for listing in snapshot.iter().take(self.rows) {
            for line in format_listing(listing) {
                out.push_str("  ");
                out.push_str(&line);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

impl SnapshotListener for BoardPrinter {
    fn on_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let board = self.render(snapshot);
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(board.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

/// Card lines for one listing: title, price, place/year, facts. Empty lines are skipped.
pub fn format_listing(listing: &Listing) -> Vec<String> {
    let title = listing.title.clone().unwrap_or_else(|| listing.id.clone());
    let price = match listing.price_eur {
        Some(eur) => format!("{} €", group_thousands(eur)),
        None => "price on request".to_string(),
    };

    let place_year = join_parts([
        listing.location.clone(),
        listing.year.map(|y| format!("EZ {}", y)),
    ]);
    let facts = join_parts([
        listing.km.map(|km| format!("{} km", group_thousands(km))),
        listing.ps.map(|ps| format!("{} PS", ps)),
        listing.transmission.clone(),
        listing.fuel.clone(),
    ]);

    let mut lines = vec![title.bold().to_string(), price.bold().to_string()];
    lines.extend([place_year, facts].into_iter().filter(|l| !l.is_empty()));
    lines
}

fn join_parts<const N: usize>(parts: [Option<String>; N]) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" · ")
}

/// `12345678` -> `12.345.678`.
pub fn group_thousands(n: i32) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if n < 0 {
        grouped.insert(0, '-');
    }
    grouped
}
