use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use herp_climate_service::observations::{
    aggregate_by_month, FetchEvent, ObservationCache, ObservationFetcher,
};
use herp_climate_service::services::report_service::MONTH_LABELS;

#[derive(Parser)]
#[command(name = "inat-monthly")]
#[command(about = "Fetch iNaturalist observations for a species and print monthly counts", long_about = None)]
struct Cli {
    /// Scientific name, e.g. "Gekko gecko"
    species: String,

    /// Observations API endpoint
    #[arg(long, env, default_value = "https://api.inaturalist.org/v1/observations")]
    inat_api_url: String,

    /// Records requested per page
    #[arg(long, env = "INAT_PAGE_SIZE", default_value = "200")]
    page_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let fetcher = ObservationFetcher::new(cli.inat_api_url, ObservationCache::new())
        .with_page_size(cli.page_size);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Fetching observations for {}...", cli.species));

    let mut outcome = None;
    fetcher
        .fetch_with_progress(&cli.species, true, |event| match event {
            FetchEvent::Page(page) => pb.set_message(format!("Fetched page {page}")),
            terminal => outcome = Some(terminal),
        })
        .await;

    let set = match outcome {
        Some(FetchEvent::Finished(set)) | Some(FetchEvent::Cached(set)) => {
            pb.finish_with_message(format!("Fetched {} observations", set.records.len()));
            set
        }
        Some(FetchEvent::Error(message)) => {
            pb.abandon_with_message(format!("Stopped early: {message}"));
            fetcher.fetch_all(&cli.species, false).await
        }
        Some(FetchEvent::Page(_)) | None => {
            pb.abandon_with_message("Fetch ended without a result");
            return Ok(());
        }
    };

    let counts = aggregate_by_month(&set.records);
    let peak = counts.values().copied().max().unwrap_or(0).max(1);

    println!("\n{} (total reported: {})", cli.species, set.total_count);
    for (month, count) in &counts {
        let label = MONTH_LABELS[(*month - 1) as usize];
        let bar = "#".repeat(((*count * 40) / peak) as usize);
        println!("  {label}  {count:>6}  {bar}");
    }

    Ok(())
}
