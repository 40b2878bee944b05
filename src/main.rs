use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use site_scraper::export;
use site_scraper::{ScrapeCommand, Scraper, StatusTracker};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ScrapeCommand::parse();
    let request = args.to_request();

    let mut scraper = Scraper::new(&request, &args.data_dir)?;
    let project_id = scraper.project_id().to_string();
    println!("📁 Project id: {}", project_id.blue());

    let tracker = StatusTracker::new();
    tracker.track(&project_id, scraper.project_handle());

    // First Ctrl-C cancels the scrape gracefully; the project is persisted
    // as failed with whatever was already written.
    let cancel = scraper.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("🛑 Cancellation requested, finishing in-flight work...");
            cancel.cancel();
        }
    });

    let outcome = scraper.run().await;
    tracker.finish(&project_id);

    if let Some(report) = tracker.report(&project_id) {
        println!(
            "📊 {} pages downloaded, {} total, {} errors",
            report.pages_downloaded,
            report.total_pages,
            report.errors.len()
        );
        for error in &report.errors {
            eprintln!("  ⚠️  {}", error);
        }
    }
    outcome?;

    if args.zip {
        let project_dir = args.data_dir.join(&project_id);
        let archive_path = args.data_dir.join(format!("{project_id}.zip"));
        export::export_zip(&project_dir, &archive_path)?;
        println!("🗜️  Archive written to {:?}", archive_path);
    }

    println!("✅ Project stored under {:?}", args.data_dir.join(&project_id));
    Ok(())
}
