use std::future::Future;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::batch::types::WorkItem;
use crate::links;
use crate::market::listing::{DurationClass, ListingTemplate};
use crate::report::{self, BatchReport};
use crate::service::ListingService;

const CREATED_PER_PAGE: usize = 50;
const UPLOAD_FAILURES_PER_PAGE: usize = 20;
const REMOVED_PER_PAGE: usize = 50;
const REMOVE_FAILURES_PER_PAGE: usize = 30;
const MESSAGE_CHARS: usize = 4000;

#[derive(Parser)]
#[command(name = "lzt-batch")]
#[command(about = "Batch upload and removal of marketplace listings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload every gift link found in the input as a listing
    Upload {
        #[arg(long, value_enum)]
        duration: DurationClass,

        /// Price in the listing currency
        #[arg(long)]
        price: u64,

        /// Override the configured upload batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Currency code for this run (e.g. rub, usd)
        #[arg(long)]
        currency: Option<String>,

        /// Item origin for this run (e.g. personal, resale)
        #[arg(long)]
        origin: Option<String>,

        /// Re-run the failed subset up to this many times
        #[arg(long, default_value = "0")]
        retry_rounds: u32,

        /// Read links from a file instead of arguments or stdin
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Free text containing gift links
        text: Vec<String>,
    },

    /// Count own listings per subscription length
    Inventory,

    /// Hand out listings: print their links, then remove them
    Issue {
        #[arg(long, value_enum)]
        duration: DurationClass,

        #[arg(long)]
        count: usize,

        /// Override the configured removal batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Remove listings by id
    Remove {
        #[arg(required = true)]
        item_ids: Vec<u64>,

        #[arg(long)]
        batch_size: Option<usize>,
    },
}

/// Parameters shared by every round of one upload run.
struct UploadRun<'a> {
    price: u64,
    duration: DurationClass,
    batch_size: Option<usize>,
    template: &'a ListingTemplate,
    retry_rounds: u32,
}

pub async fn run(
    command: Command,
    service: &ListingService,
    listing_base: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Command::Upload {
            duration,
            price,
            batch_size,
            currency,
            origin,
            retry_rounds,
            file,
            text,
        } => {
            let input = interruptible(cancel, read_input(file, text)).await?;
            let found = links::extract_links(&input);
            if found.is_empty() {
                bail!("No gift links found in the input");
            }

            let mut template = service.template().clone();
            if let Some(currency) = currency {
                template = template.with_currency(&currency)?;
            }
            if let Some(origin) = origin {
                template = template.with_origin(&origin)?;
            }

            println!("Found {} links, uploading as {}", found.len(), duration);
            let run = UploadRun {
                price,
                duration,
                batch_size,
                template: &template,
                retry_rounds,
            };
            upload_rounds(service, WorkItem::numbered(found), &run, cancel, |report| {
                print_upload(report, listing_base)
            })
            .await;
        }

        Command::Inventory => {
            let inventory = interruptible(cancel, service.inventory()).await?;
            for duration in DurationClass::ALL {
                println!("{}: {}", duration, inventory.count(duration));
            }
            println!("Total: {}", inventory.total());
        }

        Command::Issue {
            duration,
            count,
            batch_size,
        } => {
            if count == 0 {
                bail!("Count must be at least 1");
            }
            let inventory = interruptible(cancel, service.inventory()).await?;
            let selected = inventory.select(duration, count)?;

            let lines: Vec<String> = selected
                .iter()
                .map(|item| {
                    let login = links::with_gift_prefix(item.login.as_deref().unwrap_or_default());
                    let url = report::listing_url(listing_base, &item.item_id.to_string());
                    format!("{} | {}", login, url)
                })
                .collect();
            let issued = format!("Issued {} x {}:\n\n{}", count, duration, lines.join("\n"));
            for part in report::split_message(&issued, MESSAGE_CHARS) {
                println!("{}", part);
            }

            let ids = selected.iter().map(|item| item.item_id.to_string());
            let report = service.remove(WorkItem::numbered(ids), batch_size).await;
            print_remove(&report, listing_base);
        }

        Command::Remove {
            item_ids,
            batch_size,
        } => {
            let ids = item_ids.iter().map(u64::to_string);
            let report = service.remove(WorkItem::numbered(ids), batch_size).await;
            print_remove(&report, listing_base);
        }
    }

    Ok(())
}

/// Upload `items`, then re-run the failed subset up to `retry_rounds` times.
/// Stops early once the run is interrupted. Returns the number of rounds run.
async fn upload_rounds(
    service: &ListingService,
    mut items: Vec<WorkItem>,
    run: &UploadRun<'_>,
    cancel: &CancellationToken,
    mut on_report: impl FnMut(&BatchReport),
) -> u32 {
    let mut round = 0;
    loop {
        let report = service
            .upload(
                items,
                run.price,
                run.duration,
                run.batch_size,
                Some(run.template.clone()),
            )
            .await;
        on_report(&report);

        items = report.failed_items();
        if items.is_empty() || round >= run.retry_rounds || cancel.is_cancelled() {
            return round + 1;
        }
        round += 1;
        println!(
            "\nRetrying {} failed items (round {}/{})",
            items.len(),
            round,
            run.retry_rounds
        );
    }
}

/// Await `future` unless the run is interrupted first.
async fn interruptible<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(anyhow!("Interrupted")),
        result = future => result,
    }
}

async fn read_input(file: Option<PathBuf>, text: Vec<String>) -> Result<String> {
    if let Some(path) = file {
        return tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    if !text.is_empty() {
        return Ok(text.join("\n"));
    }

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read stdin")?;
    Ok(input)
}

fn print_pages(header: &str, lines: &[String], per_page: usize, separator: &str) {
    if lines.is_empty() {
        return;
    }
    println!("\n{}", header);
    for page in report::paginate(lines, per_page, separator) {
        println!("\n{}", page);
    }
}

fn print_upload(report: &BatchReport, listing_base: &str) {
    println!("\n{}", report.upload_summary());

    let created = report.created_listing_lines(listing_base);
    if created.is_empty() {
        println!("\nNo listings were created");
    }
    print_pages(
        &format!("Created ({}):", created.len()),
        &created,
        CREATED_PER_PAGE,
        "\n",
    );
    print_pages(
        "Failed:",
        &report.upload_failure_lines(),
        UPLOAD_FAILURES_PER_PAGE,
        "\n\n",
    );
}

fn print_remove(report: &BatchReport, listing_base: &str) {
    println!("\n{}", report.remove_summary());
    print_pages(
        "Removed:",
        &report.removed_listing_lines(listing_base),
        REMOVED_PER_PAGE,
        "\n",
    );
    print_pages(
        "Failed to remove:",
        &report.remove_failure_lines(listing_base),
        REMOVE_FAILURES_PER_PAGE,
        "\n",
    );
}
