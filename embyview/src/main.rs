use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::{debug, info, warn};

use embyview_core::{
    bootstrap::{init_services, load_config, services::build_client, Services},
    images::ImageResolver,
    logging,
    paging::{AggregateLoadState, ItemFilter, PagingEvent, VisibleRange},
    playback::{playback_url, PlaybackRequest},
    DisplayItem,
};

#[derive(Parser, Debug)]
#[command(name = "embyview")]
#[command(about = "Browse and search an Emby/Jellyfin library", long_about = None)]
struct Args {
    /// Config file (defaults to $EMBYVIEW_CONFIG_PATH, then ./config.yaml)
    #[arg(long, short, env = "EMBYVIEW_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the items below a container, loading pages as the listing scrolls
    Browse {
        /// Container id; the whole library when omitted
        #[arg(long)]
        parent: Option<String>,

        #[command(flatten)]
        listing: ListingArgs,
    },
    /// List the items matching a search term
    Search {
        term: String,

        #[command(flatten)]
        listing: ListingArgs,
    },
    /// List the top-level libraries
    Libraries,
    /// Log in and print the token and user id for the config file
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "EMBYVIEW_PASSWORD")]
        password: String,
    },
    /// Print a direct-stream URL for an item
    PlayUrl {
        item_id: String,
        #[arg(long)]
        media_source: Option<String>,
        /// Resume offset in seconds
        #[arg(long)]
        start_seconds: Option<u64>,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct ListingArgs {
    /// Stop after this many pages
    #[arg(long, default_value = "5")]
    max_pages: u32,

    /// One JSON object per line instead of a table
    #[arg(long)]
    json: bool,

    /// Download each thumbnail through the image cache and print its size
    #[arg(long)]
    fetch_images: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let config = load_config(args.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!(server = %config.server.url, "embyview starting");

    let run = async {
        match args.command {
            Command::Login { username, password } => {
                let (mut client, _) = build_client(&config)?;
                let (token, user_id) = client.login(&username, &password).await?;
                println!("server:\n  user_id: \"{user_id}\"\n  token: \"{token}\"");
                Ok(())
            }
            command => {
                // 3. Initialize services
                let services = init_services(&config).await?;
                run_command(&services, command).await
            }
        }
    };

    tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    }
}

async fn run_command(services: &Services, command: Command) -> Result<()> {
    match command {
        Command::Browse { parent, listing } => {
            run_listing(services, ItemFilter::container(parent), listing).await
        }
        Command::Search { term, listing } => {
            run_listing(services, ItemFilter::search(term), listing).await
        }
        Command::Libraries => {
            let views = services.client.get_views().await?;
            for view in views.items {
                println!(
                    "{}\t{}\t{}",
                    view.id,
                    view.collection_type.as_deref().unwrap_or("-"),
                    view.name
                );
            }
            Ok(())
        }
        Command::PlayUrl {
            item_id,
            media_source,
            start_seconds,
        } => {
            let Some(token) = services.current_token() else {
                bail!("no access token available");
            };
            let request = PlaybackRequest {
                item_id: &item_id,
                media_source_id: media_source.as_deref(),
                token: &token,
                start_ticks: start_seconds.map(seconds_to_ticks),
            };
            println!("{}", playback_url(&services.api_base(), &request, &services.identity)?);
            Ok(())
        }
        Command::Login { .. } => bail!("login does not use an authenticated session"),
    }
}

/// Print pages as they arrive, scrolling to the end of what is loaded after each one
async fn run_listing(services: &Services, filter: ItemFilter, args: ListingArgs) -> Result<()> {
    let controller = services.repository.controller();
    controller.set_visible_range_hook(|range, loaded| {
        debug!(first = range.first, last = range.last, loaded, "Visible range");
    });

    let mut stream = controller.stream(filter.clone());
    let mut shown = 0usize;
    let mut pages = 0u32;
    let mut retried = false;

    while let Some(event) = stream.next().await {
        match event {
            PagingEvent::PageLoaded { key, page } => {
                for item in &page.data {
                    print_item(shown, item, args.json)?;
                    if args.fetch_images {
                        report_image(services, item).await;
                    }
                    shown += 1;
                }
                pages += 1;

                if page.next_key.is_none() {
                    info!(%filter, items = shown, "End of listing");
                    break;
                }
                if pages >= args.max_pages {
                    info!(%filter, items = shown, key, "Page limit reached");
                    break;
                }
                let last = shown.saturating_sub(1);
                controller.on_visible_range(VisibleRange::new(last, last));
            }
            PagingEvent::LoadStateChanged(states) => match states.aggregate() {
                AggregateLoadState::ErrorInitial(e) => bail!("loading {filter} failed: {e}"),
                AggregateLoadState::ErrorMore(e) => {
                    if retried || !controller.retry() {
                        bail!("loading more of {filter} failed: {e}");
                    }
                    warn!(error = %e, "Loading the next page failed, retrying once");
                    retried = true;
                }
                _ => {}
            },
            PagingEvent::Invalidated => shown = 0,
        }
    }

    controller.close();
    Ok(())
}

fn print_item(index: usize, item: &DisplayItem, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(item)?);
    } else {
        println!("{}", format_item_line(index, item));
    }
    Ok(())
}

fn format_item_line(index: usize, item: &DisplayItem) -> String {
    let minutes = item.duration_ms / 60_000;
    let mut line = format!("{index:>5}  {:<8} {}", item.kind.to_string(), item.title);
    if !item.subtitle.is_empty() {
        line.push_str(&format!(" ({})", item.subtitle));
    }
    if minutes > 0 {
        line.push_str(&format!(" [{minutes} min]"));
    }
    if item.is_pointer_file {
        line.push_str(" -> ");
        line.push_str(&item.pointer_target_path);
    }
    line
}

async fn report_image(services: &Services, item: &DisplayItem) {
    if item.thumbnail_url.is_empty() {
        return;
    }
    match services.images.resolve(&item.thumbnail_url).await {
        Ok(bytes) => println!("       thumbnail: {} bytes", bytes.len()),
        Err(e) => warn!(item_id = %item.id, error = %e, "Thumbnail download failed"),
    }
}

fn seconds_to_ticks(seconds: u64) -> i64 {
    i64::try_from(seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(10_000_000)
}
