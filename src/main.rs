use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use marquee::config::Config;
use marquee::feed::{PaginatedGrid, Presentation, Viewport};
use marquee::media::MediaSummary;
use marquee::session::{DiscoverySession, Tab};
use marquee::tmdb::TmdbClient;
use marquee::util::{card_label, sanitize};

/// Get the config directory path (~/.config/marquee/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("marquee"))
}

#[derive(Parser, Debug)]
#[command(name = "marquee", about = "Browse TMDB discovery carousels from the terminal")]
struct Args {
    /// Config file (default: ~/.config/marquee/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured language (e.g. "de-DE")
    #[arg(long)]
    language: Option<String>,

    /// Label width in columns
    #[arg(long, default_value_t = 28)]
    width: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the discover tab and print every carousel in range
    Browse {
        /// movies, tvshows or editorpicks
        #[arg(long, default_value = "movies")]
        tab: Tab,

        /// Viewport height in pixels
        #[arg(long, default_value_t = 900)]
        height: i64,

        /// Scroll offset in pixels before loading
        #[arg(long, default_value_t = 0)]
        scroll: i64,

        /// Jump to a carousel by name (e.g. "Top Rated")
        #[arg(long, conflicts_with = "scroll")]
        category: Option<String>,

        /// Watch provider id to spotlight (e.g. 8 for Netflix)
        #[arg(long)]
        provider: Option<String>,

        /// Genre name to spotlight
        #[arg(long)]
        genre: Option<String>,
    },
    /// Open a "view more" grid by path and page through it
    More {
        /// e.g. /discover/more/category/top_rated/movie
        path: String,

        /// Load cycles to run
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(language) = &args.language {
        config.language = language.clone();
    }

    let api_key = config.api_key();
    if api_key.is_none() {
        tracing::warn!("No API key configured; set TMDB_API_KEY or api_key in the config file");
    }
    let client = TmdbClient::with_timeout(&config.base_url, api_key, config.request_timeout())
        .context("Failed to build HTTP client")?;
    let ctx = config.fetch_context(Arc::new(client));

    match args.command.unwrap_or(Command::Browse {
        tab: Tab::Movies,
        height: 900,
        scroll: 0,
        category: None,
        provider: None,
        genre: None,
    }) {
        Command::Browse {
            tab,
            height,
            scroll,
            category,
            provider,
            genre,
        } => {
            let viewport = Viewport::new(height);
            let mut session = DiscoverySession::new(ctx, viewport, config.session_options());
            session.activate(tab);
            if let Some(id) = &provider {
                session.select_provider(id);
            }
            session.viewport().scroll_to(scroll);
            session.settle().await;

            if let Some(name) = &category {
                if !session.scroll_to_category(name) {
                    anyhow::bail!("No carousel named '{}' on the {} tab", name, tab);
                }
                session.settle().await;
            }

            if let Some(name) = &genre {
                let found = session
                    .genres()
                    .iter()
                    .find(|g| g.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .with_context(|| format!("Unknown genre '{}'", name))?;
                session.select_genre(&found);
                session.settle().await;
            }

            print_browse(&session, args.width);
        }
        Command::More { path, pages } => {
            let mut grid = PaginatedGrid::open_path(&path, ctx)
                .with_context(|| format!("Cannot open '{}'", path))?;
            grid.load_initial();
            grid.settle().await;
            for _ in 1..pages {
                if !grid.load_more() {
                    break;
                }
                grid.settle().await;
            }
            print_grid(&grid, args.width);
        }
    }

    Ok(())
}

fn print_browse(session: &DiscoverySession, width: usize) {
    print_row("Featured", session.featured().presentation(), width);
    if let Some(row) = session.provider_spotlight() {
        print_row(row.name, row.feed.presentation(), width);
    }
    if let Some(row) = session.genre_spotlight() {
        print_row(row.name, row.feed.presentation(), width);
    }
    for row in session.rows() {
        print_row(row.name, row.feed.presentation(), width);
    }
}

fn print_row(name: &str, presentation: Presentation<'_>, width: usize) {
    match presentation {
        Presentation::Hidden => {}
        Presentation::Placeholder => println!("{}\n  ...\n", sanitize(name)),
        Presentation::Failed => println!("{}\n  Unable to load this list\n", sanitize(name)),
        Presentation::Items(items) => {
            println!("{}", sanitize(name));
            print_items(items, width);
            println!();
        }
    }
}

fn print_grid(grid: &PaginatedGrid, width: usize) {
    match grid.presentation() {
        Presentation::Hidden => {}
        Presentation::Placeholder => println!("  ..."),
        Presentation::Failed => println!("Unable to load this list"),
        Presentation::Items(items) => {
            print_items(items, width);
            let more = if grid.has_more() { ", more available" } else { "" };
            println!("\n{} items{}", items.len(), more);
        }
    }
}

fn print_items(items: &[MediaSummary], width: usize) {
    for (i, item) in items.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, card_label(item, width));
    }
}
