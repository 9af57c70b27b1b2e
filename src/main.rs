use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use notefeed::{
    compose_comment, display_order, ApiClient, CommentStore, Config, DraftStore, FeedController,
    LoadOutcome,
};

#[derive(Parser)]
#[command(name = "notefeed")]
#[command(about = "Browse the notes feed and its comments from the terminal", long_about = None)]
struct Cli {
    /// Backend base URL (overrides NOTEFEED_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Items per page (overrides NOTEFEED_PAGE_SIZE)
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Where local comment drafts live (overrides NOTEFEED_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the feed and print one line per item
    Feed {
        #[arg(short, long, default_value_t = 1)]
        pages: u32,

        /// Also fetch each item's comment count
        #[arg(short, long)]
        comments: bool,
    },
    /// Print an item's comments, local drafts first
    Comments {
        #[arg(short, long)]
        item: i64,
    },
    /// Write a comment locally
    Comment {
        #[arg(short, long)]
        item: i64,

        #[arg(short, long)]
        text: String,

        #[arg(short, long)]
        reply_to: Option<i64>,

        #[arg(short, long, default_value = "me")]
        author: String,
    },
    /// Like or unlike a comment; local drafts keep the new state on disk
    LikeComment {
        #[arg(short, long)]
        item: i64,

        #[arg(short, long)]
        comment: i64,
    },
    /// List items with local drafts, or discard an item's drafts
    Drafts {
        /// Discard the drafts of this item
        #[arg(long)]
        clear: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let client = Arc::new(ApiClient::new(&config).context("Failed to build HTTP client")?);

    match cli.command {
        Commands::Feed { pages, comments } => {
            let controller = FeedController::new(client.clone(), config.page_size);
            controller
                .load_first_page()
                .await
                .context("Failed to load the first page")?;

            for _ in 1..pages {
                match controller.load_more().await {
                    Ok(LoadOutcome::Skipped) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "stopping pagination");
                        break;
                    }
                }
            }

            let items = controller.items();
            let counts = if comments {
                let store = CommentStore::new(client.clone(), config.comment_limit);
                let store = &store;
                join_all(items.iter().map(|item| async move {
                    store.get_comments(item.id).await.map(|c| c.len()).ok()
                }))
                .await
            } else {
                vec![None; items.len()]
            };

            for (item, count) in items.iter().zip(counts) {
                let comments = count.map(|n| format!("  [{} comments]", n)).unwrap_or_default();
                println!(
                    "{:>6}  ♥ {:<5} {} by {}{}",
                    item.id, item.like_count, item.title, item.author_name, comments
                );
            }

            let state = controller.snapshot();
            println!(
                "{} items across {} page(s){}",
                items.len(),
                state.current_page(),
                if state.has_more_data() { ", more available" } else { "" }
            );
        }
        Commands::Comments { item } => {
            let drafts = DraftStore::new(&config.data_dir).context("Failed to open draft store")?;
            let local = drafts
                .load(item)
                .with_context(|| format!("Failed to read drafts for item {}", item))?;

            let store = CommentStore::new(client, config.comment_limit);
            if let Err(e) = store.get_comments(item).await {
                eprintln!("Could not load comments from the server: {}", e);
            }

            let merged = store.merge_local_and_server(item, &local);
            let ordered = display_order(&merged);
            println!("{} comments", ordered.len());
            for comment in ordered {
                let indent = if comment.is_reply() { "    ↳ " } else { "" };
                let marker = if comment.is_local() { " (local)" } else { "" };
                println!(
                    "{}{}{}: {}  ♥ {}",
                    indent, comment.author_name, marker, comment.content, comment.like_count
                );
            }
        }
        Commands::Comment {
            item,
            text,
            reply_to,
            author,
        } => {
            let drafts = DraftStore::new(&config.data_dir).context("Failed to open draft store")?;

            let target = match reply_to {
                Some(target_id) => {
                    let local = drafts.load(item)?;
                    let store = CommentStore::new(client, config.comment_limit);
                    if let Err(e) = store.get_comments(item).await {
                        warn!(error = %e, "could not load server comments");
                    }
                    let target = store
                        .merge_local_and_server(item, &local)
                        .into_iter()
                        .find(|c| c.id == target_id)
                        .with_context(|| format!("Comment {} not found on item {}", target_id, item))?;
                    Some(target)
                }
                None => None,
            };

            let comment = compose_comment(&text, &author, target.as_ref())?;
            let id = comment.id;
            drafts
                .push(item, comment)
                .with_context(|| format!("Failed to save comment on item {}", item))?;
            println!("Saved local comment {} on item {}", id, item);
        }
        Commands::LikeComment { item, comment } => {
            let liked = if comment < 0 {
                let drafts = DraftStore::new(&config.data_dir).context("Failed to open draft store")?;
                let mut draft = drafts
                    .load(item)?
                    .into_iter()
                    .find(|c| c.id == comment)
                    .with_context(|| format!("No local comment {} on item {}", comment, item))?;
                draft.toggle_like();
                drafts
                    .update(item, &draft)
                    .with_context(|| format!("Failed to save comment on item {}", item))?;
                draft
            } else {
                let store = CommentStore::new(client, config.comment_limit);
                store
                    .get_comments(item)
                    .await
                    .context("Failed to load comments")?;
                store
                    .toggle_comment_like(item, comment)
                    .with_context(|| format!("Comment {} not found on item {}", comment, item))?
            };
            println!(
                "{} comment {}  ♥ {}",
                if liked.is_liked { "Liked" } else { "Unliked" },
                liked.id,
                liked.like_count
            );
        }
        Commands::Drafts { clear } => {
            let drafts = DraftStore::new(&config.data_dir).context("Failed to open draft store")?;
            if let Some(item) = clear {
                drafts
                    .clear(item)
                    .with_context(|| format!("Failed to clear drafts for item {}", item))?;
                println!("Cleared local comments on item {}", item);
                return Ok(());
            }

            let items = drafts.items_with_drafts().context("Failed to list drafts")?;
            if items.is_empty() {
                println!("No local comments");
            }
            for item in items {
                println!("{:>6}  {} local comment(s)", item, drafts.load(item)?.len());
            }
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env().context("Invalid environment configuration")?;
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url.as_str())?;
    }
    if let Some(page_size) = cli.page_size {
        anyhow::ensure!(page_size > 0, "--page-size must be positive");
        config.page_size = page_size;
    }
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    Ok(config)
}
