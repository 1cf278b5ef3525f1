//! Command-line interface for nozomi.
//!
//! Provides commands for resolving tag queries, inspecting posts and
//! downloading their media.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{self, ResolvedConfig};
use crate::core::{content_url, parse_reference, CatalogClient};
use crate::domain::Post;

/// nozomi - Tag-indexed media catalog client
#[derive(Parser, Debug)]
#[command(name = "nozomi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Tag filters shared by the query commands
#[derive(clap::Args, Debug, Clone)]
pub struct TagQuery {
    /// Tag every post must carry (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Tag no post may carry (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "TAG")]
    pub exclude: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the identifiers of every post matching the tags
    Ids {
        #[command(flatten)]
        query: TagQuery,
    },

    /// Fetch and print every post matching the tags
    Posts {
        #[command(flatten)]
        query: TagQuery,

        /// Maximum number of posts to fetch
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print posts as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show a single post
    Post {
        /// Post page URL or numeric identifier
        reference: String,

        /// Print the post as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download every media file of a single post
    Download {
        /// Post page URL or numeric identifier
        reference: String,

        /// Destination directory (defaults to the configured download dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Download the media of every post matching the tags
    Fetch {
        #[command(flatten)]
        query: TagQuery,

        /// Maximum number of posts to download
        #[arg(short, long)]
        limit: Option<usize>,

        /// Destination directory (defaults to the configured download dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Print the record URL for a post identifier
    Path {
        /// Post identifier
        id: u32,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Ids { query } => list_ids(query).await,
            Commands::Posts { query, limit, json } => list_posts(query, limit, json).await,
            Commands::Post { reference, json } => show_post(&reference, json).await,
            Commands::Download { reference, dir } => download_post(&reference, dir).await,
            Commands::Fetch { query, limit, dir } => fetch_posts(query, limit, dir).await,
            Commands::Path { id } => {
                println!("{}", content_url(id));
                Ok(())
            }
            Commands::Config => show_config(),
        }
    }
}

/// Build an HTTP client from the global configuration
fn client() -> Result<(CatalogClient, &'static ResolvedConfig)> {
    let config = config::config()?;
    let client = CatalogClient::from_config(config)?;
    Ok((client, config))
}

/// Accept either a bare identifier or a post page URL
fn parse_post_id(reference: &str) -> Result<u32> {
    let trimmed = reference.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse::<u32>()
            .with_context(|| format!("Post identifier out of range: {}", trimmed));
    }
    Ok(parse_reference(trimmed)?)
}

/// Print matching identifiers, ascending
async fn list_ids(query: TagQuery) -> Result<()> {
    let (client, _) = client()?;
    let ids = client
        .resolver()
        .resolve_sorted(&query.tags, &query.exclude)
        .await?;

    for id in &ids {
        println!("{}", id);
    }
    eprintln!("\n[{} matching posts]", ids.len());
    Ok(())
}

/// Stream matching posts to stdout
async fn list_posts(query: TagQuery, limit: Option<usize>, json: bool) -> Result<()> {
    let (client, _) = client()?;
    let mut rx = client.get_posts(&query.tags, &query.exclude).await?;

    let mut shown = 0usize;
    while let Some(post) = rx.recv().await {
        print_post(&post?, json)?;
        shown += 1;
        if limit.is_some_and(|limit| shown >= limit) {
            break;
        }
    }

    eprintln!("\n[{} posts shown]", shown);
    Ok(())
}

/// Show one post
async fn show_post(reference: &str, json: bool) -> Result<()> {
    let id = parse_post_id(reference)?;
    let (client, _) = client()?;
    let post = client.get_post(id).await?;

    if json {
        print_post(&post, true)
    } else {
        print_post_details(&post);
        Ok(())
    }
}

/// Download one post's media
async fn download_post(reference: &str, dir: Option<PathBuf>) -> Result<()> {
    let id = parse_post_id(reference)?;
    let (client, config) = client()?;
    let dir = dir.unwrap_or_else(|| config.download_dir.clone());

    let post = client.get_post(id).await?;
    let names = client.download_media(&post, &dir).await?;

    for name in &names {
        println!("{}", dir.join(name).display());
    }
    eprintln!("\n[Saved {} files for post {}]", names.len(), post.postid);
    Ok(())
}

/// Download the media of every matching post
async fn fetch_posts(query: TagQuery, limit: Option<usize>, dir: Option<PathBuf>) -> Result<()> {
    let (client, config) = client()?;
    let dir = dir.unwrap_or_else(|| config.download_dir.clone());
    let mut rx = client.get_posts(&query.tags, &query.exclude).await?;

    let mut posts = 0usize;
    let mut files = 0usize;
    while let Some(post) = rx.recv().await {
        let post = post?;
        match client.download_media(&post, &dir).await {
            Ok(names) => {
                info!(post = post.postid, files = names.len(), "Downloaded post");
                files += names.len();
            }
            Err(e) => {
                warn!(post = post.postid, "Skipping post: {:#}", e);
                continue;
            }
        }

        posts += 1;
        if limit.is_some_and(|limit| posts >= limit) {
            break;
        }
    }

    eprintln!(
        "\n[Saved {} files from {} posts to {}]",
        files,
        posts,
        dir.display()
    );
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("Configuration:");
    println!("  Download dir:    {}", config.download_dir.display());
    println!("  Max concurrency: {}", config.max_concurrent_fetches);
    println!("  Timeout:         {}s", config.timeout_seconds);
    println!("  User agent:      {}", config.user_agent);
    match &config.config_file {
        Some(path) => println!("  Config file:     {}", path.display()),
        None => println!("  Config file:     (none, using defaults)"),
    }
    Ok(())
}

fn print_post(post: &Post, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(post).context("Failed to serialize post")?;
        println!("{}", line);
    } else {
        let artists: Vec<&str> = post.artist.iter().map(|t| t.tag.as_str()).collect();
        println!(
            "{:<10} {:<24} {:>3} media  {}",
            post.postid,
            post.date,
            post.imageurls.len(),
            artists.join(", ")
        );
    }
    Ok(())
}

fn print_post_details(post: &Post) {
    println!("Post: {}", post.postid);
    println!("URL: {}", content_url(post.postid));
    println!("Date: {}", post.date);

    for (label, tags) in [
        ("Artists", &post.artist),
        ("Copyright", &post.copyright),
        ("Characters", &post.character),
        ("General", &post.general),
    ] {
        if !tags.is_empty() {
            let names: Vec<&str> = tags.iter().map(|t| t.tagname_display.as_str()).collect();
            println!("{}: {}", label, names.join(", "));
        }
    }

    if let Some(main) = &post.media {
        println!("Main: {}", main.imageurl);
    }

    println!("\nMedia:");
    for media in &post.imageurls {
        println!(
            "  {} ({}x{}, {})",
            media.imageurl, media.width, media.height, media.media_type
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_post_id() {
        assert_eq!(parse_post_id("4269").unwrap(), 4269);
        assert_eq!(
            parse_post_id("https://nozomi.la/post/26905532.html#x").unwrap(),
            26905532
        );
        assert!(parse_post_id("99999999999").is_err());
        assert!(parse_post_id("https://w.nozomi.la/a/bc/abc.webp").is_err());
    }

    #[test]
    fn test_parse_query_flags() {
        let cli = Cli::try_parse_from([
            "nozomi", "ids", "--tag", "akali", "-t", "sakimichan", "-x", "nudity",
        ])
        .unwrap();

        match cli.command {
            Commands::Ids { query } => {
                assert_eq!(query.tags, vec!["akali", "sakimichan"]);
                assert_eq!(query.exclude, vec!["nudity"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
