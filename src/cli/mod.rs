pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::EntityKind;

#[derive(Parser)]
#[command(name = "placefeed")]
#[command(about = "Paginated place, post, product and video feeds", long_about = None)]
pub struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load places, posts, products, videos, stories, likes and comments from JSON
    Import {
        /// Path to the seed file
        path: PathBuf,
    },
    /// Page through a single-kind feed
    Feed {
        /// places, posts or products
        kind: EntityKind,

        /// Number of pages to load
        #[arg(short, long, default_value_t = 1)]
        pages: usize,

        /// Only entities owned by --user
        #[arg(long)]
        mine: bool,

        /// Show like and comment counts
        #[arg(short, long)]
        counts: bool,

        /// Signed-in user id
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Print one page of the merged video feed
    Videos {
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Page size (defaults to feed.video_page_size)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Continue from a token printed by a previous page (cursor mode)
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Print like and comment counts for entity ids
    Counts {
        kind: EntityKind,

        #[arg(required = true)]
        ids: Vec<String>,

        /// Signed-in user id
        #[arg(short, long)]
        user: Option<String>,
    },
}
