use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use placefeed::app::AppContext;
use placefeed::cli::{commands, Cli, Commands};
use placefeed::config::Config;
use placefeed::domain::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = AppContext::new(config, cli.db)?;

    match cli.command {
        Commands::Import { path } => {
            commands::import_seed(&ctx, &path)?;
        }
        Commands::Feed {
            kind,
            pages,
            mine,
            counts,
            user,
        } => {
            let ctx = ctx.with_session(session(user));
            commands::show_feed(&ctx, kind, pages, mine, counts).await?;
        }
        Commands::Videos {
            offset,
            limit,
            cursor,
        } => {
            commands::show_videos(&ctx, offset, limit, cursor.as_deref()).await?;
        }
        Commands::Counts { kind, ids, user } => {
            let ctx = ctx.with_session(session(user));
            commands::show_counts(&ctx, kind, &ids).await?;
        }
    }

    Ok(())
}

fn session(user: Option<String>) -> Session {
    match user {
        Some(user_id) => Session::for_user(user_id),
        None => Session::anonymous(),
    }
}
