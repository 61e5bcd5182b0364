use std::path::Path;

use tracing::debug;

use crate::app::{AppContext, Result};
use crate::domain::{CountTarget, EntityKind, FeedItem, Seed};
use crate::feed::cursor::{self, VideoCursor};
use crate::feed::{CountsMap, CountsView, PaginationMode, SourceStatus};
use crate::store::load_seed;

pub fn import_seed(ctx: &AppContext, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let seed: Seed = serde_json::from_str(&content)?;

    if seed.is_empty() {
        println!("Nothing to import in {}", path.display());
        return Ok(());
    }

    let count = load_seed(ctx.store.as_ref(), &seed)?;
    println!("Imported {} rows from {}", count, path.display());
    Ok(())
}

pub async fn show_feed(
    ctx: &AppContext,
    kind: EntityKind,
    pages: usize,
    mine: bool,
    with_counts: bool,
) -> Result<()> {
    if mine && ctx.session.is_anonymous() {
        eprintln!("--mine needs --user; showing nothing");
    }

    let pager = ctx.entity_pager(kind, mine);
    let aggregator = ctx.counts();
    let mut view = CountsView::new();

    pager.mount().await;
    for page in 1..=pages {
        if with_counts {
            let ids: Vec<String> = pager.items().into_iter().map(|i| i.id).collect();
            if view.sync(&aggregator, &ids, kind).await {
                debug!("Counts rebuilt for {} {}s after page {}", ids.len(), kind, page);
            }
        }
        if page == pages || !pager.has_next_page() {
            break;
        }
        pager.fetch_next_page().await;
    }

    let state = pager.state();
    if let Some(error) = &state.error {
        eprintln!("Failed to load {} feed: {}", kind, error);
    }

    if state.items.is_empty() {
        println!("No {}s", kind);
        return Ok(());
    }

    for item in &state.items {
        if with_counts {
            print_counted(item, view.counts());
        } else {
            print_item(item);
        }
    }

    if state.has_next_page {
        println!("(more available)");
    }
    Ok(())
}

fn print_item(item: &FeedItem) {
    println!(
        "{}  {}  {}",
        item.created_at.format("%Y-%m-%d %H:%M"),
        item.id,
        item.display_title()
    );
    if let Some(media) = item.display_media() {
        println!("  {}", media);
    }
}

fn print_counted(item: &FeedItem, counts: &CountsMap) {
    let entry = counts.get(item.entity_id());
    let heart = if counts.is_liked(item.entity_id()) { "♥" } else { " " };
    println!(
        "{}  {}  {}  [{} likes{}, {} comments]",
        item.created_at.format("%Y-%m-%d %H:%M"),
        item.entity_id(),
        item.display_title(),
        entry.like_count,
        heart,
        entry.comment_count
    );
}

pub async fn show_videos(
    ctx: &AppContext,
    offset: usize,
    limit: Option<usize>,
    token: Option<&str>,
) -> Result<()> {
    let merger = ctx.video_merger();
    let limit = limit.unwrap_or(ctx.config.feed.video_page_size);

    let page = match merger.mode() {
        PaginationMode::Offset => merger.merge_videos(offset, limit).await,
        PaginationMode::Cursor => {
            let position = match token {
                Some(token) => cursor::decode::<VideoCursor>(token)?,
                None => VideoCursor::default(),
            };
            merger.merge_after(&position, limit).await?
        }
    };

    for report in &page.reports {
        if let SourceStatus::Failed { reason } = &report.status {
            eprintln!("  {} videos unavailable: {}", report.source, reason);
        }
    }

    if page.items.is_empty() {
        println!("No videos");
        return Ok(());
    }

    for counted in ctx.counts().annotate(&page.items).await {
        let video = &counted.item;
        println!(
            "{}  [{}] {}  {} likes, {} comments",
            video.created_at.format("%Y-%m-%d %H:%M"),
            video.source,
            video.display_title(),
            counted.counts.like_count,
            counted.counts.comment_count
        );
        println!("  {}", video.video_url);
    }

    if let Some(next) = page.next_cursor {
        println!("Next: --cursor {}", next);
    }
    Ok(())
}

pub async fn show_counts(ctx: &AppContext, kind: EntityKind, ids: &[String]) -> Result<()> {
    let counts = ctx.counts().entity_counts(ids, kind).await;

    let mut seen = std::collections::HashSet::new();
    for id in ids.iter().filter(|id| seen.insert(id.as_str())) {
        let entry = counts.get(id);
        let liked = if counts.is_liked(id) { " (liked)" } else { "" };
        println!(
            "{} {}: {} likes, {} comments{}",
            kind, id, entry.like_count, entry.comment_count, liked
        );
    }
    Ok(())
}
