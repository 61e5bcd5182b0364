//! # placefeed
//!
//! Paginated, reverse-chronological feeds over places, posts and products,
//! plus one merged video feed drawn from four independent sources.
//!
//! ## Architecture
//!
//! ```text
//! Store → Source fetchers → Video merge → Feed pager → UI
//!                                  ↘ Counts aggregator ↗
//! ```
//!
//! - [`store`]: SQLite persistence and typed row queries
//! - [`feed`]: Fetchers, the video merge, the pager and counts
//!
//! ## Quick Start
//!
//! ```bash
//! # Load sample data
//! placefeed import seed.json
//!
//! # First two pages of posts with like/comment counts
//! placefeed feed posts --pages 2 --counts
//!
//! # Merged video feed, second page
//! placefeed videos --offset 6
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Application context and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: Configuration file loading
//! - [`domain`]: Core domain models (FeedItem, UnifiedVideoItem, rows)
//! - [`feed`]: Feed assembly and pagination
//! - [`store`]: Database persistence

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store, the
/// loaded configuration and the viewer session, and builds pagers from them.
pub mod app;

/// Command-line interface.
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/placefeed/config.toml`, supporting:
/// - Page sizes for entity and video feeds
/// - Offset or cursor pagination
/// - Counts batch size
pub mod config;

/// Core domain types.
///
/// - [`FeedItem`](domain::FeedItem): a place, post or product card
/// - [`UnifiedVideoItem`](domain::UnifiedVideoItem): a video from any source
/// - Row DTOs crossing the store boundary
pub mod domain;

/// Feed assembly.
///
/// - Per-kind and per-video-source fetchers
/// - The over-fetching video merge
/// - [`FeedPager`](feed::FeedPager) with dedup, refresh and stale-result discard
/// - Batched like/comment counts
pub mod feed;

/// Data persistence layer.
///
/// Defines the [`Store`](store::Store) trait and its SQLite implementation.
pub mod store;
