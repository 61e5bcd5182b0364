pub mod entity;
pub mod item;
pub mod keyset;
pub mod rows;
pub mod session;
pub mod video;

pub use entity::EntityKind;
pub use item::{CountTarget, FeedEntry, FeedItem, FeedPayload, PlaceCard, PostCard, ProductCard};
pub use keyset::Keyset;
pub use rows::{
    CommentRow, InteractionRow, PlaceRow, PostRow, ProductRow, ProductVideoRow, Seed, StoryRow,
    VideoRow,
};
pub use session::Session;
pub use video::{UnifiedVideoItem, VideoSource};
