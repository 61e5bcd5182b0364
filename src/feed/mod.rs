pub mod counts;
pub mod cursor;
pub mod fetchers;
pub mod merge;
pub mod pager;
pub mod source;

pub use counts::{Counted, CountsAggregator, CountsMap, CountsView, EntityCounts};
pub use fetchers::{
    EntitySource, OwnerScope, SourceReport, SourceStatus, StoreVideoFetcher, VideoFetcher,
};
pub use merge::{VideoMerger, VideoPage};
pub use pager::{FeedPager, FeedState};
pub use source::{Page, PageRequest, PageSource, PaginationMode};
