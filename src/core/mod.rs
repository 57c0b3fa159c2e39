pub mod api;
pub mod error;
pub mod invalidation;
pub mod key;
pub mod keyring;
pub mod mime;
pub mod models;
pub mod pagination;
pub mod store;
pub mod timeline;
pub mod visibility;

pub use api::{HttpClient, MessagesQuery, TimelineApi};
pub use error::{ApiError, CacheError, ErrorKind};
pub use key::{CacheKey, Flag, MessageFilter};
pub use pagination::{FetchOutcome, InfiniteQuery, PageSource, PageState, ResourceQuery};
pub use store::CacheStore;
pub use timeline::Timeline;
