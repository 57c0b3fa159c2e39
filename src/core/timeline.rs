use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{Config, StaleTimes};
use crate::core::api::{MessagesQuery, TimelineApi};
use crate::core::error::ApiError;
use crate::core::invalidation::{Invalidator, Mutation};
use crate::core::key::{CacheKey, Flag, MessageFilter};
use crate::core::models::{
    AchieveOutcome, Achievement, ImageUrl, Message, MessageDetail, NewMessage, Reactions,
    UserInfo, UserInfoPatch,
};
use crate::core::pagination::{
    flatten, InfiniteQuery, PageRequest, PageSource, ResourceQuery, ResourceSource,
};
use crate::core::store::CacheStore;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

pub struct MessagesSource {
    api: Arc<dyn TimelineApi>,
    filter: MessageFilter,
}

#[async_trait]
impl PageSource for MessagesSource {
    type Item = Message;

    fn cache_key(&self) -> CacheKey {
        CacheKey::messages_by(self.filter.clone())
    }

    async fn fetch_page(&self, request: PageRequest) -> Result<Vec<Message>, ApiError> {
        let query = MessagesQuery {
            limit: request.limit,
            offset: request.offset,
            filter: self.filter.clone(),
        };
        self.api.get_messages(&query).await
    }
}

/// Achievements come back in one response.
pub struct AchievementsSource {
    api: Arc<dyn TimelineApi>,
    traq_id: Option<String>,
}

#[async_trait]
impl PageSource for AchievementsSource {
    type Item = Achievement;

    fn cache_key(&self) -> CacheKey {
        CacheKey::achievements(self.traq_id.clone())
    }

    fn single_page(&self) -> bool {
        true
    }

    async fn fetch_page(&self, _request: PageRequest) -> Result<Vec<Achievement>, ApiError> {
        self.api.get_achievements(self.traq_id.as_deref()).await
    }
}

pub struct MessageDetailSource {
    api: Arc<dyn TimelineApi>,
    id: Uuid,
}

#[async_trait]
impl ResourceSource for MessageDetailSource {
    type Item = MessageDetail;

    fn cache_key(&self) -> CacheKey {
        CacheKey::message_detail(self.id)
    }

    async fn fetch(&self) -> Result<MessageDetail, ApiError> {
        self.api.get_message(self.id).await
    }
}

pub struct UserInfoSource {
    api: Arc<dyn TimelineApi>,
}

#[async_trait]
impl ResourceSource for UserInfoSource {
    type Item = UserInfo;

    fn cache_key(&self) -> CacheKey {
        CacheKey::UserInfo
    }

    async fn fetch(&self) -> Result<UserInfo, ApiError> {
        self.api.get_me().await
    }
}

pub struct ImageSource {
    api: Arc<dyn TimelineApi>,
    id: Uuid,
}

#[async_trait]
impl ResourceSource for ImageSource {
    type Item = ImageUrl;

    fn cache_key(&self) -> CacheKey {
        CacheKey::Image(self.id)
    }

    async fn fetch(&self) -> Result<ImageUrl, ApiError> {
        self.api.get_image(self.id).await
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Entry point for consumers: builds queries over one shared cache and runs
/// writes through the invalidation rules.
#[derive(Clone)]
pub struct Timeline {
    store: CacheStore,
    api: Arc<dyn TimelineApi>,
    invalidator: Invalidator,
    page_size: usize,
    stale: StaleTimes,
}

impl Timeline {
    pub fn new(api: Arc<dyn TimelineApi>, page_size: usize, stale: StaleTimes) -> Self {
        Self::with_store(CacheStore::new(), api, page_size, stale)
    }

    pub fn from_config(api: Arc<dyn TimelineApi>, config: &Config) -> Self {
        Self::new(api, config.page_size, config.stale)
    }

    pub fn with_store(
        store: CacheStore,
        api: Arc<dyn TimelineApi>,
        page_size: usize,
        stale: StaleTimes,
    ) -> Self {
        Timeline {
            invalidator: Invalidator::new(store.clone()),
            store,
            api,
            page_size,
            stale,
        }
    }

    /// Same cache, different transport. Cached data from the old session is dropped.
    pub fn with_api(&self, api: Arc<dyn TimelineApi>) -> Self {
        self.store.clear();
        Self::with_store(self.store.clone(), api, self.page_size, self.stale)
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    // -- Queries --

    pub fn messages(&self, filter: MessageFilter) -> InfiniteQuery<MessagesSource> {
        let source = MessagesSource {
            api: Arc::clone(&self.api),
            filter,
        };
        let stale_after = self.stale.for_key(&source.cache_key());
        InfiniteQuery::new(self.store.clone(), source, self.page_size, stale_after)
    }

    pub fn user_messages(
        &self,
        traq_id: impl Into<String>,
        include_replies: impl Into<Flag>,
    ) -> InfiniteQuery<MessagesSource> {
        self.messages(MessageFilter::by_user(traq_id).include_replies(include_replies))
    }

    pub fn achievements(&self, traq_id: Option<String>) -> InfiniteQuery<AchievementsSource> {
        let source = AchievementsSource {
            api: Arc::clone(&self.api),
            traq_id,
        };
        let stale_after = self.stale.for_key(&source.cache_key());
        InfiniteQuery::new(self.store.clone(), source, self.page_size, stale_after)
    }

    pub fn message_detail(&self, id: Uuid) -> ResourceQuery<MessageDetailSource> {
        let source = MessageDetailSource {
            api: Arc::clone(&self.api),
            id,
        };
        ResourceQuery::new(self.store.clone(), source, self.stale.message_detail)
    }

    pub fn user_info(&self) -> ResourceQuery<UserInfoSource> {
        let source = UserInfoSource {
            api: Arc::clone(&self.api),
        };
        ResourceQuery::new(self.store.clone(), source, self.stale.user_info)
    }

    pub fn image(&self, id: Uuid) -> ResourceQuery<ImageSource> {
        let source = ImageSource {
            api: Arc::clone(&self.api),
            id,
        };
        ResourceQuery::new(self.store.clone(), source, self.stale.image)
    }

    /// The signed-in user, if their profile is cached.
    pub fn acting_user(&self) -> Option<String> {
        let entry = self.store.get(&CacheKey::UserInfo)?;
        flatten::<UserInfo>(entry.pages())
            .into_iter()
            .next()
            .map(|user| user.traq_id)
    }

    // -- Mutations --

    /// Post a message or reply. Empty posts are rejected without a request.
    pub async fn post_message(&self, message: NewMessage) -> Result<MessageDetail, ApiError> {
        message.validate()?;
        let mutation = Mutation::CreateMessage {
            replies_to: message.replies_to,
        };
        self.invalidator
            .run(mutation, self.api.create_message(message))
            .await
    }

    pub async fn delete_message(&self, id: Uuid, replies_to: Option<Uuid>) -> Result<(), ApiError> {
        self.invalidator
            .run(
                Mutation::DeleteMessage { id, replies_to },
                self.api.delete_message(id),
            )
            .await
    }

    pub async fn add_reaction(&self, id: Uuid) -> Result<Reactions, ApiError> {
        self.invalidator
            .run(Mutation::React { message_id: id }, self.api.add_reaction(id))
            .await
    }

    pub async fn remove_reaction(&self, id: Uuid) -> Result<Reactions, ApiError> {
        self.invalidator
            .run(Mutation::React { message_id: id }, self.api.remove_reaction(id))
            .await
    }

    /// Add the reaction if absent, remove it if present.
    pub async fn toggle_reaction(&self, id: Uuid, reacted: bool) -> Result<Reactions, ApiError> {
        if reacted {
            self.remove_reaction(id).await
        } else {
            self.add_reaction(id).await
        }
    }

    pub async fn create_achievement(&self, name: &str) -> Result<AchieveOutcome, ApiError> {
        let mutation = Mutation::Achieve {
            traq_id: self.acting_user(),
        };
        self.invalidator
            .run(mutation, self.api.create_achievement(name))
            .await
    }

    pub async fn try_achieve(&self, id: &str) -> Result<AchieveOutcome, ApiError> {
        let mutation = Mutation::Achieve {
            traq_id: self.acting_user(),
        };
        self.invalidator.run(mutation, self.api.try_achieve(id)).await
    }

    pub async fn update_user_info(&self, patch: UserInfoPatch) -> Result<UserInfo, ApiError> {
        self.invalidator
            .run(Mutation::UpdateUserInfo, self.api.update_me(&patch))
            .await
    }
}
