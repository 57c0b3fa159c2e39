use std::future::Future;

use uuid::Uuid;

use crate::core::error::ApiError;
use crate::core::key::CacheKey;
use crate::core::store::CacheStore;

/// A write against the server, described by what it can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateMessage { replies_to: Option<Uuid> },
    DeleteMessage { id: Uuid, replies_to: Option<Uuid> },
    /// Adding or removing a reaction.
    React { message_id: Uuid },
    /// Creating or trying an achievement; `traq_id` is the acting user when known.
    Achieve { traq_id: Option<String> },
    UpdateUserInfo,
}

/// A set of cache keys touched by a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Key(CacheKey),
    /// Every message list, filtered or not.
    MessageLists,
    /// Every achievements list.
    Achievements,
}

impl Target {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            Target::Key(target) => target == key,
            Target::MessageLists => key.is_message_list(),
            Target::Achievements => key.is_achievements(),
        }
    }
}

impl Mutation {
    /// Keys to mark stale after the mutation succeeds.
    ///
    /// The unfiltered list is always named explicitly. Filtered lists are covered
    /// by [`Target::MessageLists`] since a post or reaction shows up in any of them.
    pub fn targets(&self) -> Vec<Target> {
        match self {
            Mutation::CreateMessage { replies_to } => {
                let mut targets = vec![Target::Key(CacheKey::messages()), Target::MessageLists];
                targets.extend(replies_to.map(|parent| Target::Key(CacheKey::message_detail(parent))));
                targets
            }
            Mutation::DeleteMessage { id, replies_to } => {
                let mut targets = vec![
                    Target::Key(CacheKey::messages()),
                    Target::MessageLists,
                    Target::Key(CacheKey::message_detail(*id)),
                ];
                targets.extend(replies_to.map(|parent| Target::Key(CacheKey::message_detail(parent))));
                targets
            }
            Mutation::React { message_id } => vec![
                Target::Key(CacheKey::message_detail(*message_id)),
                Target::Key(CacheKey::messages()),
                Target::MessageLists,
            ],
            Mutation::Achieve {
                traq_id: Some(traq_id),
            } => vec![
                Target::Key(CacheKey::achievements(Some(traq_id.clone()))),
                Target::Key(CacheKey::achievements(None)),
            ],
            Mutation::Achieve { traq_id: None } => vec![Target::Achievements],
            Mutation::UpdateUserInfo => vec![Target::Key(CacheKey::UserInfo)],
        }
    }
}

/// Maps successful mutations onto cache invalidations.
#[derive(Clone)]
pub struct Invalidator {
    store: CacheStore,
}

impl Invalidator {
    pub fn new(store: CacheStore) -> Self {
        Invalidator { store }
    }

    /// Mark every key the mutation touches stale. Refetching waits for the next read.
    pub fn invalidate(&self, mutation: &Mutation) -> usize {
        let targets = mutation.targets();
        let count = self
            .store
            .invalidate_where(|key| targets.iter().any(|t| t.matches(key)));
        log::info!("{mutation:?} invalidated {count} cache keys");
        count
    }

    /// Run a write and invalidate only once it has succeeded.
    pub async fn run<T, F>(&self, mutation: Mutation, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let result = call.await;
        match &result {
            Ok(_) => {
                self.invalidate(&mutation);
            }
            Err(e) => log::warn!("{mutation:?} failed, cache left untouched: {e}"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::MessageFilter;

    fn seeded(keys: &[CacheKey]) -> CacheStore {
        let store = CacheStore::new();
        for key in keys {
            store.put(key, 0, Vec::new()).unwrap();
        }
        store
    }

    fn stale(store: &CacheStore, key: &CacheKey) -> bool {
        store.get(key).is_some_and(|e| e.is_invalidated())
    }

    #[test]
    fn reaction_marks_detail_and_lists() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let by_alice = CacheKey::messages_by(MessageFilter::by_user("alice"));
        let store = seeded(&[
            CacheKey::messages(),
            by_alice.clone(),
            CacheKey::message_detail(id),
            CacheKey::message_detail(other),
            CacheKey::UserInfo,
        ]);

        Invalidator::new(store.clone()).invalidate(&Mutation::React { message_id: id });

        assert!(stale(&store, &CacheKey::messages()));
        assert!(stale(&store, &by_alice));
        assert!(stale(&store, &CacheKey::message_detail(id)));
        assert!(!stale(&store, &CacheKey::message_detail(other)));
        assert!(!stale(&store, &CacheKey::UserInfo));
    }

    #[test]
    fn reply_marks_parent_detail() {
        let parent = Uuid::new_v4();
        let store = seeded(&[CacheKey::messages(), CacheKey::message_detail(parent)]);
        Invalidator::new(store.clone()).invalidate(&Mutation::CreateMessage {
            replies_to: Some(parent),
        });
        assert!(stale(&store, &CacheKey::messages()));
        assert!(stale(&store, &CacheKey::message_detail(parent)));
    }

    #[test]
    fn achieve_for_known_user_marks_their_list() {
        let alice = CacheKey::achievements(Some("alice".into()));
        let bob = CacheKey::achievements(Some("bob".into()));
        let store = seeded(&[alice.clone(), bob.clone(), CacheKey::achievements(None)]);

        Invalidator::new(store.clone()).invalidate(&Mutation::Achieve {
            traq_id: Some("alice".into()),
        });
        assert!(stale(&store, &alice));
        assert!(stale(&store, &CacheKey::achievements(None)));
        assert!(!stale(&store, &bob));
    }

    #[test]
    fn achieve_for_unknown_user_marks_every_achievements_key() {
        let bob = CacheKey::achievements(Some("bob".into()));
        let store = seeded(&[bob.clone(), CacheKey::messages()]);
        Invalidator::new(store.clone()).invalidate(&Mutation::Achieve { traq_id: None });
        assert!(stale(&store, &bob));
        assert!(!stale(&store, &CacheKey::messages()));
    }

    #[test]
    fn profile_update_marks_user_info_only() {
        let store = seeded(&[CacheKey::UserInfo, CacheKey::messages()]);
        let count = Invalidator::new(store.clone()).invalidate(&Mutation::UpdateUserInfo);
        assert_eq!(count, 1);
        assert!(stale(&store, &CacheKey::UserInfo));
    }

    #[tokio::test]
    async fn failed_mutation_invalidates_nothing() {
        let store = seeded(&[CacheKey::messages()]);
        let invalidator = Invalidator::new(store.clone());

        let result: Result<(), ApiError> = invalidator
            .run(Mutation::CreateMessage { replies_to: None }, async {
                Err(ApiError::from_status(500, "Failed to create message"))
            })
            .await;

        assert!(result.is_err());
        assert!(!stale(&store, &CacheKey::messages()));
    }

    #[tokio::test]
    async fn successful_mutation_invalidates_after_response() {
        let store = seeded(&[CacheKey::messages()]);
        let invalidator = Invalidator::new(store.clone());
        let probe = store.clone();

        let value = invalidator
            .run(Mutation::CreateMessage { replies_to: None }, async move {
                // Not yet invalidated while the write is outstanding.
                assert!(!stale(&probe, &CacheKey::messages()));
                Ok(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert!(stale(&store, &CacheKey::messages()));
    }
}
