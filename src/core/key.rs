use std::fmt;

use uuid::Uuid;

/// An optional boolean filter that distinguishes "not specified" from "specified false".
///
/// Both the cache key and the query string depend on the difference, so absence is
/// never folded into a default value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Flag {
    #[default]
    Unset,
    Present(bool),
}

impl Flag {
    /// Query-string value, or `None` when the parameter must be omitted.
    pub fn query_value(self) -> Option<&'static str> {
        match self {
            Flag::Unset => None,
            Flag::Present(true) => Some("true"),
            Flag::Present(false) => Some("false"),
        }
    }

    pub fn is_set(self) -> bool {
        matches!(self, Flag::Present(_))
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Flag::Present(value)
    }
}

impl From<Option<bool>> for Flag {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Flag::Unset, Flag::Present)
    }
}

/// Filter for the message list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MessageFilter {
    pub traq_id: Option<String>,
    pub include_replies: Flag,
}

impl MessageFilter {
    /// The unfiltered timeline.
    pub fn all() -> Self {
        MessageFilter::default()
    }

    pub fn by_user(traq_id: impl Into<String>) -> Self {
        MessageFilter {
            traq_id: Some(traq_id.into()),
            include_replies: Flag::Unset,
        }
    }

    pub fn include_replies(mut self, include: impl Into<Flag>) -> Self {
        self.include_replies = include.into();
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.traq_id.is_none() && !self.include_replies.is_set()
    }

    /// Query parameters for the filter; unset fields are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(traq_id) = &self.traq_id {
            pairs.push(("traqId", traq_id.clone()));
        }
        if let Some(value) = self.include_replies.query_value() {
            pairs.push(("includeReplies", value.to_string()));
        }
        pairs
    }
}

/// Which logical collection a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Messages,
    MessageDetail,
    Achievements,
    UserInfo,
    Image,
}

/// Identifies one logical collection in the cache store.
///
/// Keys are plain immutable data and compare structurally, optional fields included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Messages(MessageFilter),
    MessageDetail(Uuid),
    Achievements(Option<String>),
    UserInfo,
    Image(Uuid),
}

impl CacheKey {
    /// Key of the unfiltered message list.
    pub fn messages() -> Self {
        CacheKey::Messages(MessageFilter::all())
    }

    pub fn messages_by(filter: MessageFilter) -> Self {
        CacheKey::Messages(filter)
    }

    pub fn message_detail(id: Uuid) -> Self {
        CacheKey::MessageDetail(id)
    }

    pub fn achievements(traq_id: Option<String>) -> Self {
        CacheKey::Achievements(traq_id)
    }

    pub fn collection(&self) -> Collection {
        match self {
            CacheKey::Messages(_) => Collection::Messages,
            CacheKey::MessageDetail(_) => Collection::MessageDetail,
            CacheKey::Achievements(_) => Collection::Achievements,
            CacheKey::UserInfo => Collection::UserInfo,
            CacheKey::Image(_) => Collection::Image,
        }
    }

    pub fn is_message_list(&self) -> bool {
        matches!(self, CacheKey::Messages(_))
    }

    pub fn is_achievements(&self) -> bool {
        matches!(self, CacheKey::Achievements(_))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Messages(filter) => {
                write!(f, "messages")?;
                let pairs = filter.query_pairs();
                if !pairs.is_empty() {
                    let query: Vec<String> =
                        pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    write!(f, "?{}", query.join("&"))?;
                }
                Ok(())
            }
            CacheKey::MessageDetail(id) => write!(f, "messages/{id}"),
            CacheKey::Achievements(None) => write!(f, "achievements"),
            CacheKey::Achievements(Some(traq_id)) => write!(f, "achievements?traqId={traq_id}"),
            CacheKey::UserInfo => write!(f, "me"),
            CacheKey::Image(id) => write!(f, "images/{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn absent_and_false_are_distinct_keys() {
        let unset = CacheKey::messages();
        let explicit_false = CacheKey::messages_by(MessageFilter::all().include_replies(false));
        let explicit_true = CacheKey::messages_by(MessageFilter::all().include_replies(true));

        assert_ne!(unset, explicit_false);
        assert_ne!(explicit_false, explicit_true);
        assert_ne!(unset, explicit_true);

        let set: HashSet<_> = [unset, explicit_false, explicit_true].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn equal_components_make_equal_keys() {
        let a = CacheKey::messages_by(MessageFilter::by_user("alice").include_replies(true));
        let b = CacheKey::messages_by(MessageFilter::by_user("alice").include_replies(true));
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::messages_by(MessageFilter::by_user("bob").include_replies(true)));
    }

    #[test]
    fn query_pairs_omit_unset_fields() {
        assert!(MessageFilter::all().query_pairs().is_empty());
        assert_eq!(
            MessageFilter::all().include_replies(false).query_pairs(),
            vec![("includeReplies", "false".to_string())]
        );
        assert_eq!(
            MessageFilter::by_user("alice").query_pairs(),
            vec![("traqId", "alice".to_string())]
        );
    }

    #[test]
    fn flag_from_option() {
        assert_eq!(Flag::from(None), Flag::Unset);
        assert_eq!(Flag::from(Some(false)), Flag::Present(false));
        assert!(!Flag::Unset.is_set());
    }

    #[test]
    fn unfiltered_only_without_fields() {
        assert!(MessageFilter::all().is_unfiltered());
        assert!(!MessageFilter::all().include_replies(false).is_unfiltered());
        assert!(!MessageFilter::by_user("alice").is_unfiltered());
    }

    #[test]
    fn display_reads_like_a_path() {
        let key = CacheKey::messages_by(MessageFilter::by_user("alice").include_replies(true));
        assert_eq!(key.to_string(), "messages?traqId=alice&includeReplies=true");
        assert_eq!(CacheKey::achievements(None).to_string(), "achievements");
        assert_eq!(CacheKey::UserInfo.to_string(), "me");
    }
}
