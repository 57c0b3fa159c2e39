use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::core::error::ApiError;

/// Largest image the server accepts.
pub const MAX_IMAGE_SIZE: usize = 16 * 1024 * 1024;

/// Reaction summary attached to every message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reactions {
    pub count: u64,
    pub my_reaction: bool,
}

/// A timeline entry as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub author: String,
    pub content: String,
    #[serde(default, deserialize_with = "nil_as_none", skip_serializing_if = "Option::is_none")]
    pub image_id: Option<Uuid>,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub reply_count: u64,
    pub created_at: DateTime<Utc>,
}

/// A message together with its replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    pub id: Uuid,
    pub author: String,
    pub content: String,
    #[serde(default, deserialize_with = "nil_as_none", skip_serializing_if = "Option::is_none")]
    pub image_id: Option<Uuid>,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub replies: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

/// A badge a user has earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub name: String,
    pub achieved_at: DateTime<Utc>,
}

/// Result of an achievement attempt: either the created badge or a dispatch flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AchieveOutcome {
    Created(Achievement),
    Dispatched { dispatched: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub traq_id: String,
}

/// Partial profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traq_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// An image attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !self.mime_type.starts_with("image/") {
            return Err(ApiError::validation(format!(
                "{} is not an image ({})",
                self.file_name, self.mime_type
            )));
        }
        if self.bytes.len() > MAX_IMAGE_SIZE {
            return Err(ApiError::validation(
                "Image file is too large. (max: 16MiB)",
            ));
        }
        Ok(())
    }
}

/// An outgoing post or reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub image: Option<ImageUpload>,
    pub replies_to: Option<Uuid>,
}

impl NewMessage {
    pub fn text(content: impl Into<String>) -> Self {
        NewMessage {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn reply(parent: Uuid, content: impl Into<String>) -> Self {
        NewMessage {
            content: content.into(),
            image: None,
            replies_to: Some(parent),
        }
    }

    pub fn with_image(mut self, image: ImageUpload) -> Self {
        self.image = Some(image);
        self
    }

    /// Reject a post with neither text nor image before it reaches the network.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.content.trim().is_empty() && self.image.is_none() {
            return Err(ApiError::validation("Message is empty"));
        }
        if let Some(image) = &self.image {
            image.validate()?;
        }
        Ok(())
    }
}

// The server encodes "no image" as the nil UUID.
fn nil_as_none<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<Uuid>::deserialize(deserializer)?;
    Ok(id.filter(|id| !id.is_nil()))
}
