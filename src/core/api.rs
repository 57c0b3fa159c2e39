use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::core::error::ApiError;
use crate::core::key::MessageFilter;
use crate::core::models::{
    AchieveOutcome, Achievement, ImageUrl, Message, MessageDetail, NewMessage, Reactions,
    UserInfo, UserInfoPatch,
};

/// Parameters of one `GET /messages` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagesQuery {
    pub limit: usize,
    pub offset: usize,
    pub filter: MessageFilter,
}

impl MessagesQuery {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        pairs.extend(self.filter.query_pairs());
        pairs
    }
}

/// The server operations the client depends on.
#[async_trait]
pub trait TimelineApi: Send + Sync {
    async fn get_messages(&self, query: &MessagesQuery) -> Result<Vec<Message>, ApiError>;
    async fn get_message(&self, id: Uuid) -> Result<MessageDetail, ApiError>;
    async fn create_message(&self, message: NewMessage) -> Result<MessageDetail, ApiError>;
    async fn delete_message(&self, id: Uuid) -> Result<(), ApiError>;
    async fn add_reaction(&self, id: Uuid) -> Result<Reactions, ApiError>;
    async fn remove_reaction(&self, id: Uuid) -> Result<Reactions, ApiError>;
    async fn get_achievements(&self, traq_id: Option<&str>) -> Result<Vec<Achievement>, ApiError>;
    async fn create_achievement(&self, name: &str) -> Result<AchieveOutcome, ApiError>;
    async fn try_achieve(&self, id: &str) -> Result<AchieveOutcome, ApiError>;
    async fn get_me(&self) -> Result<UserInfo, ApiError>;
    async fn update_me(&self, patch: &UserInfoPatch) -> Result<UserInfo, ApiError>;
    async fn get_image(&self, id: Uuid) -> Result<ImageUrl, ApiError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewAchievement<'a> {
    name: &'a str,
}

/// reqwest-backed client for the REST API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: Url,
    client: Client,
}

impl HttpClient {
    /// `base_url` is the API root; relative paths are joined onto it.
    pub fn new(base_url: Url, timeout: Duration, token: Option<&str>) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ApiError::validation(format!("invalid auth token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(HttpClient {
            base_url: with_trailing_slash(base_url),
            client,
        })
    }

    pub fn from_config(config: &Config, token: Option<&str>) -> Result<Self, ApiError> {
        let base_url = config
            .api_url()
            .map_err(|e| ApiError::validation(format!("invalid API URL: {e}")))?;
        Self::new(
            base_url,
            Duration::from_secs(config.timeout_secs),
            token,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn segment_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(ApiError::validation(format!("invalid path segment {bad:?}")));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::validation(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::validation(format!("bad request path {path:?}: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
        log::warn!("HTTP {status}: {message}");
        Err(ApiError::from_status(status.as_u16(), message))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        Ok(self.send(request).await?.json::<T>().await?)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn require(value: &str, what: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{what} is required")));
    }
    Ok(())
}

#[async_trait]
impl TimelineApi for HttpClient {
    async fn get_messages(&self, query: &MessagesQuery) -> Result<Vec<Message>, ApiError> {
        if let Some(traq_id) = &query.filter.traq_id {
            require(traq_id, "traqId")?;
        }
        log::debug!("GET messages {:?}", query.query_pairs());
        let request = self.client.get(self.url("messages")?).query(&query.query_pairs());
        self.json(request).await
    }

    async fn get_message(&self, id: Uuid) -> Result<MessageDetail, ApiError> {
        let request = self.client.get(self.url(&format!("messages/{id}"))?);
        self.json(request).await
    }

    async fn create_message(&self, message: NewMessage) -> Result<MessageDetail, ApiError> {
        message.validate()?;

        let mut form = multipart::Form::new().text("message", message.content);
        if let Some(image) = message.image {
            let part = multipart::Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.mime_type)?;
            form = form.part("image", part);
        }
        if let Some(parent) = message.replies_to {
            form = form.text("repliesTo", parent.to_string());
        }

        let request = self.client.post(self.url("messages")?).multipart(form);
        self.json(request).await
    }

    async fn delete_message(&self, id: Uuid) -> Result<(), ApiError> {
        let request = self.client.delete(self.url(&format!("messages/{id}"))?);
        self.send(request).await?;
        Ok(())
    }

    async fn add_reaction(&self, id: Uuid) -> Result<Reactions, ApiError> {
        let request = self.client.post(self.url(&format!("messages/{id}/reactions"))?);
        self.json(request).await
    }

    async fn remove_reaction(&self, id: Uuid) -> Result<Reactions, ApiError> {
        let request = self.client.delete(self.url(&format!("messages/{id}/reactions"))?);
        self.json(request).await
    }

    async fn get_achievements(&self, traq_id: Option<&str>) -> Result<Vec<Achievement>, ApiError> {
        let mut request = self.client.get(self.url("achievements")?);
        if let Some(traq_id) = traq_id {
            require(traq_id, "traqId")?;
            request = request.query(&[("traqId", traq_id)]);
        }
        self.json(request).await
    }

    async fn create_achievement(&self, name: &str) -> Result<AchieveOutcome, ApiError> {
        require(name, "achievement name")?;
        let request = self
            .client
            .post(self.url("me-achievements")?)
            .json(&NewAchievement { name });
        self.json(request).await
    }

    async fn try_achieve(&self, id: &str) -> Result<AchieveOutcome, ApiError> {
        require(id, "achievement id")?;
        let request = self.client.post(self.segment_url(&["try-achieve", id])?);
        self.json(request).await
    }

    async fn get_me(&self) -> Result<UserInfo, ApiError> {
        let request = self.client.get(self.url("me")?);
        self.json(request).await
    }

    async fn update_me(&self, patch: &UserInfoPatch) -> Result<UserInfo, ApiError> {
        if let Some(traq_id) = &patch.traq_id {
            require(traq_id, "traqId")?;
        }
        let request = self.client.patch(self.url("me")?).json(patch);
        self.json(request).await
    }

    async fn get_image(&self, id: Uuid) -> Result<ImageUrl, ApiError> {
        let request = self.client.get(self.url(&format!("images/{id}"))?);
        self.json(request).await
    }
}
