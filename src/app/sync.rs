use timeline_client::core::keyring;
use timeline_client::core::pagination::SkipReason;
use timeline_client::core::visibility::Intersection;
use timeline_client::core::{FetchOutcome, MessageFilter};

use super::{AppModel, Message, Task, View};

impl AppModel {
    pub(super) fn handle_sync(&mut self, message: Message) -> Task {
        match message {
            Message::Sentinel(signal) => {
                self.set_view(View::Feed);
                if self.feed.status().is_stale {
                    return self.load_feed();
                }
                self.trigger.observe(signal);
                if !self.trigger.should_fetch(&self.feed.status()) {
                    let status = self.feed.status();
                    if !status.has_more {
                        self.status_message = format!("{} messages, no more", status.item_count);
                    }
                    return Task::none();
                }
                // One page per signal; the terminal has no scroll position to keep it visible.
                self.trigger.observe(Intersection::hidden());
                let feed = self.feed.clone();
                self.status_message = "Loading more...".into();
                return Task::future(async move {
                    Message::PageLoaded(feed.fetch_next_page().await)
                });
            }

            Message::PageLoaded(outcome) => {
                let count = self.feed.status().item_count;
                match outcome {
                    FetchOutcome::Fetched { len, has_more, .. } => {
                        self.status_message = if has_more {
                            format!("{count} messages (+{len})")
                        } else {
                            format!("{count} messages, end of timeline")
                        };
                    }
                    FetchOutcome::Failed(e) => {
                        log::warn!("Failed to load {}: {}", self.feed.key(), e);
                        self.status_message = format!("Failed to load messages: {e}");
                    }
                    FetchOutcome::Skipped(SkipReason::InFlight) => {
                        log::debug!("{} already loading", self.feed.key());
                    }
                    FetchOutcome::Skipped(_) => {
                        self.status_message = format!("{count} messages");
                    }
                    FetchOutcome::Discarded => {
                        log::debug!("Late page for {} discarded", self.feed.key());
                    }
                }
            }

            Message::Refresh => {
                self.set_view(View::Feed);
                let feed = self.feed.clone();
                self.status_message = "Refreshing...".into();
                return Task::future(async move { Message::PageLoaded(feed.refetch().await) });
            }

            Message::Reset => {
                self.feed.reset();
                self.set_view(View::Feed);
                return self.load_feed();
            }

            Message::Home => {
                return self.switch_feed(MessageFilter::all());
            }

            Message::ShowUser {
                traq_id,
                include_replies,
            } => {
                let filter = MessageFilter::by_user(traq_id).include_replies(include_replies);
                return self.switch_feed(filter);
            }

            Message::Login(token) => {
                let stored = keyring::set_token(&token);
                let task = self.reconnect(Some(token));
                if task.is_none() {
                    return task;
                }
                self.status_message = match stored {
                    Ok(()) => "Signed in".into(),
                    Err(e) => {
                        log::warn!("Failed to store token: {}", e);
                        format!("Signed in for this session only (token not saved: {e})")
                    }
                };
                return task;
            }

            Message::Logout => {
                if let Err(e) = keyring::delete_token() {
                    log::warn!("Failed to delete token: {}", e);
                }
                let task = self.reconnect(None);
                if !task.is_none() {
                    self.status_message = "Signed out".into();
                }
                return task;
            }

            _ => {}
        }
        Task::none()
    }

    fn switch_feed(&mut self, filter: MessageFilter) -> Task {
        self.set_view(View::Feed);
        if filter == self.filter {
            return self.load_feed();
        }
        self.filter = filter;
        self.feed = self.timeline.messages(self.filter.clone());
        self.load_feed()
    }

    /// Serve the cached feed, fetching page 0 when empty or stale.
    pub(super) fn load_feed(&mut self) -> Task {
        let status = self.feed.status();
        if status.page_count > 0 && !status.is_stale {
            self.status_message = format!("{} messages (cached)", status.item_count);
            return Task::none();
        }
        self.status_message = "Loading...".into();
        let feed = self.feed.clone();
        Task::future(async move { Message::PageLoaded(feed.load().await) })
    }
}
