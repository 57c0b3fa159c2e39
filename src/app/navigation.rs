use timeline_client::core::FetchOutcome;

use super::{AppModel, Message, Task, View};

impl AppModel {
    pub(super) fn handle_navigation(&mut self, message: Message) -> Task {
        match message {
            Message::ShowMessage(id) => {
                self.set_view(View::Detail(id));
                self.status_message = "Loading message...".into();
                let detail = self.timeline.message_detail(id);
                return Task::future(async move { Message::DetailLoaded(id, detail.load().await) });
            }
            Message::DetailLoaded(id, outcome) => {
                if self.view != View::Detail(id) {
                    return Task::none();
                }
                self.status_message = match outcome {
                    FetchOutcome::Failed(e) if e.is_not_found() => "Message not found".into(),
                    FetchOutcome::Failed(e) => format!("Failed to load message: {e}"),
                    _ => {
                        let replies = self
                            .timeline
                            .message_detail(id)
                            .state()
                            .data
                            .map(|d| d.replies.len())
                            .unwrap_or(0);
                        format!("{replies} replies")
                    }
                };
            }

            Message::ShowAchievements(traq_id) => {
                self.set_view(View::Achievements(traq_id.clone()));
                let query = self.timeline.achievements(traq_id);
                return Task::future(async move { Message::AchievementsLoaded(query.load().await) });
            }
            Message::AchievementsLoaded(outcome) => {
                if let Some(e) = outcome.error() {
                    self.status_message = format!("Failed to load achievements: {e}");
                } else if let View::Achievements(traq_id) = &self.view {
                    let count = self.timeline.achievements(traq_id.clone()).state().items.len();
                    self.status_message = format!("{count} achievements");
                }
            }

            Message::ShowMe => {
                self.set_view(View::Profile);
                return self.load_me();
            }
            Message::MeLoaded(outcome) => match outcome {
                FetchOutcome::Failed(e) => {
                    log::warn!("Failed to load user info: {}", e);
                    if self.view == View::Profile {
                        self.status_message = format!("Failed to load profile: {e}");
                    }
                }
                _ => {
                    if let Some(traq_id) = self.timeline.acting_user() {
                        log::info!("Signed in as {}", traq_id);
                    }
                }
            },

            Message::ToggleTheme => {
                self.config.theme = self.config.theme.toggle();
                self.status_message = format!("Theme: {:?}", self.config.theme);
                self.save_theme();
            }

            _ => {}
        }
        Task::none()
    }
}
