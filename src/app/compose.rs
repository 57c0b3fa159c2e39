use timeline_client::core::mime;
use timeline_client::core::models::NewMessage;

use super::{AppModel, Message, Task, View};

impl AppModel {
    pub(super) fn handle_compose(&mut self, message: Message) -> Task {
        match message {
            Message::Post(text) => {
                return self.send(NewMessage::text(text));
            }
            Message::Reply(parent, text) => {
                return self.send(NewMessage::reply(parent, text));
            }

            Message::Attach(path) => {
                self.status_message = format!("Reading {}...", path.display());
                return Task::future(async move {
                    Message::AttachLoaded(mime::load_image(&path).await)
                });
            }
            Message::AttachLoaded(Ok(image)) => {
                self.status_message = format!(
                    "Attached {} ({} bytes)",
                    image.file_name,
                    image.bytes.len()
                );
                self.attachment = Some(image);
            }
            Message::AttachLoaded(Err(e)) => {
                self.status_message = e;
            }

            Message::PostComplete(Ok(created)) => {
                self.is_posting = false;
                self.attachment = None;
                self.status_message = format!("Posted {}", created.id);
                return self.reload_current();
            }
            Message::PostComplete(Err(e)) => {
                self.is_posting = false;
                log::warn!("Post failed: {}", e);
                self.status_message = format!("Post failed: {e}");
            }

            _ => {}
        }
        Task::none()
    }

    fn send(&mut self, mut post: NewMessage) -> Task {
        if self.is_posting {
            self.status_message = "Still sending the previous post".into();
            return Task::none();
        }
        if let Some(image) = self.attachment.clone() {
            post = post.with_image(image);
        }
        if let Err(e) = post.validate() {
            self.status_message = e.message;
            return Task::none();
        }

        self.is_posting = true;
        self.status_message = "Sending...".into();
        let timeline = self.timeline.clone();
        Task::future(async move { Message::PostComplete(timeline.post_message(post).await) })
    }

    /// Re-read whatever is on screen after a write invalidated it.
    pub(super) fn reload_current(&mut self) -> Task {
        match self.view.clone() {
            View::Feed => self.load_feed(),
            View::Detail(id) => self.dispatch(Message::ShowMessage(id)),
            View::Achievements(traq_id) => self.dispatch(Message::ShowAchievements(traq_id)),
            View::Profile => self.load_me(),
        }
    }
}
