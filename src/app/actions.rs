use timeline_client::core::models::AchieveOutcome;

use super::{AppModel, Message, Task, View};

impl AppModel {
    pub(super) fn handle_actions(&mut self, message: Message) -> Task {
        match message {
            Message::React(id) => {
                let Some(post) = self.find_post(id) else {
                    self.status_message = format!("Message {id} is not on screen");
                    return Task::none();
                };
                let reacted = post.reactions.my_reaction;
                let timeline = self.timeline.clone();
                return Task::future(async move {
                    let result = timeline.toggle_reaction(id, reacted).await;
                    Message::ReactionComplete { id, result }
                });
            }
            Message::ReactionComplete {
                id,
                result: Ok(reactions),
            } => {
                let verb = if reactions.my_reaction { "Reacted to" } else { "Removed reaction from" };
                self.status_message = format!("{verb} {id} ({} total)", reactions.count);
                return self.reload_current();
            }
            Message::ReactionComplete { id, result: Err(e) } => {
                log::warn!("Reaction on {} failed: {}", id, e);
                self.status_message = format!("Reaction failed: {e}");
            }

            Message::Delete(id) => {
                // A reply deleted from an open thread also stales the thread.
                let replies_to = match self.view {
                    View::Detail(parent) if parent != id => Some(parent),
                    _ => None,
                };
                let timeline = self.timeline.clone();
                return Task::future(async move {
                    let result = timeline.delete_message(id, replies_to).await;
                    Message::DeleteComplete { id, result }
                });
            }
            Message::DeleteComplete { id, result: Ok(()) } => {
                self.status_message = format!("Deleted {id}");
                if self.view == View::Detail(id) {
                    self.set_view(View::Feed);
                }
                return self.reload_current();
            }
            Message::DeleteComplete { id, result: Err(e) } => {
                log::warn!("Delete of {} failed: {}", id, e);
                self.status_message = if e.is_not_found() {
                    format!("Message {id} no longer exists")
                } else {
                    format!("Delete failed: {e}")
                };
            }

            Message::Achieve(name) => {
                let timeline = self.timeline.clone();
                return Task::future(async move {
                    Message::AchieveComplete(timeline.create_achievement(&name).await)
                });
            }
            Message::TryAchieve(id) => {
                let timeline = self.timeline.clone();
                return Task::future(async move {
                    Message::AchieveComplete(timeline.try_achieve(&id).await)
                });
            }
            Message::AchieveComplete(Ok(outcome)) => {
                self.status_message = match outcome {
                    AchieveOutcome::Created(a) => format!("Achieved \"{}\"", a.name),
                    AchieveOutcome::Dispatched { dispatched: true } => "Achievement unlocked".into(),
                    AchieveOutcome::Dispatched { dispatched: false } => "Nothing unlocked".into(),
                };
                return self.reload_current();
            }
            Message::AchieveComplete(Err(e)) => {
                log::warn!("Achievement failed: {}", e);
                self.status_message = format!("Achievement failed: {e}");
            }

            _ => {}
        }
        Task::none()
    }
}
