mod actions;
mod compose;
mod navigation;
mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::FutureExt;
use uuid::Uuid;

use timeline_client::config::Config;
use timeline_client::core::models::{
    AchieveOutcome, ImageUpload, Message as Post, MessageDetail, Reactions,
};
use timeline_client::core::timeline::MessagesSource;
use timeline_client::core::visibility::{Intersection, VisibilityTrigger};
use timeline_client::core::{
    ApiError, CacheKey, FetchOutcome, Flag, HttpClient, InfiniteQuery, MessageFilter, Timeline,
};

/// Pending work; resolves to the message fed back into `update`.
pub struct Task(Vec<BoxFuture<'static, Message>>);

impl Task {
    pub fn none() -> Self {
        Task(Vec::new())
    }

    pub fn future<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Message> + Send + 'static,
    {
        Task(vec![future.boxed()])
    }

    pub fn batch(tasks: impl IntoIterator<Item = Task>) -> Self {
        Task(tasks.into_iter().flat_map(|t| t.0).collect())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn spawn_into(self, running: &mut FuturesUnordered<BoxFuture<'static, Message>>) {
        running.extend(self.0);
    }
}

/// What the screen currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Feed,
    Detail(Uuid),
    Achievements(Option<String>),
    Profile,
}

pub struct AppModel {
    pub(super) config: Config,
    pub(super) timeline: Timeline,

    pub(super) filter: MessageFilter,
    pub(super) feed: InfiniteQuery<MessagesSource>,
    pub(super) trigger: VisibilityTrigger,
    pub(super) view: View,

    pub(super) attachment: Option<ImageUpload>,
    pub(super) is_posting: bool,

    pub(super) status_message: String,
    pub(super) quit: bool,
}

#[derive(Debug)]
pub enum Message {
    // Scrolling / sync
    Sentinel(Intersection),
    PageLoaded(FetchOutcome),
    Refresh,
    Reset,
    Home,
    ShowUser {
        traq_id: String,
        include_replies: Flag,
    },

    // Navigation
    ShowMessage(Uuid),
    DetailLoaded(Uuid, FetchOutcome),
    ShowAchievements(Option<String>),
    AchievementsLoaded(FetchOutcome),
    ShowMe,
    MeLoaded(FetchOutcome),
    ToggleTheme,

    // Compose
    Post(String),
    Reply(Uuid, String),
    Attach(PathBuf),
    AttachLoaded(Result<ImageUpload, String>),
    PostComplete(Result<MessageDetail, ApiError>),

    // Reactions / deletion / achievements
    React(Uuid),
    ReactionComplete {
        id: Uuid,
        result: Result<Reactions, ApiError>,
    },
    Delete(Uuid),
    DeleteComplete {
        id: Uuid,
        result: Result<(), ApiError>,
    },
    Achieve(String),
    TryAchieve(String),
    AchieveComplete(Result<AchieveOutcome, ApiError>),

    // Session
    Login(String),
    Logout,

    Help,
    Invalid(String),
    Quit,
    Noop,
}

const HELP: &str = "\
commands:
  <enter> | more          load the next page
  refresh | reset         refetch from the start | forget cached pages
  home                    unfiltered timeline
  user <traqId> [replies] one user's posts
  show <id>               message with replies
  post <text>             post (with the attached image, if any)
  reply <id> <text>       reply to a message
  attach <path>           attach an image to the next post
  react <id>              toggle your reaction
  delete <id>             delete a message
  achievements [traqId]   list achievements
  achieve <name>          create an achievement
  try <id>                try an achievement
  me | theme              your profile | toggle theme
  login <token> | logout  store or forget the auth token
  quit";

fn parse_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|e| format!("Invalid message id {raw:?}: {e}"))
}

impl Message {
    /// Translate one line of terminal input.
    pub fn parse(line: &str) -> Message {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let with_id = |f: fn(Uuid) -> Message| match parse_id(rest) {
            Ok(id) => f(id),
            Err(e) => Message::Invalid(e),
        };
        let required = |what: &str, f: fn(String) -> Message| {
            if rest.is_empty() {
                Message::Invalid(format!("{command}: {what} is required"))
            } else {
                f(rest.to_string())
            }
        };

        match command {
            "" | "more" => Message::Sentinel(Intersection::visible()),
            "refresh" => Message::Refresh,
            "reset" => Message::Reset,
            "home" => Message::Home,
            "user" => {
                let mut words = rest.split_whitespace();
                match words.next() {
                    Some(traq_id) => Message::ShowUser {
                        traq_id: traq_id.to_string(),
                        include_replies: match words.next() {
                            Some("replies") => Flag::Present(true),
                            Some("noreplies") => Flag::Present(false),
                            _ => Flag::Unset,
                        },
                    },
                    None => Message::Invalid("user: traqId is required".into()),
                }
            }
            "show" => with_id(Message::ShowMessage),
            "post" => required("text", Message::Post),
            "reply" => match rest.split_once(char::is_whitespace) {
                Some((id, text)) => match parse_id(id) {
                    Ok(id) => Message::Reply(id, text.trim().to_string()),
                    Err(e) => Message::Invalid(e),
                },
                None => Message::Invalid("reply: <id> <text> expected".into()),
            },
            "attach" => required("path", |p| Message::Attach(PathBuf::from(p))),
            "react" => with_id(Message::React),
            "delete" => with_id(Message::Delete),
            "achievements" => {
                Message::ShowAchievements((!rest.is_empty()).then(|| rest.to_string()))
            }
            "achieve" => required("name", Message::Achieve),
            "try" => required("achievement id", Message::TryAchieve),
            "me" => Message::ShowMe,
            "theme" => Message::ToggleTheme,
            "login" => required("token", Message::Login),
            "logout" => Message::Logout,
            "help" | "?" => Message::Help,
            "quit" | "exit" | "q" => Message::Quit,
            other => Message::Invalid(format!("Unknown command {other:?}, try `help`")),
        }
    }
}

impl AppModel {
    pub fn init(config: Config, token: Option<String>) -> Result<(Self, Task), ApiError> {
        let client = HttpClient::from_config(&config, token.as_deref())?;
        log::info!("Using API at {}", client.base_url());
        let timeline = Timeline::from_config(Arc::new(client), &config);

        let filter = MessageFilter::all();
        let feed = timeline.messages(filter.clone());
        let mut app = AppModel {
            config,
            timeline,
            filter,
            feed,
            trigger: VisibilityTrigger::new(),
            view: View::Feed,
            attachment: None,
            is_posting: false,
            status_message: "Loading...".into(),
            quit: false,
        };

        let task = Task::batch([app.load_feed(), app.load_me()]);
        Ok((app, task))
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn update(&mut self, message: Message) -> Task {
        match message {
            // Sync / paging
            Message::Sentinel(_)
            | Message::PageLoaded(_)
            | Message::Refresh
            | Message::Reset
            | Message::Home
            | Message::ShowUser { .. }
            | Message::Login(_)
            | Message::Logout => self.handle_sync(message),

            // Navigation
            Message::ShowMessage(_)
            | Message::DetailLoaded(..)
            | Message::ShowAchievements(_)
            | Message::AchievementsLoaded(_)
            | Message::ShowMe
            | Message::MeLoaded(_)
            | Message::ToggleTheme => self.handle_navigation(message),

            // Compose
            Message::Post(_)
            | Message::Reply(..)
            | Message::Attach(_)
            | Message::AttachLoaded(_)
            | Message::PostComplete(_) => self.handle_compose(message),

            // Reactions / deletion / achievements
            Message::React(_)
            | Message::ReactionComplete { .. }
            | Message::Delete(_)
            | Message::DeleteComplete { .. }
            | Message::Achieve(_)
            | Message::TryAchieve(_)
            | Message::AchieveComplete(_) => self.handle_actions(message),

            Message::Help => {
                self.status_message = HELP.into();
                Task::none()
            }
            Message::Invalid(e) => {
                self.status_message = e;
                Task::none()
            }
            Message::Quit => {
                self.trigger.stop();
                self.quit = true;
                Task::none()
            }
            Message::Noop => Task::none(),
        }
    }

    /// Dispatch a message through the update loop (for recursive calls from handlers).
    pub(super) fn dispatch(&mut self, message: Message) -> Task {
        self.update(message)
    }

    /// Switch views, dropping the cached thread when leaving it.
    pub(super) fn set_view(&mut self, view: View) {
        if let View::Detail(open) = self.view {
            if view != View::Detail(open) {
                self.timeline.store().remove(&CacheKey::message_detail(open));
            }
        }
        self.view = view;
    }

    pub(super) fn load_me(&self) -> Task {
        let me = self.timeline.user_info();
        Task::future(async move { Message::MeLoaded(me.load().await) })
    }

    /// Find a post in the feed or the open thread.
    pub(super) fn find_post(&self, id: Uuid) -> Option<Post> {
        if let Some(post) = self.feed.state().items.into_iter().find(|m| m.id == id) {
            return Some(post);
        }
        let View::Detail(parent) = self.view else {
            return None;
        };
        let detail = self.timeline.message_detail(parent).state().data?;
        if detail.id == id {
            return Some(Post {
                id: detail.id,
                author: detail.author,
                content: detail.content,
                image_id: detail.image_id,
                reactions: detail.reactions,
                reply_count: detail.replies.len() as u64,
                created_at: detail.created_at,
            });
        }
        detail.replies.into_iter().find(|m| m.id == id)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        match &self.view {
            View::Feed => self.render_feed(&mut out),
            View::Detail(id) => self.render_detail(*id, &mut out),
            View::Achievements(traq_id) => self.render_achievements(traq_id.clone(), &mut out),
            View::Profile => self.render_profile(&mut out),
        }
        if let Some(image) = &self.attachment {
            out.push_str(&format!("[attached: {}]\n", image.file_name));
        }
        out.push_str(&format!("-- {} --", self.status_message));
        out
    }

    fn render_feed(&self, out: &mut String) {
        let state = self.feed.state();
        let title = match &self.filter.traq_id {
            Some(traq_id) => format!("@{traq_id}"),
            None => "timeline".into(),
        };
        out.push_str(&format!("== {title} ({} loaded) ==\n", state.items.len()));
        for post in &state.items {
            out.push_str(&format_post(post));
        }
        let status = state.status;
        let footer = if status.is_loading {
            "loading..."
        } else if status.is_fetching_next {
            "loading more..."
        } else if status.is_refetching {
            "refreshing..."
        } else if status.has_more {
            "press enter for more"
        } else {
            "end of timeline"
        };
        out.push_str(&format!("   [{footer}]\n"));
        if let Some(e) = state.error {
            out.push_str(&format!("   ! {e}\n"));
        }
    }

    fn render_detail(&self, id: Uuid, out: &mut String) {
        let state = self.timeline.message_detail(id).state();
        match state.data {
            Some(detail) => {
                out.push_str(&format!(
                    "== {} by @{} ==\n{}\n",
                    detail.id, detail.author, detail.content
                ));
                if detail.image_id.is_some() {
                    out.push_str("   [image]\n");
                }
                out.push_str(&format!("   ♥ {}\n", detail.reactions.count));
                for reply in &detail.replies {
                    out.push_str("  ");
                    out.push_str(&format_post(reply));
                }
            }
            None if state.is_loading => out.push_str("loading...\n"),
            None => out.push_str("(not loaded)\n"),
        }
        if let Some(e) = state.error {
            out.push_str(&format!("   ! {e}\n"));
        }
    }

    fn render_achievements(&self, traq_id: Option<String>, out: &mut String) {
        let title = traq_id.clone().unwrap_or_else(|| "all".into());
        let state = self.timeline.achievements(traq_id).state();
        out.push_str(&format!("== achievements: {title} ==\n"));
        for a in &state.items {
            out.push_str(&format!("   {} ({})\n", a.name, a.achieved_at.format("%Y-%m-%d")));
        }
        if state.items.is_empty() && !state.status.is_in_flight() {
            out.push_str("   (none)\n");
        }
    }

    fn render_profile(&self, out: &mut String) {
        let me = self.timeline.user_info().state();
        match me.data {
            Some(user) => out.push_str(&format!("== @{} ==\n", user.traq_id)),
            None => out.push_str("== (not signed in) ==\n"),
        }
        out.push_str(&format!("   theme: {:?}\n", self.config.theme));
    }

    pub(super) fn save_theme(&mut self) {
        if let Err(e) = self.config.save_theme() {
            log::warn!("Failed to save theme: {}", e);
            self.status_message = format!("Theme not saved: {e}");
        }
    }

    /// Swap the transport after the token changed; the feed starts over.
    pub(super) fn reconnect(&mut self, token: Option<String>) -> Task {
        let client = match HttpClient::from_config(&self.config, token.as_deref()) {
            Ok(client) => client,
            Err(e) => {
                self.status_message = format!("Failed to create client: {e}");
                return Task::none();
            }
        };
        self.timeline = self.timeline.with_api(Arc::new(client));
        self.feed = self.timeline.messages(self.filter.clone());
        Task::batch([self.load_feed(), self.load_me()])
    }
}

fn format_post(post: &Post) -> String {
    let mut line = format!(
        "{} @{}: {}",
        post.created_at.format("%m-%d %H:%M"),
        post.author,
        post.content
    );
    if post.image_id.is_some() {
        line.push_str(" [image]");
    }
    let heart = if post.reactions.my_reaction { "♥" } else { "♡" };
    line.push_str(&format!(
        "  {heart}{} ↩{}  ({})\n",
        post.reactions.count, post.reply_count, post.id
    ));
    line
}
