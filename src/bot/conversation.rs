//! Conversation state machine
//!
//! Maps every inbound text or button press to exactly one [`Action`] or
//! [`CallbackOutcome`]. The only state is the per-requester pending prompt,
//! kept in a [`PromptStore`] owned by [`Conversation`].

use crate::bot::views;
use lazy_regex::lazy_regex;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

static RE_PLATFORM_HOST: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"instagram[A-Za-z0-9.-]*\.com");
static RE_USERNAME: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^[A-Za-z0-9._]+$");
static RE_CONTENT_PATH: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"/(?:p|reel|tv)/([A-Za-z0-9_-]+)/?");
static RE_BARE_SHORTCODE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"^[A-Za-z0-9_-]{5,25}$");

/// Reply the bot is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Reel URL
    ReelLink,
    /// Post URL
    PostLink,
    /// Username whose profile photo to fetch
    ProfilePhotoUsername,
    /// `username,password` for the privileged requester
    OwnerCredentials,
    /// `username,password` for any requester
    UserCredentials,
    /// Username whose stories to fetch
    StoryUsername,
    /// Username whose highlights to fetch
    HighlightsUsername,
}

/// Per-requester conversation state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterState {
    /// Prompt awaiting a reply, if any
    pub pending: Option<Prompt>,
}

/// Keyed store of requester states
#[derive(Debug, Default)]
pub struct PromptStore {
    states: RwLock<HashMap<i64, RequesterState>>,
}

impl PromptStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the pending prompt of a requester
    pub async fn set(&self, requester_id: i64, prompt: Prompt) {
        let mut states = self.states.write().await;
        states.entry(requester_id).or_default().pending = Some(prompt);
    }

    /// Remove and return the pending prompt
    pub async fn take(&self, requester_id: i64) -> Option<Prompt> {
        let mut states = self.states.write().await;
        states.remove(&requester_id).and_then(|s| s.pending)
    }

    /// Drop any state of a requester
    pub async fn clear(&self, requester_id: i64) {
        self.states.write().await.remove(&requester_id);
    }

    /// Current pending prompt without consuming it
    pub async fn pending(&self, requester_id: i64) -> Option<Prompt> {
        self.states
            .read()
            .await
            .get(&requester_id)
            .and_then(|s| s.pending)
    }
}

/// How a free-form text is interpreted when no prompt is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Mentions an Instagram host
    Link,
    /// Looks like a username
    Username,
    /// Neither
    Unrecognized,
}

/// Classify a trimmed text. Exactly one branch matches.
#[must_use]
pub fn classify(text: &str) -> InputKind {
    if RE_PLATFORM_HOST.is_match(text) {
        InputKind::Link
    } else if RE_USERNAME.is_match(text) {
        InputKind::Username
    } else {
        InputKind::Unrecognized
    }
}

/// Extract the shortcode from a post, reel or IGTV URL, or accept a bare shortcode.
#[must_use]
pub fn extract_shortcode(text: &str) -> Option<String> {
    if let Some(caps) = RE_CONTENT_PATH.captures(text) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    RE_BARE_SHORTCODE
        .is_match(text)
        .then(|| text.to_string())
}

/// Split `username,password` on the first comma. Both parts must be non-empty.
#[must_use]
pub fn parse_credentials(text: &str) -> Option<(String, String)> {
    let (username, password) = text.split_once(',')?;
    let (username, password) = (username.trim(), password.trim());
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}

fn normalize_username(text: &str) -> String {
    text.trim().trim_start_matches('@').to_string()
}

/// Inline menus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    /// Top level
    Main,
    /// Reel, post, profile photo
    Download,
    /// Owner and user login
    Login,
    /// Stories and highlights
    Stories,
}

/// Button press payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCallback {
    /// Back to the main menu
    Home,
    /// Open a submenu
    Open(Menu),
    /// Choose an action that needs a reply
    Choose(Prompt),
}

impl MenuCallback {
    /// Parse callback data produced by the keyboards
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let parsed = match data {
            views::CB_BACK_HOME => Self::Home,
            views::CB_MENU_DOWNLOAD => Self::Open(Menu::Download),
            views::CB_MENU_LOGIN => Self::Open(Menu::Login),
            views::CB_MENU_STORIES => Self::Open(Menu::Stories),
            views::CB_DL_REEL => Self::Choose(Prompt::ReelLink),
            views::CB_DL_POST => Self::Choose(Prompt::PostLink),
            views::CB_DL_PFP => Self::Choose(Prompt::ProfilePhotoUsername),
            views::CB_LOGIN_OWNER => Self::Choose(Prompt::OwnerCredentials),
            views::CB_LOGIN_USER => Self::Choose(Prompt::UserCredentials),
            views::CB_SH_STORY => Self::Choose(Prompt::StoryUsername),
            views::CB_SH_HIGHLIGHTS => Self::Choose(Prompt::HighlightsUsername),
            _ => return None,
        };
        Some(parsed)
    }
}

/// Result of a button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Replace the message with a menu
    ShowMenu(Menu),
    /// Replace the message with a prompt
    AwaitReply(Prompt),
    /// Privileged action refused
    Denied,
}

/// What a text message resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Download a post/reel/IGTV link (raw text, shortcode not yet extracted)
    DownloadLink(String),
    /// Profile info followed by the profile photo
    ProfileInfo(String),
    /// Profile photo only
    ProfilePhoto(String),
    /// Log in and store the session
    Login {
        /// Platform username
        username: String,
        /// Platform password, never persisted
        password: String,
    },
    /// Owner login attempted by someone else
    LoginDenied,
    /// Reply to a login prompt was not `username,password`
    MalformedCredentials,
    /// Download stories
    Stories(String),
    /// Download highlights
    Highlights(String),
    /// Neither a link nor a username
    Unrecognized,
}

impl Action {
    /// Short name for logs; never includes credentials
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::DownloadLink(_) => "download_link",
            Self::ProfileInfo(_) => "profile_info",
            Self::ProfilePhoto(_) => "profile_photo",
            Self::Login { .. } => "login",
            Self::LoginDenied => "login_denied",
            Self::MalformedCredentials => "malformed_credentials",
            Self::Stories(_) => "stories",
            Self::Highlights(_) => "highlights",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Per-requester dialogue driver
#[derive(Debug, Default)]
pub struct Conversation {
    prompts: PromptStore,
}

impl Conversation {
    /// Create a conversation with no pending prompts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompt store backing this conversation
    #[must_use]
    pub const fn prompts(&self) -> &PromptStore {
        &self.prompts
    }

    /// Resolve a text message to an action.
    ///
    /// A pending prompt is consumed before the action is returned, so it is
    /// cleared whatever the outcome of running the action.
    pub async fn handle(&self, requester_id: i64, is_owner: bool, text: &str) -> Action {
        let text = text.trim();

        if let Some(prompt) = self.prompts.take(requester_id).await {
            debug!(user_id = requester_id, ?prompt, "Consuming prompt reply");
            return reply_action(prompt, is_owner, text);
        }

        match classify(text) {
            InputKind::Link => Action::DownloadLink(text.to_string()),
            InputKind::Username => Action::ProfileInfo(text.to_string()),
            InputKind::Unrecognized => Action::Unrecognized,
        }
    }

    /// Apply a button press. Unknown payloads yield `None`.
    pub async fn on_callback(
        &self,
        requester_id: i64,
        is_owner: bool,
        data: &str,
    ) -> Option<CallbackOutcome> {
        let outcome = match MenuCallback::parse(data)? {
            MenuCallback::Home => {
                self.prompts.clear(requester_id).await;
                CallbackOutcome::ShowMenu(Menu::Main)
            }
            MenuCallback::Open(menu) => {
                self.prompts.clear(requester_id).await;
                CallbackOutcome::ShowMenu(menu)
            }
            MenuCallback::Choose(Prompt::OwnerCredentials) if !is_owner => CallbackOutcome::Denied,
            MenuCallback::Choose(prompt) => {
                self.prompts.set(requester_id, prompt).await;
                CallbackOutcome::AwaitReply(prompt)
            }
        };
        Some(outcome)
    }
}

fn reply_action(prompt: Prompt, is_owner: bool, text: &str) -> Action {
    match prompt {
        Prompt::ReelLink | Prompt::PostLink => Action::DownloadLink(text.to_string()),
        Prompt::ProfilePhotoUsername => Action::ProfilePhoto(normalize_username(text)),
        Prompt::StoryUsername => Action::Stories(normalize_username(text)),
        Prompt::HighlightsUsername => Action::Highlights(normalize_username(text)),
        // Privilege is checked again here, not only when the prompt was shown
        Prompt::OwnerCredentials if !is_owner => Action::LoginDenied,
        Prompt::OwnerCredentials | Prompt::UserCredentials => match parse_credentials(text) {
            Some((username, password)) => Action::Login { username, password },
            None => Action::MalformedCredentials,
        },
    }
}
