//! Bot UI components
//!
//! Contains keyboards, callback payloads and message texts.

use crate::bot::conversation::{Menu, Prompt};
use crate::platform::Profile;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Back to the main menu
pub const CB_BACK_HOME: &str = "back_home";
/// Open the download menu
pub const CB_MENU_DOWNLOAD: &str = "menu_download";
/// Open the login menu
pub const CB_MENU_LOGIN: &str = "menu_login";
/// Open the stories and highlights menu
pub const CB_MENU_STORIES: &str = "menu_sh";
/// Ask for a reel link
pub const CB_DL_REEL: &str = "dl_reel";
/// Ask for a post link
pub const CB_DL_POST: &str = "dl_post";
/// Ask for a username to fetch the profile photo of
pub const CB_DL_PFP: &str = "dl_pfp";
/// Ask the owner for credentials
pub const CB_LOGIN_OWNER: &str = "login_owner";
/// Ask any user for credentials
pub const CB_LOGIN_USER: &str = "login_user";
/// Ask for a username to fetch stories of
pub const CB_SH_STORY: &str = "sh_story";
/// Ask for a username to fetch highlights of
pub const CB_SH_HIGHLIGHTS: &str = "sh_highlights";

// ─────────────────────────────────────────────────────────────────────────────
// Static texts
// ─────────────────────────────────────────────────────────────────────────────

/// `/start` greeting
pub const WELCOME: &str = "👋 Welcome!\n\n\
• Send an <b>Instagram URL</b> (post/reel/igtv) and I'll download it.\n\
• Send an <b>Instagram username</b> to get profile info + PFP.\n\n\
Use buttons for more options.\n\n\
❗ We do not store your password. If you login, we only save a session cookie \
so you don't have to login again.";

/// `/help` text
pub const HELP: &str = "<b>How to use</b>\n\n\
• Paste a post, reel or IGTV link to download its media.\n\
• Send a username to get profile info and the profile photo.\n\
• 🔑 Login saves a session so private content, stories and highlights work.\n\
• 🎬 Stories &amp; Highlights need a saved login session.\n\n\
Commands: /start, /help, /healthcheck";

/// Shown for text that is neither a link nor a username
pub const UNRECOGNIZED: &str = "Send a valid Instagram link or a username.";
/// Shown when no shortcode can be extracted
pub const BAD_LINK: &str = "Could not parse shortcode from URL. Send full post/reel/igtv link.";
/// Login reply without a comma
pub const CREDENTIALS_FORMAT: &str = "Send as: username,password";
/// Owner login reply from a non-owner
pub const OWNER_ONLY_LOGIN: &str = "Only owner can login here.";
/// Alert for the owner login button
pub const OWNER_ONLY_BUTTON: &str = "Only owner can use this.";
/// Progress notice before login
pub const LOGIN_STARTED: &str = "Attempting login...";
/// Successful login
pub const LOGIN_OK: &str = "✅ Login successful. Session saved. We do NOT store your password.";
/// Progress notice before a download
pub const DOWNLOAD_STARTED: &str = "Downloading... This may take a moment.";
/// Empty media bundle
pub const NO_MEDIA: &str = "No media files found.";
/// Zero stories
pub const NO_STORIES: &str = "No stories found (or not visible).";
/// Zero highlights
pub const NO_HIGHLIGHTS: &str = "No highlights found (or not visible).";

/// Private post or reel
pub const LOGIN_REQUIRED_POST: &str = "Private content requires login. Use the Login menu first.";
/// Private profile photo
pub const LOGIN_REQUIRED_PFP: &str =
    "Private profile photo requires login. Use the Login menu first.";
/// Private profile info
pub const LOGIN_REQUIRED_PROFILE: &str =
    "This profile requires login to view. Use the Login menu first.";
/// Stories without a session
pub const LOGIN_REQUIRED_STORIES: &str =
    "Stories for private accounts require login. Use the Login menu first.";
/// Highlights without a session
pub const LOGIN_REQUIRED_HIGHLIGHTS: &str =
    "Highlights for private accounts require login. Use the Login menu first.";

/// Title shown above a menu
#[must_use]
pub const fn menu_title(menu: Menu) -> &'static str {
    match menu {
        Menu::Main => "Main Menu:",
        Menu::Download => "Choose download type:",
        Menu::Login => "Login options:",
        Menu::Stories => "Stories & Highlights:",
    }
}

/// Text that replaces the menu once an action is chosen (HTML)
#[must_use]
pub const fn prompt_text(prompt: Prompt) -> &'static str {
    match prompt {
        Prompt::ReelLink => "Send Reel URL:",
        Prompt::PostLink => "Send Post URL:",
        Prompt::ProfilePhotoUsername => "Send Username to get Profile Photo:",
        Prompt::OwnerCredentials => {
            "Send as: <code>username,password</code>\n\n\
             ❗ Password is NOT stored. Only a session cookie is saved."
        }
        Prompt::UserCredentials => {
            "Send as: <code>username,password</code>\n\n\
             ❗ We do NOT store your password. Only a session cookie is saved for your \
             Telegram account."
        }
        Prompt::StoryUsername => {
            "Send Username to download STORIES (login may be required for private)."
        }
        Prompt::HighlightsUsername => {
            "Send Username to download HIGHLIGHTS (login may be required for private)."
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatters
// ─────────────────────────────────────────────────────────────────────────────

/// Failed login with the platform reason
#[must_use]
pub fn login_failed(reason: &str) -> String {
    format!(
        "❌ Login failed: {reason}\nIf 2FA is enabled, disable it or provide a pre-saved session."
    )
}

/// Generic failure of a flow
#[must_use]
pub fn failure(prefix: &str, reason: &str) -> String {
    format!("{prefix}: {reason}")
}

/// Per-file delivery failure
#[must_use]
pub fn file_send_failed(name: &str, reason: &str) -> String {
    format!("Failed sending file: {name} ({reason})")
}

/// Caption block sent before post media (HTML). `caption` must already be escaped.
#[must_use]
pub fn caption_block(escaped_caption: &str, first: bool) -> String {
    let body = format!("<blockquote>{escaped_caption}</blockquote>");
    if first {
        format!("📥 Download Complete\n────────────\n{body}")
    } else {
        body
    }
}

/// Header sent before a profile photo
#[must_use]
pub fn profile_photo_header(profile: &Profile) -> String {
    format!("👤 @{}\nName: {}", profile.username, profile.full_name)
}

/// Profile summary (HTML)
#[must_use]
pub fn profile_info(profile: &Profile) -> String {
    let bio = profile.biography.trim();
    let bio = if bio.is_empty() { "-" } else { bio };
    let privacy = if profile.is_private {
        "🔒 Private"
    } else {
        "🔓 Public"
    };

    format!(
        "👤 Profile Info for: @{username}\n\
         📝 Name: {name}\n\
         📸 Posts: {posts}\n\
         👥 Followers: {followers}\n\
         ➡️ Following: {following}\n\
         {privacy}\n\n\
         <blockquote>{bio}</blockquote>",
        username = html_escape::encode_text(&profile.username),
        name = html_escape::encode_text(&profile.full_name),
        posts = profile.media_count,
        followers = profile.followers,
        following = profile.following,
        bio = html_escape::encode_text(bio),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback("⬅️ Back", CB_BACK_HOME)]
}

/// Top-level menu
#[must_use]
pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📥 Download", CB_MENU_DOWNLOAD)],
        vec![InlineKeyboardButton::callback("🔑 Login", CB_MENU_LOGIN)],
        vec![InlineKeyboardButton::callback(
            "🎬 Stories & Highlights",
            CB_MENU_STORIES,
        )],
    ])
}

/// Reel, post and profile photo
#[must_use]
pub fn download_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Reel", CB_DL_REEL),
            InlineKeyboardButton::callback("Post", CB_DL_POST),
        ],
        vec![InlineKeyboardButton::callback("Profile Photo", CB_DL_PFP)],
        back_row(),
    ])
}

/// Login options; the owner entry is only shown to the owner
#[must_use]
pub fn login_menu(is_owner: bool) -> InlineKeyboardMarkup {
    let mut rows = Vec::with_capacity(3);
    if is_owner {
        rows.push(vec![InlineKeyboardButton::callback(
            "Owner Login",
            CB_LOGIN_OWNER,
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback("User Login", CB_LOGIN_USER)]);
    rows.push(back_row());
    InlineKeyboardMarkup::new(rows)
}

/// Stories and highlights
#[must_use]
pub fn stories_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Story", CB_SH_STORY),
            InlineKeyboardButton::callback("Highlights", CB_SH_HIGHLIGHTS),
        ],
        back_row(),
    ])
}

/// Keyboard for a menu
#[must_use]
pub fn menu_keyboard(menu: Menu, is_owner: bool) -> InlineKeyboardMarkup {
    match menu {
        Menu::Main => main_menu(),
        Menu::Download => download_menu(),
        Menu::Login => login_menu(is_owner),
        Menu::Stories => stories_menu(),
    }
}
