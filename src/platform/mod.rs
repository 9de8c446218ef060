//! External platform client abstraction
//!
//! Every call on [`PlatformClient`] performs synchronous network I/O and must
//! only run on a worker thread of [`crate::executor::BlockingExecutor`].

/// Instagram web client.
pub mod instagram;

use std::path::Path;
use thiserror::Error;

pub use instagram::{InstagramClient, InstagramFactory};

/// Errors reported by the external platform
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Content is private and no usable session is loaded
    #[error("login required")]
    LoginRequired,
    /// Username or password rejected
    #[error("bad credentials: {0}")]
    BadCredentials(String),
    /// Account has an interactive second factor enabled
    #[error("two-factor authentication required")]
    TwoFactorRequired,
    /// Platform asks for a security checkpoint in the browser
    #[error("checkpoint required, confirm the login in the Instagram app")]
    Checkpoint,
    /// Target does not exist or is not visible
    #[error("not found: {0}")]
    NotFound(String),
    /// Platform throttled the client
    #[error("rate limited, try again later")]
    RateLimited,
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),
    /// Response did not have the expected shape
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    /// Local file error while writing media
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of a single media resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video clip
    Video,
}

impl MediaKind {
    /// File extension used when the resource is written to disk
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
        }
    }
}

/// Downloadable media resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResource {
    /// Direct CDN URL
    pub url: String,
    /// Image or video
    pub kind: MediaKind,
}

/// A post, reel or IGTV item resolved by shortcode
#[derive(Debug, Clone, Default)]
pub struct Post {
    /// Shortcode the post was fetched by
    pub shortcode: String,
    /// Caption text, if any
    pub caption: Option<String>,
    /// Unix timestamp of publication
    pub taken_at: Option<i64>,
    /// All media in display order (carousel items expanded)
    pub media: Vec<MediaResource>,
}

/// Public profile information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Numeric platform user id
    pub user_id: u64,
    /// Canonical username
    pub username: String,
    /// Display name
    pub full_name: String,
    /// Biography text
    pub biography: String,
    /// Number of posts
    pub media_count: u64,
    /// Number of followers
    pub followers: u64,
    /// Number of followed accounts
    pub following: u64,
    /// Whether the account is private
    pub is_private: bool,
    /// Highest resolution profile picture URL
    pub profile_pic_url: Option<String>,
}

/// One story frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryItem {
    /// Platform item id
    pub id: String,
    /// Unix timestamp of publication
    pub taken_at: Option<i64>,
    /// Media of this frame
    pub media: MediaResource,
}

/// A named, persistent collection of story items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    /// Numeric part of the highlight id
    pub unique_id: String,
    /// Highlight title
    pub title: String,
    /// Items of this highlight
    pub items: Vec<StoryItem>,
}

/// Blocking client for the external platform.
pub trait PlatformClient: Send {
    /// Authenticate with username and password.
    ///
    /// # Errors
    ///
    /// Fails on bad credentials, second-factor or checkpoint challenges.
    fn login(&mut self, username: &str, password: &str) -> Result<(), PlatformError>;

    /// Fetch a post by shortcode.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::LoginRequired` for private content.
    fn fetch_post(&mut self, shortcode: &str) -> Result<Post, PlatformError>;

    /// Fetch profile information.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::NotFound` for unknown usernames.
    fn fetch_profile(&mut self, username: &str) -> Result<Profile, PlatformError>;

    /// Fetch current story items of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn fetch_stories(&mut self, user_id: u64) -> Result<Vec<StoryItem>, PlatformError>;

    /// Fetch all highlights of a user with their items.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn fetch_highlights(&mut self, user_id: u64) -> Result<Vec<Highlight>, PlatformError>;

    /// Download a media resource into `dest`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or file failures.
    fn download(&mut self, resource: &MediaResource, dest: &Path) -> Result<u64, PlatformError>;

    /// Serialize the authenticated session. Never contains the password.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_session(&self) -> Result<Vec<u8>, PlatformError>;

    /// Restore a session previously produced by [`PlatformClient::export_session`].
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::UnexpectedResponse` if the blob is corrupt.
    fn import_session(&mut self, blob: &[u8]) -> Result<(), PlatformError>;
}

/// Builds fresh platform clients.
///
/// `build` is only invoked from executor workers, so implementations may
/// construct blocking resources.
pub trait ClientFactory: Send + Sync + 'static {
    /// Build an unauthenticated client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be created.
    fn build(&self) -> Result<Box<dyn PlatformClient>, PlatformError>;
}
