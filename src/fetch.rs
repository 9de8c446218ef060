//! Fetch orchestration
//!
//! Every operation builds a fresh platform client on an executor worker,
//! optionally hydrates it from the session store, and runs fetch, staging
//! and packaging strictly in sequence on that worker. The async caller only
//! suspends on the hand-off.

use crate::executor::{BlockingExecutor, ExecutorError};
use crate::platform::{
    ClientFactory, MediaKind, MediaResource, PlatformClient, PlatformError, Profile,
};
use crate::session::{SessionError, SessionLoad, SessionStore};
use crate::staging::{self, DownloadJob, MediaBundle, TargetKind};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors surfaced by fetch operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// Platform rejected or failed the request
    #[error(transparent)]
    Platform(#[from] PlatformError),
    /// Worker pool failure
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// Session could not be persisted
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Staging folder error
    #[error("staging error: {0}")]
    Io(#[from] io::Error),
    /// Highlight packaging error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Operation needs a stored session and none is usable
    #[error("a saved login session is required")]
    SessionRequired,
}

impl FetchError {
    /// Whether the user should be pointed at the login flow
    #[must_use]
    pub const fn is_login_required(&self) -> bool {
        matches!(
            self,
            Self::SessionRequired | Self::Platform(PlatformError::LoginRequired)
        )
    }
}

/// Result of a post/reel download
#[derive(Debug, Clone)]
pub struct PostDownload {
    /// Post caption, if any
    pub caption: Option<String>,
    /// Staged media
    pub bundle: MediaBundle,
}

/// Result of a story download
#[derive(Debug, Clone)]
pub struct StoriesDownload {
    /// Items the platform returned
    pub count: usize,
    /// Staged media
    pub bundle: MediaBundle,
}

/// Result of a highlights download
#[derive(Debug, Clone)]
pub struct HighlightsDownload {
    /// Items across all highlights
    pub count: usize,
    /// One archive per highlight, in folder order
    pub archives: Vec<PathBuf>,
}

/// State shared with worker jobs
struct Inner {
    factory: Arc<dyn ClientFactory>,
    sessions: SessionStore,
    downloads: PathBuf,
}

impl Inner {
    /// Build a client, hydrated from the requester's stored session if asked.
    fn new_client(
        &self,
        session_for: Option<i64>,
    ) -> Result<(Box<dyn PlatformClient>, SessionLoad), PlatformError> {
        let mut client = self.factory.build()?;
        let load = match session_for {
            Some(requester_id) => self.sessions.hydrate(requester_id, client.as_mut()),
            None => SessionLoad::Missing,
        };
        Ok((client, load))
    }

    fn job(&self, requester_id: i64, kind: TargetKind, target: &str) -> DownloadJob {
        DownloadJob::new(&self.downloads, requester_id, kind, target)
    }
}

/// Client factory, session store and worker pool behind one async facade
pub struct Fetcher {
    inner: Arc<Inner>,
    executor: BlockingExecutor,
}

impl Fetcher {
    /// Create a fetcher writing staging trees under `downloads`
    #[must_use]
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        sessions: SessionStore,
        executor: BlockingExecutor,
        downloads: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                sessions,
                downloads: downloads.into(),
            }),
            executor,
        }
    }

    /// Session store used for hydration and login
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    async fn run<T, F>(&self, op: F) -> Result<T, FetchError>
    where
        F: FnOnce(&Inner) -> Result<T, FetchError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.executor.run(move || op(&inner)).await?
    }

    /// Log in with credentials and store the resulting session.
    ///
    /// # Errors
    ///
    /// Returns the platform error on rejected credentials or a session error
    /// if the blob cannot be written.
    pub async fn login(
        &self,
        requester_id: i64,
        username: &str,
        password: &str,
    ) -> Result<(), FetchError> {
        let username = username.to_string();
        let password = password.to_string();
        self.run(move |inner| {
            let (mut client, _) = inner.new_client(None)?;
            client.login(&username, &password)?;
            inner.sessions.save(requester_id, client.as_ref())?;
            info!(user_id = requester_id, account = %username, "Login session saved");
            Ok(())
        })
        .await
    }

    /// Download a post, reel or IGTV item by shortcode.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::LoginRequired` for private content without a
    /// usable session.
    pub async fn download_post(
        &self,
        requester_id: i64,
        shortcode: &str,
    ) -> Result<PostDownload, FetchError> {
        let shortcode = shortcode.to_string();
        self.run(move |inner| {
            let job = inner.job(requester_id, TargetKind::Post, &shortcode);
            job.prepare()?;
            let (mut client, _) = inner.new_client(Some(requester_id))?;

            let post = client.fetch_post(&shortcode)?;
            let stem =
                staging::timestamp_stem(post.taken_at).unwrap_or_else(|| job.target.clone());
            staging::write_post_media(client.as_mut(), &job.staging, &stem, &post.media)?;

            let bundle = job.bundle()?;
            info!(user_id = requester_id, target = %shortcode, files = bundle.len(), "Post staged");
            Ok(PostDownload {
                caption: post.caption.filter(|c| !c.trim().is_empty()),
                bundle,
            })
        })
        .await
    }

    /// Look up profile information.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::NotFound` for unknown usernames.
    pub async fn profile_info(
        &self,
        requester_id: i64,
        username: &str,
    ) -> Result<Profile, FetchError> {
        let username = username.to_string();
        self.run(move |inner| {
            let (mut client, _) = inner.new_client(Some(requester_id))?;
            Ok(client.fetch_profile(&username)?)
        })
        .await
    }

    /// Download the profile picture of `username`.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::NotFound` if the profile or its picture is missing.
    pub async fn download_profile_picture(
        &self,
        requester_id: i64,
        username: &str,
    ) -> Result<(Profile, MediaBundle), FetchError> {
        let username = username.to_string();
        self.run(move |inner| {
            let job = inner.job(requester_id, TargetKind::ProfilePicture, &username);
            job.prepare()?;
            let (mut client, _) = inner.new_client(Some(requester_id))?;

            let profile = client.fetch_profile(&username)?;
            let url = profile
                .profile_pic_url
                .clone()
                .ok_or_else(|| PlatformError::NotFound(format!("profile picture of {username}")))?;
            let resource = MediaResource {
                url,
                kind: MediaKind::Image,
            };
            let dest = job.staging.join(format!("{}_profile_pic.jpg", job.target));
            client.download(&resource, &dest)?;

            Ok((profile, job.bundle()?))
        })
        .await
    }

    /// Download current stories of `username`. Needs a stored session.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::SessionRequired` without a loaded session.
    pub async fn download_stories(
        &self,
        requester_id: i64,
        username: &str,
    ) -> Result<StoriesDownload, FetchError> {
        let username = username.to_string();
        self.run(move |inner| {
            let mut client = authenticated_client(inner, requester_id)?;
            let job = inner.job(requester_id, TargetKind::Story, &username);
            job.prepare()?;

            let profile = client.fetch_profile(&username)?;
            let items = client.fetch_stories(profile.user_id)?;
            let count = staging::write_story_items(client.as_mut(), &job.staging, &items)?;

            info!(user_id = requester_id, target = %username, count, "Stories staged");
            Ok(StoriesDownload {
                count,
                bundle: job.bundle()?,
            })
        })
        .await
    }

    /// Download all highlights of `username`, one archive per highlight.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::SessionRequired` without a loaded session.
    pub async fn download_highlights(
        &self,
        requester_id: i64,
        username: &str,
    ) -> Result<HighlightsDownload, FetchError> {
        let username = username.to_string();
        self.run(move |inner| {
            let mut client = authenticated_client(inner, requester_id)?;
            let job = inner.job(requester_id, TargetKind::Highlight, &username);
            job.prepare()?;

            let profile = client.fetch_profile(&username)?;
            let highlights = client.fetch_highlights(profile.user_id)?;
            let count = staging::write_highlights(client.as_mut(), &job.staging, &highlights)?;

            let archives = if count == 0 {
                Vec::new()
            } else {
                staging::archive_subfolders(&job.staging)?
            };
            info!(
                user_id = requester_id,
                target = %username,
                count,
                archives = archives.len(),
                "Highlights staged"
            );
            Ok(HighlightsDownload { count, archives })
        })
        .await
    }
}

fn authenticated_client(
    inner: &Inner,
    requester_id: i64,
) -> Result<Box<dyn PlatformClient>, FetchError> {
    let (client, load) = inner.new_client(Some(requester_id))?;
    match load {
        SessionLoad::Loaded => Ok(client),
        SessionLoad::Missing => Err(FetchError::SessionRequired),
        SessionLoad::Corrupt(reason) => {
            warn!(user_id = requester_id, %reason, "Stored session unusable");
            Err(FetchError::SessionRequired)
        }
    }
}
