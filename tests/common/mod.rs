//! Shared fakes for integration tests: an in-memory platform and a
//! gateway that records everything it is asked to send.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use igfetch_bot::bot::ChatGateway;
use igfetch_bot::executor::BlockingExecutor;
use igfetch_bot::fetch::Fetcher;
use igfetch_bot::platform::{
    ClientFactory, Highlight, MediaKind, MediaResource, PlatformClient, PlatformError, Post,
    Profile, StoryItem,
};
use igfetch_bot::session::SessionStore;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const SESSION_BLOB: &[u8] = b"fake-session-cookies";
pub const PASSWORD: &str = "secret1";

pub fn image(url: &str) -> MediaResource {
    MediaResource {
        url: url.to_string(),
        kind: MediaKind::Image,
    }
}

pub fn story(id: &str, taken_at: i64) -> StoryItem {
    StoryItem {
        id: id.to_string(),
        taken_at: Some(taken_at),
        media: image(&format!("https://cdn.example/{id}.jpg")),
    }
}

/// Platform contents every client built by the factory sees
#[derive(Clone, Default)]
pub struct FakePlatform {
    pub private_posts: HashSet<String>,
    pub private_profiles: HashSet<String>,
    pub stories: Vec<StoryItem>,
    pub highlights: Vec<Highlight>,
}

pub struct FakeClient {
    platform: FakePlatform,
    logged_in: bool,
}

impl PlatformClient for FakeClient {
    fn login(&mut self, _username: &str, password: &str) -> Result<(), PlatformError> {
        if password == PASSWORD {
            self.logged_in = true;
            Ok(())
        } else {
            Err(PlatformError::BadCredentials("The password you entered is incorrect".into()))
        }
    }

    fn fetch_post(&mut self, shortcode: &str) -> Result<Post, PlatformError> {
        if self.platform.private_posts.contains(shortcode) && !self.logged_in {
            return Err(PlatformError::LoginRequired);
        }
        Ok(Post {
            shortcode: shortcode.to_string(),
            caption: Some(format!("caption of {shortcode}")),
            taken_at: Some(1_700_000_000),
            media: vec![
                image(&format!("https://cdn.example/{shortcode}/1.jpg")),
                image(&format!("https://cdn.example/{shortcode}/2.jpg")),
            ],
        })
    }

    fn fetch_profile(&mut self, username: &str) -> Result<Profile, PlatformError> {
        if username == "ghost" {
            return Err(PlatformError::NotFound(format!("profile {username}")));
        }
        let is_private = self.platform.private_profiles.contains(username);
        if is_private && !self.logged_in {
            return Err(PlatformError::LoginRequired);
        }
        Ok(Profile {
            user_id: 42,
            username: username.to_string(),
            full_name: "John Doe".into(),
            biography: "hello".into(),
            media_count: 3,
            followers: 10,
            following: 5,
            is_private,
            profile_pic_url: Some("https://cdn.example/pfp.jpg".into()),
        })
    }

    fn fetch_stories(&mut self, _user_id: u64) -> Result<Vec<StoryItem>, PlatformError> {
        Ok(self.platform.stories.clone())
    }

    fn fetch_highlights(&mut self, _user_id: u64) -> Result<Vec<Highlight>, PlatformError> {
        Ok(self.platform.highlights.clone())
    }

    fn download(&mut self, resource: &MediaResource, dest: &Path) -> Result<u64, PlatformError> {
        fs::write(dest, resource.url.as_bytes())?;
        Ok(resource.url.len() as u64)
    }

    fn export_session(&self) -> Result<Vec<u8>, PlatformError> {
        if self.logged_in {
            Ok(SESSION_BLOB.to_vec())
        } else {
            Err(PlatformError::LoginRequired)
        }
    }

    fn import_session(&mut self, blob: &[u8]) -> Result<(), PlatformError> {
        if blob == SESSION_BLOB {
            self.logged_in = true;
            Ok(())
        } else {
            Err(PlatformError::UnexpectedResponse("unknown session format".into()))
        }
    }
}

pub struct FakeFactory {
    pub platform: FakePlatform,
}

impl ClientFactory for FakeFactory {
    fn build(&self) -> Result<Box<dyn PlatformClient>, PlatformError> {
        Ok(Box::new(FakeClient {
            platform: self.platform.clone(),
            logged_in: false,
        }))
    }
}

pub fn fetcher(root: &Path, platform: FakePlatform) -> Fetcher {
    Fetcher::new(
        Arc::new(FakeFactory { platform }),
        SessionStore::new(root.join("sessions")),
        BlockingExecutor::new(2, None),
        root.join("downloads"),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Html(String),
    Document(PathBuf, Option<String>),
}

#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingGateway {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("lock").clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<(PathBuf, Option<String>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Document(p, c) => Some((p, c)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, item: Sent) {
        self.sent.lock().expect("lock").push(item);
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.push(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_html(&self, html: &str) -> Result<()> {
        self.push(Sent::Html(html.to_string()));
        Ok(())
    }

    async fn send_document(&self, path: &Path, caption: Option<String>) -> Result<()> {
        self.push(Sent::Document(path.to_path_buf(), caption));
        Ok(())
    }
}
