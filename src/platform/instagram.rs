//! Instagram web API client
//!
//! Blocking `reqwest` client with a cookie jar. The jar is the session: it is
//! exported as a small JSON blob (cookies only, never the password) and
//! restored on the next request from the same requester.

use super::{
    ClientFactory, Highlight, MediaKind, MediaResource, PlatformClient, PlatformError, Post,
    Profile, StoryItem,
};
use reqwest::blocking::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://www.instagram.com/";
const LOGIN_PAGE: &str = "https://www.instagram.com/accounts/login/";
const WEB_APP_ID: &str = "936619743392459";
const COOKIE_DOMAIN: &str = ".instagram.com";

/// Default desktop browser user agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Shortcode alphabet; a shortcode is the media id written in base 64.
const SHORTCODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Shortcodes of private posts carry a suffix after the first 11 characters.
const SHORTCODE_ID_LEN: usize = 11;

/// Factory producing [`InstagramClient`] instances
#[derive(Debug, Clone)]
pub struct InstagramFactory {
    user_agent: String,
    timeout: Option<Duration>,
}

impl InstagramFactory {
    /// Create a factory; `timeout` of `None` leaves HTTP calls unbounded.
    #[must_use]
    pub fn new(user_agent: Option<String>, timeout: Option<Duration>) -> Self {
        Self {
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout,
        }
    }
}

impl ClientFactory for InstagramFactory {
    fn build(&self) -> Result<Box<dyn PlatformClient>, PlatformError> {
        Ok(Box::new(InstagramClient::new(&self.user_agent, self.timeout)?))
    }
}

/// Instagram web client
pub struct InstagramClient {
    http: Client,
    jar: Arc<Jar>,
    base: Url,
    username: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SessionBlob {
    username: Option<String>,
    cookies: String,
}

impl InstagramClient {
    /// Build a client with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Http` if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, PlatformError> {
        let base = Url::parse(BASE_URL).map_err(|e| PlatformError::Http(e.to_string()))?;
        let jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert("X-IG-App-ID", HeaderValue::from_static(WEB_APP_ID));

        let http = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        Ok(Self {
            http,
            jar,
            base,
            username: None,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, PlatformError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| PlatformError::Http(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base)
            .and_then(|v| v.to_str().ok().map(ToString::to_string))
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.cookie_header()?;
        header.split("; ").find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let url = self.endpoint(path, query)?;
        debug!(path = %path, "Instagram API request");

        let resp = self
            .http
            .get(url)
            .header(REFERER, BASE_URL)
            .send()
            .map_err(|e| PlatformError::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        classify_response(status, &body)?;
        serde_json::from_str(&body).map_err(|e| PlatformError::UnexpectedResponse(e.to_string()))
    }

    fn reel_items(&self, reel_id: &str) -> Result<Vec<StoryItem>, PlatformError> {
        let resp: ReelsMediaResponse =
            self.get_json("api/v1/feed/reels_media/", &[("reel_ids", reel_id)])?;
        Ok(resp
            .reels_media
            .into_iter()
            .flat_map(|reel| reel.items)
            .filter_map(ApiMediaItem::into_story_item)
            .collect())
    }
}

impl PlatformClient for InstagramClient {
    fn login(&mut self, username: &str, password: &str) -> Result<(), PlatformError> {
        // Visiting the login page sets the csrftoken cookie
        self.http
            .get(LOGIN_PAGE)
            .send()
            .map_err(|e| PlatformError::Http(e.to_string()))?;
        let csrf = self.cookie("csrftoken").unwrap_or_default();

        let enc_password = format!(
            "#PWD_INSTAGRAM_BROWSER:0:{}:{password}",
            chrono::Utc::now().timestamp()
        );
        let url = self.endpoint("api/v1/web/accounts/login/ajax/", &[])?;
        let resp = self
            .http
            .post(url)
            .header("X-CSRFToken", csrf)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(REFERER, LOGIN_PAGE)
            .form(&[
                ("username", username),
                ("enc_password", enc_password.as_str()),
                ("queryParams", "{}"),
                ("optIntoOneTap", "false"),
            ])
            .send()
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PlatformError::RateLimited);
        }
        let body = resp
            .text()
            .map_err(|e| PlatformError::Http(e.to_string()))?;
        let outcome: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| PlatformError::UnexpectedResponse(e.to_string()))?;

        outcome.into_result()?;
        self.username = Some(username.to_string());
        Ok(())
    }

    fn fetch_post(&mut self, shortcode: &str) -> Result<Post, PlatformError> {
        let media_id = shortcode_to_media_id(shortcode)
            .ok_or_else(|| PlatformError::NotFound(format!("invalid shortcode {shortcode}")))?;
        let resp: MediaInfoResponse =
            self.get_json(&format!("api/v1/media/{media_id}/info/"), &[])?;
        let item = resp
            .items
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::NotFound(format!("post {shortcode}")))?;

        let caption = item
            .caption
            .as_ref()
            .map(|c| c.text.trim().to_string())
            .filter(|c| !c.is_empty());
        Ok(Post {
            shortcode: shortcode.to_string(),
            caption,
            taken_at: item.taken_at,
            media: item.resources(),
        })
    }

    fn fetch_profile(&mut self, username: &str) -> Result<Profile, PlatformError> {
        let resp: WebProfileResponse =
            self.get_json("api/v1/users/web_profile_info/", &[("username", username)])?;
        let user = resp
            .data
            .user
            .ok_or_else(|| PlatformError::NotFound(format!("profile {username}")))?;
        user.into_profile()
    }

    fn fetch_stories(&mut self, user_id: u64) -> Result<Vec<StoryItem>, PlatformError> {
        self.reel_items(&user_id.to_string())
    }

    fn fetch_highlights(&mut self, user_id: u64) -> Result<Vec<Highlight>, PlatformError> {
        let tray: HighlightsTray =
            self.get_json(&format!("api/v1/highlights/{user_id}/highlights_tray/"), &[])?;

        let mut highlights = Vec::with_capacity(tray.tray.len());
        for entry in tray.tray {
            let items = self.reel_items(&entry.id)?;
            highlights.push(Highlight {
                unique_id: entry
                    .id
                    .strip_prefix("highlight:")
                    .unwrap_or(&entry.id)
                    .to_string(),
                title: entry.title,
                items,
            });
        }
        Ok(highlights)
    }

    fn download(&mut self, resource: &MediaResource, dest: &Path) -> Result<u64, PlatformError> {
        let mut resp = self
            .http
            .get(&resource.url)
            .send()
            .map_err(|e| PlatformError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            classify_response(status, "")?;
            return Err(PlatformError::Http(format!("media download returned {status}")));
        }

        let mut file = File::create(dest)?;
        resp.copy_to(&mut file)
            .map_err(|e| PlatformError::Http(e.to_string()))
    }

    fn export_session(&self) -> Result<Vec<u8>, PlatformError> {
        let blob = SessionBlob {
            username: self.username.clone(),
            cookies: self.cookie_header().unwrap_or_default(),
        };
        serde_json::to_vec(&blob).map_err(|e| PlatformError::UnexpectedResponse(e.to_string()))
    }

    fn import_session(&mut self, blob: &[u8]) -> Result<(), PlatformError> {
        let blob: SessionBlob = serde_json::from_slice(blob)
            .map_err(|e| PlatformError::UnexpectedResponse(format!("session blob: {e}")))?;
        if !blob.cookies.split("; ").any(|c| c.starts_with("sessionid=")) {
            return Err(PlatformError::UnexpectedResponse(
                "session blob has no sessionid cookie".to_string(),
            ));
        }

        for pair in blob.cookies.split("; ").filter(|p| !p.is_empty()) {
            self.jar.add_cookie_str(
                &format!("{pair}; Domain={COOKIE_DOMAIN}; Path=/"),
                &self.base,
            );
        }
        self.username = blob.username;
        Ok(())
    }
}

/// Maps a non-success status (or a login wall served as HTML) to a platform error.
fn classify_response(status: StatusCode, body: &str) -> Result<(), PlatformError> {
    if status.is_success() {
        // Anonymous requests for private data get redirected to the login page
        if body.trim_start().starts_with('<') && body.contains("/accounts/login") {
            return Err(PlatformError::LoginRequired);
        }
        return Ok(());
    }

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if body.contains("checkpoint_required") => {
            PlatformError::Checkpoint
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::LoginRequired,
        StatusCode::NOT_FOUND => PlatformError::NotFound(status.to_string()),
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimited,
        _ if body.contains("login_required") => PlatformError::LoginRequired,
        _ => PlatformError::Http(format!("unexpected status {status}")),
    })
}

/// Converts a shortcode into the numeric media id.
fn shortcode_to_media_id(shortcode: &str) -> Option<u128> {
    if shortcode.is_empty() {
        return None;
    }
    shortcode
        .bytes()
        .take(SHORTCODE_ID_LEN)
        .try_fold(0u128, |acc, b| {
            let digit = SHORTCODE_ALPHABET.iter().position(|&c| c == b)?;
            acc.checked_mul(64)?.checked_add(digit as u128)
        })
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LoginResponse {
    authenticated: Option<bool>,
    user: Option<bool>,
    two_factor_required: Option<bool>,
    checkpoint_url: Option<String>,
    message: Option<String>,
}

impl LoginResponse {
    fn into_result(self) -> Result<(), PlatformError> {
        if self.two_factor_required == Some(true) {
            return Err(PlatformError::TwoFactorRequired);
        }
        if self.checkpoint_url.is_some() {
            return Err(PlatformError::Checkpoint);
        }
        match (self.authenticated, self.user) {
            (Some(true), _) => Ok(()),
            (_, Some(false)) => Err(PlatformError::BadCredentials(
                "user does not exist".to_string(),
            )),
            _ => Err(PlatformError::BadCredentials(
                self.message
                    .unwrap_or_else(|| "wrong password".to_string()),
            )),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MediaInfoResponse {
    items: Vec<ApiMediaItem>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiMediaItem {
    id: Option<String>,
    taken_at: Option<i64>,
    caption: Option<ApiCaption>,
    image_versions2: Option<ImageVersions>,
    video_versions: Vec<Candidate>,
    carousel_media: Vec<ApiMediaItem>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiCaption {
    text: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ImageVersions {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    url: String,
}

impl ApiMediaItem {
    fn primary_resource(&self) -> Option<MediaResource> {
        if let Some(video) = self.video_versions.first() {
            return Some(MediaResource {
                url: video.url.clone(),
                kind: MediaKind::Video,
            });
        }
        self.image_versions2
            .as_ref()
            .and_then(|v| v.candidates.first())
            .map(|c| MediaResource {
                url: c.url.clone(),
                kind: MediaKind::Image,
            })
    }

    fn resources(&self) -> Vec<MediaResource> {
        if self.carousel_media.is_empty() {
            return self.primary_resource().into_iter().collect();
        }
        self.carousel_media
            .iter()
            .filter_map(Self::primary_resource)
            .collect()
    }

    fn into_story_item(self) -> Option<StoryItem> {
        let media = self.primary_resource()?;
        Some(StoryItem {
            id: self.id.unwrap_or_default(),
            taken_at: self.taken_at,
            media,
        })
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WebProfileResponse {
    data: WebProfileData,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WebProfileData {
    user: Option<WebUser>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WebUser {
    id: String,
    username: String,
    full_name: Option<String>,
    biography: Option<String>,
    is_private: bool,
    profile_pic_url: Option<String>,
    profile_pic_url_hd: Option<String>,
    edge_owner_to_timeline_media: EdgeCount,
    edge_followed_by: EdgeCount,
    edge_follow: EdgeCount,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct EdgeCount {
    count: u64,
}

impl WebUser {
    fn into_profile(self) -> Result<Profile, PlatformError> {
        let user_id = self
            .id
            .parse()
            .map_err(|_| PlatformError::UnexpectedResponse(format!("user id {:?}", self.id)))?;
        Ok(Profile {
            user_id,
            username: self.username,
            full_name: self.full_name.unwrap_or_default(),
            biography: self.biography.unwrap_or_default(),
            media_count: self.edge_owner_to_timeline_media.count,
            followers: self.edge_followed_by.count,
            following: self.edge_follow.count,
            is_private: self.is_private,
            profile_pic_url: self.profile_pic_url_hd.or(self.profile_pic_url),
        })
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ReelsMediaResponse {
    reels_media: Vec<ApiReel>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiReel {
    items: Vec<ApiMediaItem>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct HighlightsTray {
    tray: Vec<TrayEntry>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TrayEntry {
    id: String,
    title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcode_to_media_id() {
        assert_eq!(shortcode_to_media_id("A"), Some(0));
        assert_eq!(shortcode_to_media_id("B"), Some(1));
        assert_eq!(shortcode_to_media_id("BA"), Some(64));
        assert_eq!(shortcode_to_media_id("_"), Some(63));
        assert_eq!(shortcode_to_media_id("a!"), None);
        assert_eq!(shortcode_to_media_id(""), None);
    }

    #[test]
    fn test_private_shortcode_suffix_ignored() {
        let public = shortcode_to_media_id("ABCDEFGHIJK");
        let private = shortcode_to_media_id("ABCDEFGHIJKxyz123");
        assert!(public.is_some());
        assert_eq!(public, private);
    }

    #[test]
    fn test_classify_response() {
        assert!(classify_response(StatusCode::OK, "{}").is_ok());
        assert!(matches!(
            classify_response(StatusCode::OK, "<html><a href=\"/accounts/login/\">"),
            Err(PlatformError::LoginRequired)
        ));
        assert!(matches!(
            classify_response(StatusCode::UNAUTHORIZED, "{}"),
            Err(PlatformError::LoginRequired)
        ));
        assert!(matches!(
            classify_response(StatusCode::FORBIDDEN, "{\"message\":\"checkpoint_required\"}"),
            Err(PlatformError::Checkpoint)
        ));
        assert!(matches!(
            classify_response(StatusCode::NOT_FOUND, ""),
            Err(PlatformError::NotFound(_))
        ));
        assert!(matches!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, ""),
            Err(PlatformError::RateLimited)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_REQUEST, "{\"message\":\"login_required\"}"),
            Err(PlatformError::LoginRequired)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_GATEWAY, ""),
            Err(PlatformError::Http(_))
        ));
    }

    #[test]
    fn test_login_response_outcomes() {
        let ok: LoginResponse =
            serde_json::from_str(r#"{"authenticated":true,"user":true,"userId":"1"}"#)
                .expect("valid json");
        assert!(ok.into_result().is_ok());

        let two_factor: LoginResponse =
            serde_json::from_str(r#"{"two_factor_required":true}"#).expect("valid json");
        assert!(matches!(
            two_factor.into_result(),
            Err(PlatformError::TwoFactorRequired)
        ));

        let bad: LoginResponse =
            serde_json::from_str(r#"{"authenticated":false,"user":true}"#).expect("valid json");
        assert!(matches!(
            bad.into_result(),
            Err(PlatformError::BadCredentials(_))
        ));
    }

    #[test]
    fn test_carousel_resources_expand_in_order() {
        let json = r#"{
            "items": [{
                "taken_at": 1700000000,
                "caption": {"text": "hello"},
                "carousel_media": [
                    {"image_versions2": {"candidates": [{"url": "https://cdn/1.jpg"}]}},
                    {"video_versions": [{"url": "https://cdn/2.mp4"}],
                     "image_versions2": {"candidates": [{"url": "https://cdn/2.jpg"}]}}
                ]
            }]
        }"#;
        let resp: MediaInfoResponse = serde_json::from_str(json).expect("valid json");
        let resources = resp.items[0].resources();

        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].kind, MediaKind::Image);
        assert_eq!(resources[1].kind, MediaKind::Video);
        assert_eq!(resources[1].url, "https://cdn/2.mp4");
    }

    #[test]
    fn test_web_user_into_profile() {
        let json = r#"{"data": {"user": {
            "id": "123",
            "username": "john.doe_99",
            "full_name": "John",
            "biography": null,
            "is_private": true,
            "profile_pic_url_hd": "https://cdn/pfp.jpg",
            "edge_owner_to_timeline_media": {"count": 5},
            "edge_followed_by": {"count": 10},
            "edge_follow": {"count": 7}
        }}}"#;
        let resp: WebProfileResponse = serde_json::from_str(json).expect("valid json");
        let profile = resp
            .data
            .user
            .expect("user present")
            .into_profile()
            .expect("numeric id");

        assert_eq!(profile.user_id, 123);
        assert_eq!(profile.biography, "");
        assert_eq!(profile.followers, 10);
        assert!(profile.is_private);
        assert_eq!(profile.profile_pic_url.as_deref(), Some("https://cdn/pfp.jpg"));
    }
}
