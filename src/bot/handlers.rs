//! Per-request handler boundary
//!
//! Runs one [`Action`] to completion. Fetch failures never leave this module:
//! each one is turned into a message for the requester. Only gateway errors
//! propagate to the caller, which logs them.

use crate::bot::conversation::{extract_shortcode, Action};
use crate::bot::delivery::{deliver, deliver_archives, DeliveryReport};
use crate::bot::gateway::ChatGateway;
use crate::bot::views;
use crate::fetch::{FetchError, Fetcher};
use anyhow::Result;
use tracing::{info, warn};

/// Run an action for a requester, reporting every outcome through `gateway`.
///
/// # Errors
///
/// Returns an error only if a message cannot be sent.
pub async fn execute(
    action: Action,
    requester_id: i64,
    gateway: &dyn ChatGateway,
    fetcher: &Fetcher,
) -> Result<()> {
    info!(user_id = requester_id, action = action.label(), "Handling request");

    match action {
        Action::DownloadLink(text) => download_link(requester_id, &text, gateway, fetcher).await,
        Action::ProfileInfo(username) => {
            profile_info(requester_id, &username, gateway, fetcher).await
        }
        Action::ProfilePhoto(username) => {
            profile_photo(requester_id, &username, gateway, fetcher).await
        }
        Action::Login { username, password } => {
            login(requester_id, &username, &password, gateway, fetcher).await
        }
        Action::LoginDenied => gateway.send_text(views::OWNER_ONLY_LOGIN).await,
        Action::MalformedCredentials => gateway.send_text(views::CREDENTIALS_FORMAT).await,
        Action::Stories(username) => stories(requester_id, &username, gateway, fetcher).await,
        Action::Highlights(username) => {
            highlights(requester_id, &username, gateway, fetcher).await
        }
        Action::Unrecognized => gateway.send_text(views::UNRECOGNIZED).await,
    }
}

/// Message for a failed fetch: the flow's login hint or `<prefix>: <reason>`
fn failure_text(error: &FetchError, login_hint: &str, prefix: &str) -> String {
    if error.is_login_required() {
        login_hint.to_string()
    } else {
        views::failure(prefix, &error.to_string())
    }
}

fn log_delivery(requester_id: i64, flow: &str, report: &DeliveryReport) {
    if report.is_complete() {
        info!(user_id = requester_id, flow, sent = report.sent, "Delivery finished");
    } else {
        warn!(
            user_id = requester_id,
            flow,
            sent = report.sent,
            failed = ?report.failed,
            "Delivery incomplete"
        );
    }
}

async fn report_failure(
    requester_id: i64,
    gateway: &dyn ChatGateway,
    error: &FetchError,
    login_hint: &str,
    prefix: &str,
) -> Result<()> {
    warn!(user_id = requester_id, error = %error, "Request failed");
    gateway
        .send_text(&failure_text(error, login_hint, prefix))
        .await
}

async fn download_link(
    requester_id: i64,
    text: &str,
    gateway: &dyn ChatGateway,
    fetcher: &Fetcher,
) -> Result<()> {
    let Some(shortcode) = extract_shortcode(text) else {
        return gateway.send_text(views::BAD_LINK).await;
    };

    gateway.send_text(views::DOWNLOAD_STARTED).await?;

    match fetcher.download_post(requester_id, &shortcode).await {
        Ok(post) => {
            let report = deliver(gateway, &post.bundle, post.caption.as_deref()).await;
            log_delivery(requester_id, "post", &report);
            Ok(())
        }
        Err(e) => {
            report_failure(
                requester_id,
                gateway,
                &e,
                views::LOGIN_REQUIRED_POST,
                "Download failed",
            )
            .await
        }
    }
}

async fn profile_photo(
    requester_id: i64,
    username: &str,
    gateway: &dyn ChatGateway,
    fetcher: &Fetcher,
) -> Result<()> {
    match fetcher.download_profile_picture(requester_id, username).await {
        Ok((profile, bundle)) => {
            gateway
                .send_text(&views::profile_photo_header(&profile))
                .await?;
            let report = deliver(gateway, &bundle, None).await;
            log_delivery(requester_id, "profile_photo", &report);
            Ok(())
        }
        Err(e) => {
            report_failure(requester_id, gateway, &e, views::LOGIN_REQUIRED_PFP, "Failed").await
        }
    }
}

async fn profile_info(
    requester_id: i64,
    username: &str,
    gateway: &dyn ChatGateway,
    fetcher: &Fetcher,
) -> Result<()> {
    match fetcher.profile_info(requester_id, username).await {
        Ok(profile) => {
            gateway.send_html(&views::profile_info(&profile)).await?;
            profile_photo(requester_id, &profile.username, gateway, fetcher).await
        }
        Err(e) => {
            report_failure(
                requester_id,
                gateway,
                &e,
                views::LOGIN_REQUIRED_PROFILE,
                "Failed to fetch profile info",
            )
            .await
        }
    }
}

async fn login(
    requester_id: i64,
    username: &str,
    password: &str,
    gateway: &dyn ChatGateway,
    fetcher: &Fetcher,
) -> Result<()> {
    gateway.send_text(views::LOGIN_STARTED).await?;

    match fetcher.login(requester_id, username, password).await {
        Ok(()) => gateway.send_text(views::LOGIN_OK).await,
        Err(e) => {
            warn!(user_id = requester_id, error = %e, "Login failed");
            gateway.send_text(&views::login_failed(&e.to_string())).await
        }
    }
}

async fn stories(
    requester_id: i64,
    username: &str,
    gateway: &dyn ChatGateway,
    fetcher: &Fetcher,
) -> Result<()> {
    match fetcher.download_stories(requester_id, username).await {
        Ok(stories) if stories.count == 0 => gateway.send_text(views::NO_STORIES).await,
        Ok(stories) => {
            let report = deliver(gateway, &stories.bundle, None).await;
            log_delivery(requester_id, "stories", &report);
            Ok(())
        }
        Err(e) => {
            report_failure(
                requester_id,
                gateway,
                &e,
                views::LOGIN_REQUIRED_STORIES,
                "Failed to download stories",
            )
            .await
        }
    }
}

async fn highlights(
    requester_id: i64,
    username: &str,
    gateway: &dyn ChatGateway,
    fetcher: &Fetcher,
) -> Result<()> {
    match fetcher.download_highlights(requester_id, username).await {
        Ok(highlights) if highlights.count == 0 => {
            gateway.send_text(views::NO_HIGHLIGHTS).await
        }
        Ok(highlights) => {
            let report = deliver_archives(gateway, &highlights.archives).await;
            log_delivery(requester_id, "highlights", &report);
            Ok(())
        }
        Err(e) => {
            report_failure(
                requester_id,
                gateway,
                &e,
                views::LOGIN_REQUIRED_HIGHLIGHTS,
                "Failed to download highlights",
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorError;
    use crate::platform::PlatformError;

    #[test]
    fn test_login_required_uses_flow_hint() {
        let text = failure_text(
            &FetchError::Platform(PlatformError::LoginRequired),
            views::LOGIN_REQUIRED_POST,
            "Download failed",
        );
        assert_eq!(text, views::LOGIN_REQUIRED_POST);

        let text = failure_text(
            &FetchError::SessionRequired,
            views::LOGIN_REQUIRED_STORIES,
            "Failed to download stories",
        );
        assert_eq!(text, views::LOGIN_REQUIRED_STORIES);
    }

    #[test]
    fn test_other_failures_include_reason() {
        let text = failure_text(
            &FetchError::Platform(PlatformError::NotFound("post ABC".into())),
            views::LOGIN_REQUIRED_POST,
            "Download failed",
        );
        assert_eq!(text, "Download failed: not found: post ABC");

        let text = failure_text(
            &FetchError::Executor(ExecutorError::Shutdown),
            views::LOGIN_REQUIRED_PFP,
            "Failed",
        );
        assert_eq!(text, "Failed: worker pool is shut down");
    }
}
