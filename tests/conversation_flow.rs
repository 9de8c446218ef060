//! End-to-end flows: conversation → fetch → staging → delivery, against an
//! in-memory platform and a recording gateway.

mod common;

use common::{fetcher, story, FakePlatform, RecordingGateway, Sent};
use igfetch_bot::bot::handlers::execute;
use igfetch_bot::bot::{views, Action, Conversation};
use igfetch_bot::platform::Highlight;
use std::fs::{self, File};
use std::io::Read;

const REQUESTER: i64 = 1001;

async fn say(
    conversation: &Conversation,
    fetcher: &igfetch_bot::fetch::Fetcher,
    gateway: &RecordingGateway,
    text: &str,
) -> Action {
    let action = conversation.handle(REQUESTER, false, text).await;
    execute(action.clone(), REQUESTER, gateway, fetcher)
        .await
        .expect("gateway never fails");
    action
}

async fn press(conversation: &Conversation, data: &str) {
    conversation
        .on_callback(REQUESTER, false, data)
        .await
        .expect("known button");
}

#[tokio::test]
async fn test_login_then_private_post_downloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = FakePlatform {
        private_posts: ["SECRET1".to_string()].into(),
        ..FakePlatform::default()
    };
    let fetcher = fetcher(dir.path(), platform);
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    press(&conversation, views::CB_LOGIN_USER).await;
    say(&conversation, &fetcher, &gateway, "alice,secret1").await;

    assert_eq!(
        gateway.texts(),
        vec![views::LOGIN_STARTED.to_string(), views::LOGIN_OK.to_string()]
    );
    assert!(fetcher.sessions().exists(REQUESTER));
    assert_eq!(conversation.prompts().pending(REQUESTER).await, None);

    say(
        &conversation,
        &fetcher,
        &gateway,
        "https://www.instagram.com/p/SECRET1/",
    )
    .await;

    assert!(!gateway
        .texts()
        .contains(&views::LOGIN_REQUIRED_POST.to_string()));
    assert_eq!(gateway.documents().len(), 2);
}

#[tokio::test]
async fn test_private_link_without_session_reports_login_required() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = FakePlatform {
        private_posts: ["ABC123".to_string()].into(),
        ..FakePlatform::default()
    };
    let fetcher = fetcher(dir.path(), platform);
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    let action = say(
        &conversation,
        &fetcher,
        &gateway,
        "https://instagramexample.com/p/ABC123/",
    )
    .await;

    assert_eq!(
        action,
        Action::DownloadLink("https://instagramexample.com/p/ABC123/".into())
    );
    assert_eq!(
        gateway.texts(),
        vec![
            views::DOWNLOAD_STARTED.to_string(),
            views::LOGIN_REQUIRED_POST.to_string()
        ]
    );
    assert!(gateway.documents().is_empty());
}

#[tokio::test]
async fn test_wrong_password_reports_failure_and_clears_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = fetcher(dir.path(), FakePlatform::default());
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    press(&conversation, views::CB_LOGIN_USER).await;
    say(&conversation, &fetcher, &gateway, "alice,wrong").await;

    let texts = gateway.texts();
    assert!(texts[1].starts_with("❌ Login failed: bad credentials"));
    assert!(texts[1].contains("2FA"));
    assert!(!fetcher.sessions().exists(REQUESTER));
    assert_eq!(conversation.prompts().pending(REQUESTER).await, None);
}

#[tokio::test]
async fn test_username_autodetect_sends_profile_and_photo() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = fetcher(dir.path(), FakePlatform::default());
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    let action = say(&conversation, &fetcher, &gateway, "john.doe_99").await;
    assert_eq!(action, Action::ProfileInfo("john.doe_99".into()));

    let sent = gateway.sent();
    assert_eq!(sent.len(), 3);
    assert!(matches!(&sent[0], Sent::Html(h) if h.contains("Profile Info for: @john.doe_99")));
    assert_eq!(sent[1], Sent::Text("👤 @john.doe_99\nName: John Doe".into()));
    assert!(
        matches!(&sent[2], Sent::Document(p, None) if p.ends_with("pfp_1001_john.doe_99/john.doe_99_profile_pic.jpg"))
    );
}

#[tokio::test]
async fn test_unknown_profile_reports_reason() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = fetcher(dir.path(), FakePlatform::default());
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    say(&conversation, &fetcher, &gateway, "ghost").await;
    assert_eq!(
        gateway.texts(),
        vec!["Failed to fetch profile info: not found: profile ghost".to_string()]
    );
}

#[tokio::test]
async fn test_zero_stories_sends_notice_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = fetcher(dir.path(), FakePlatform::default());
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    fetcher
        .login(REQUESTER, "alice", common::PASSWORD)
        .await
        .expect("login");

    press(&conversation, views::CB_SH_STORY).await;
    say(&conversation, &fetcher, &gateway, "john").await;

    assert_eq!(gateway.sent(), vec![Sent::Text(views::NO_STORIES.into())]);
}

#[tokio::test]
async fn test_stories_without_session_point_to_login() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = FakePlatform {
        stories: vec![story("s1", 1_700_000_000)],
        ..FakePlatform::default()
    };
    let fetcher = fetcher(dir.path(), platform);
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    press(&conversation, views::CB_SH_STORY).await;
    say(&conversation, &fetcher, &gateway, "john").await;

    assert_eq!(
        gateway.sent(),
        vec![Sent::Text(views::LOGIN_REQUIRED_STORIES.into())]
    );
    assert_eq!(conversation.prompts().pending(REQUESTER).await, None);
}

#[tokio::test]
async fn test_stories_are_delivered_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = FakePlatform {
        stories: vec![story("s2", 1_700_000_060), story("s1", 1_700_000_000)],
        ..FakePlatform::default()
    };
    let fetcher = fetcher(dir.path(), platform);
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    fetcher
        .login(REQUESTER, "alice", common::PASSWORD)
        .await
        .expect("login");
    press(&conversation, views::CB_SH_STORY).await;
    say(&conversation, &fetcher, &gateway, "john").await;

    let names: Vec<String> = gateway
        .documents()
        .iter()
        .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(
        names,
        vec!["2023-11-14_22-13-20_UTC.jpg", "2023-11-14_22-14-20_UTC.jpg"]
    );
}

#[tokio::test]
async fn test_highlights_delivered_as_one_archive_each() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = FakePlatform {
        highlights: vec![
            Highlight {
                unique_id: "17901".into(),
                title: "Travel".into(),
                items: vec![story("a", 1_700_000_000), story("b", 1_700_000_060)],
            },
            Highlight {
                unique_id: "17902".into(),
                title: "Food".into(),
                items: vec![story("c", 1_700_000_120)],
            },
        ],
        ..FakePlatform::default()
    };
    let fetcher = fetcher(dir.path(), platform);
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    fetcher
        .login(REQUESTER, "alice", common::PASSWORD)
        .await
        .expect("login");
    press(&conversation, views::CB_SH_HIGHLIGHTS).await;
    say(&conversation, &fetcher, &gateway, "john").await;

    let docs = gateway.documents();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].1.as_deref(), Some("highlight_17901"));
    assert_eq!(docs[1].1.as_deref(), Some("highlight_17902"));
    assert!(docs[0].0.ends_with("highlights_1001_john/highlight_17901.zip"));

    let mut archive =
        zip::ZipArchive::new(File::open(&docs[0].0).expect("open")).expect("zip");
    let mut names: Vec<String> = archive.file_names().map(ToString::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["2023-11-14_22-13-20_UTC.jpg", "2023-11-14_22-14-20_UTC.jpg"]
    );

    let mut content = String::new();
    archive
        .by_name("2023-11-14_22-13-20_UTC.jpg")
        .expect("entry")
        .read_to_string(&mut content)
        .expect("read");
    assert_eq!(content, "https://cdn.example/a.jpg");
}

#[tokio::test]
async fn test_same_job_twice_yields_identical_bundle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = fetcher(dir.path(), FakePlatform::default());

    let first = fetcher.download_post(REQUESTER, "ABC123").await.expect("first");
    let second = fetcher
        .download_post(REQUESTER, "ABC123")
        .await
        .expect("second");

    assert_eq!(first.bundle, second.bundle);
    assert_eq!(first.bundle.len(), 2);
}

#[tokio::test]
async fn test_unrecognized_text_is_a_no_op_notice() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = fetcher(dir.path(), FakePlatform::default());
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    say(&conversation, &fetcher, &gateway, "what is this?").await;
    assert_eq!(gateway.sent(), vec![Sent::Text(views::UNRECOGNIZED.into())]);
}

#[tokio::test]
async fn test_bad_link_in_prompt_reports_and_clears() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = fetcher(dir.path(), FakePlatform::default());
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    press(&conversation, views::CB_DL_REEL).await;
    say(
        &conversation,
        &fetcher,
        &gateway,
        "https://www.instagram.com/john/",
    )
    .await;

    assert_eq!(gateway.sent(), vec![Sent::Text(views::BAD_LINK.into())]);
    assert_eq!(conversation.prompts().pending(REQUESTER).await, None);
}

#[tokio::test]
async fn test_login_then_private_profile_is_visible() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = FakePlatform {
        private_profiles: ["hidden.one".to_string()].into(),
        ..FakePlatform::default()
    };
    let fetcher = fetcher(dir.path(), platform);
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    press(&conversation, views::CB_LOGIN_USER).await;
    say(&conversation, &fetcher, &gateway, "alice,secret1").await;
    say(&conversation, &fetcher, &gateway, "hidden.one").await;

    assert!(!gateway
        .texts()
        .contains(&views::LOGIN_REQUIRED_PROFILE.to_string()));
    let sent = gateway.sent();
    assert!(sent
        .iter()
        .any(|s| matches!(s, Sent::Html(h) if h.contains("Profile Info for: @hidden.one"))));
    assert_eq!(gateway.documents().len(), 1);
}

#[tokio::test]
async fn test_private_profile_without_session_reports_login_required() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = FakePlatform {
        private_profiles: ["hidden.one".to_string()].into(),
        ..FakePlatform::default()
    };
    let fetcher = fetcher(dir.path(), platform);
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    say(&conversation, &fetcher, &gateway, "hidden.one").await;

    assert_eq!(
        gateway.sent(),
        vec![Sent::Text(views::LOGIN_REQUIRED_PROFILE.into())]
    );
}

#[tokio::test]
async fn test_corrupt_session_falls_back_to_anonymous_fetch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = fetcher(dir.path(), FakePlatform::default());
    let conversation = Conversation::new();
    let gateway = RecordingGateway::default();

    let blob = fetcher.sessions().path_for(REQUESTER);
    fs::create_dir_all(blob.parent().expect("sessions dir")).expect("mkdir");
    fs::write(&blob, b"not a session").expect("write");

    say(
        &conversation,
        &fetcher,
        &gateway,
        "https://www.instagram.com/p/OPEN01/",
    )
    .await;

    assert_eq!(gateway.texts(), vec![views::DOWNLOAD_STARTED.to_string()]);
    assert_eq!(gateway.documents().len(), 2);
}
