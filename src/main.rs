use dotenvy::dotenv;
use igfetch_bot::config::Settings;
use igfetch_bot::executor::BlockingExecutor;
use igfetch_bot::fetch::Fetcher;
use igfetch_bot::platform::InstagramFactory;
use igfetch_bot::runner;
use igfetch_bot::session::SessionStore;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    cookie: Regex,
    cookie_json: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            cookie: Regex::new(r"(sessionid|csrftoken)=[^;\s&]+")?,
            cookie_json: Regex::new(r#""(sessionid|csrftoken)"\s*:\s*"[^"]*""#)?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self.cookie.replace_all(&output, "$1=[MASKED]").to_string();
        output = self
            .cookie_json
            .replace_all(&output, r#""$1":"[MASKED]""#)
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length even though the redacted text may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Instagram downloader bot...");

    let settings = init_settings();
    let fetcher = init_fetcher(&settings);

    runner::run_bot(settings, fetcher).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!(
                owner_configured = s.owner_id != 0,
                workers = s.worker_count(),
                "Configuration loaded successfully."
            );
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_fetcher(settings: &Settings) -> Arc<Fetcher> {
    for dir in [&settings.sessions_dir, &settings.downloads_dir] {
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!("Failed to create {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    }

    let executor = BlockingExecutor::new(settings.worker_count(), settings.fetch_timeout());

    let factory = Arc::new(InstagramFactory::new(
        settings.user_agent.clone(),
        settings.fetch_timeout(),
    ));

    Arc::new(Fetcher::new(
        factory,
        SessionStore::new(&settings.sessions_dir),
        executor,
        settings.downloads_dir.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_bot_token() {
        let patterns = RedactionPatterns::new().expect("patterns");
        let line = "GET https://api.telegram.org/bot123456789:AAEhBP0av28gTo0ZxTAWWLfXb_Nl0yqBL2c/getMe ";
        let out = patterns.redact(line);
        assert!(!out.contains("AAEhBP0av28"));
        assert!(out.contains("[TELEGRAM_TOKEN]"));
    }

    #[test]
    fn test_redacts_session_cookies() {
        let patterns = RedactionPatterns::new().expect("patterns");
        let out = patterns.redact(r#"cookie: sessionid=123%3Aabc; csrftoken=zzz {"sessionid": "s3cr3t"}"#);
        assert!(!out.contains("123%3Aabc"));
        assert!(!out.contains("zzz"));
        assert!(!out.contains("s3cr3t"));
        assert!(out.contains("sessionid=[MASKED]"));
    }
}
