//! Headless Chrome fetcher

use crate::config::FetcherConfig;
use crate::fetcher::{FetchError, FetchedPage, PageFetcher};
use anyhow::anyhow;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Interval between resource count samples while waiting for network idle
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Time kept back from navigation for reading the title, markup and CSS
const CAPTURE_RESERVE: Duration = Duration::from_secs(2);

const RESOURCE_COUNT_SCRIPT: &str = "performance.getEntriesByType('resource').length";

const CAPTURE_CSS_SCRIPT: &str = r#"
(() => {
    const parts = [];
    for (const link of document.querySelectorAll('link[rel~="stylesheet"][href]')) {
        parts.push('@import url("' + link.href + '");');
    }
    for (const style of document.querySelectorAll('style')) {
        parts.push(style.textContent || '');
    }
    return parts.join('\n');
})()
"#;

/// Fetches pages with a fresh headless Chrome per call
///
/// Every fetch launches its own browser on a blocking thread and drops it
/// before returning, so no browser state leaks between jobs. The whole
/// session runs under one hard timeout.
#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    config: FetcherConfig,
}

impl BrowserFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    /// Hard limit on a whole fetch, launch included
    pub fn session_timeout(&self) -> Duration {
        self.config.session_timeout()
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let config = self.config.clone();
        let target = url.to_string();
        let limit = self.session_timeout();

        info!("Fetching {}", target);
        let started = Instant::now();

        let result = run_session(&target, limit, {
            let target = target.clone();
            move |session| render_page(&config, &target, &session)
        })
        .await;

        if let Ok(page) = &result {
            debug!(
                "Fetched {} in {:?} ({} bytes html, {} bytes css)",
                target,
                started.elapsed(),
                page.html.len(),
                page.css.len()
            );
        }
        result
    }
}

/// Time budget shared by every step of one browser session
#[derive(Debug, Clone)]
struct Session {
    started: Instant,
    limit: Duration,
    stop: Arc<AtomicBool>,
}

impl Session {
    fn deadline(&self) -> Instant {
        self.started + self.limit
    }

    fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }

    /// Set once the caller has given up on this session
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Latest point navigation may run to
    ///
    /// Normally `navigation_timeout` after navigation starts, but never past
    /// the session deadline less the capture reserve.
    fn navigation_deadline(&self, navigation_started: Instant, navigation_timeout: Duration) -> Instant {
        let own = navigation_started + navigation_timeout;
        let cap = self
            .deadline()
            .checked_sub(CAPTURE_RESERVE)
            .unwrap_or(self.started);
        own.min(cap)
    }

    /// Errors out when the session has run out of time or was stopped
    fn check(&self, url: &str) -> Result<(), FetchError> {
        if self.stopped() || Instant::now() >= self.deadline() {
            return Err(FetchError::Timeout {
                url: url.to_string(),
                millis: self.limit.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Runs `work` on a blocking thread under a hard `limit`
///
/// On timeout the session is told to stop and is joined before returning,
/// so the browser it owns is closed by the time the caller moves on.
async fn run_session<F>(url: &str, limit: Duration, work: F) -> Result<FetchedPage, FetchError>
where
    F: FnOnce(Session) -> Result<FetchedPage, FetchError> + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let session = Session {
        started: Instant::now(),
        limit,
        stop: Arc::clone(&stop),
    };
    let mut handle = tokio::task::spawn_blocking(move || work(session));

    let joined = match tokio::time::timeout(limit, &mut handle).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!("Fetch of {} exceeded {:?}; stopping the browser", url, limit);
            stop.store(true, Ordering::SeqCst);
            if let Err(join_error) = handle.await {
                warn!("Browser session for {} ended badly: {}", url, join_error);
            }
            return Err(FetchError::Timeout {
                url: url.to_string(),
                millis: limit.as_millis() as u64,
            });
        }
    };

    joined.map_err(|join_error| {
        FetchError::Crashed(format!(
            "browser session for {} panicked: {}",
            url, join_error
        ))
    })?
}

/// Runs one complete browser session
///
/// The browser is owned by this frame and is closed when it returns, on
/// success and failure alike. Each step checks the shared session deadline.
fn render_page(config: &FetcherConfig, url: &str, session: &Session) -> Result<FetchedPage, FetchError> {
    let browser = launch(config, session.remaining()).map_err(|e| FetchError::Launch(describe(&e)))?;
    session.check(url)?;

    let tab = browser
        .new_tab()
        .map_err(|e| FetchError::Launch(describe(&e)))?;
    session.check(url)?;

    let navigation_deadline = session.navigation_deadline(Instant::now(), config.navigation_timeout());
    tab.set_default_timeout(navigation_deadline.saturating_duration_since(Instant::now()));

    if let Some(user_agent) = &config.user_agent {
        tab.set_user_agent(user_agent, None, None)
            .map_err(|e| FetchError::Launch(describe(&e)))?;
    }

    tab.navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
        .map_err(|e| classify(url, config, e))?;
    session.check(url)?;

    wait_for_network_idle(
        || resource_count(&tab),
        config.network_idle(),
        navigation_deadline,
        &session.stop,
    )
    .map_err(|e| classify(url, config, e))?;
    session.check(url)?;

    tab.set_default_timeout(session.remaining().min(CAPTURE_RESERVE));
    let title = tab.get_title().map_err(|e| classify(url, config, e))?;
    let html = tab.get_content().map_err(|e| classify(url, config, e))?;
    let css = capture_css(&tab).map_err(|e| FetchError::Script(describe(&e)))?;

    Ok(FetchedPage { html, title, css })
}

fn launch(config: &FetcherConfig, remaining: Duration) -> anyhow::Result<Browser> {
    let options = LaunchOptions::default_builder()
        .headless(config.headless)
        .window_size(Some((config.window_width, config.window_height)))
        .idle_browser_timeout(remaining)
        .build()
        .map_err(|e| anyhow!("invalid launch options: {}", e))?;

    Browser::new(options)
}

/// Waits until the sampled resource count holds steady for `idle`
///
/// Returns `false` when `deadline` passes or `stop` is raised first; a
/// page that never settles is captured as is.
fn wait_for_network_idle<S>(
    mut sample: S,
    idle: Duration,
    deadline: Instant,
    stop: &AtomicBool,
) -> anyhow::Result<bool>
where
    S: FnMut() -> anyhow::Result<u64>,
{
    let mut last_count = sample()?;
    let mut stable_since = Instant::now();

    loop {
        if stable_since.elapsed() >= idle {
            return Ok(true);
        }
        if stop.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("Network never went idle; capturing with {} resources", last_count);
            return Ok(false);
        }

        thread::sleep(IDLE_POLL.min(remaining));

        let count = sample()?;
        if count != last_count {
            last_count = count;
            stable_since = Instant::now();
        }
    }
}

fn resource_count(tab: &Tab) -> anyhow::Result<u64> {
    let result = tab.evaluate(RESOURCE_COUNT_SCRIPT, false)?;
    Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0))
}

fn capture_css(tab: &Tab) -> anyhow::Result<String> {
    let result = tab.evaluate(CAPTURE_CSS_SCRIPT, false)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default())
}

/// Full error chain on one line
fn describe(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

/// Sorts a session error into the fetch error it represents
fn classify(url: &str, config: &FetcherConfig, err: anyhow::Error) -> FetchError {
    let message = describe(&err);
    let lower = message.to_lowercase();

    if lower.contains("timed out") || lower.contains("timeout") || lower.contains("never came") {
        FetchError::Timeout {
            url: url.to_string(),
            millis: config.navigation_timeout_ms,
        }
    } else if lower.contains("crash")
        || lower.contains("connection closed")
        || lower.contains("target closed")
        || lower.contains("disconnected")
    {
        FetchError::Crashed(message)
    } else {
        FetchError::Navigation {
            url: url.to_string(),
            message,
        }
    }
}
