//! Page retrieval collaborator
//!
//! Extraction never touches the network; callers fetch markup through a
//! [`PageFetcher`] and hand the text to [`crate::pipeline::extract`]. The
//! rate limiter is an explicit resource owned by the fetcher's caller.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

/// Default request timeout for [`HttpFetcher`]
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Desktop browser user agents, rotated per request
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

/// How a page should be retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Plain HTTP GET of the raw markup
    #[default]
    Http,
    /// JavaScript-rendering browser session
    Browser,
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMethod::Http => write!(f, "http"),
            FetchMethod::Browser => write!(f, "browser"),
        }
    }
}

/// Source of raw page markup
pub trait PageFetcher {
    fn fetch(&self, url: &str, method: FetchMethod) -> Result<String>;
}

/// Sliding-window limiter: at most `max_calls` acquisitions per `period`.
/// `acquire` blocks until a slot is free.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn acquire(&self) {
        // timestamps stay valid after a panic elsewhere
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());

        let now = Instant::now();
        evict(&mut calls, now, self.period);

        if calls.len() >= self.max_calls {
            if let Some(oldest) = calls.front() {
                let wait = self.period.saturating_sub(now.duration_since(*oldest));
                if !wait.is_zero() {
                    debug!("Rate limit reached, sleeping {:?}", wait);
                    std::thread::sleep(wait);
                }
            }
            evict(&mut calls, Instant::now(), self.period);
        }

        calls.push_back(Instant::now());
    }
}

impl Default for RateLimiter {
    /// Five calls per second
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

fn evict(calls: &mut VecDeque<Instant>, now: Instant, period: Duration) {
    while let Some(oldest) = calls.front() {
        if now.duration_since(*oldest) >= period {
            calls.pop_front();
        } else {
            break;
        }
    }
}

/// Blocking HTTP fetcher built on ureq
pub struct HttpFetcher {
    agent: ureq::Agent,
    limiter: Arc<RateLimiter>,
    user_agents: Vec<String>,
    next_agent: AtomicUsize,
}

impl HttpFetcher {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self::with_timeout(limiter, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .http_status_as_error(false)
                .build(),
        );

        Self {
            agent,
            limiter,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            next_agent: AtomicUsize::new(0),
        }
    }

    /// Replace the rotated user-agent list; an empty list keeps the defaults
    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        if !user_agents.is_empty() {
            self.user_agents = user_agents;
        }
        self
    }

    fn user_agent(&self) -> &str {
        let i = self.next_agent.fetch_add(1, Ordering::Relaxed);
        &self.user_agents[i % self.user_agents.len()]
    }

    fn get(&self, url: &str) -> Result<String> {
        let fail = |reason: String| Error::Fetch {
            url: url.to_string(),
            reason,
        };

        let parsed = Url::parse(url).map_err(|e| fail(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(fail(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        self.limiter.acquire();
        info!("Fetching {}", url);

        let resp = self
            .agent
            .get(url)
            .header("User-Agent", self.user_agent())
            .call()
            .map_err(|e| fail(e.to_string()))?;

        if !resp.status().is_success() {
            warn!("HTTP {} for {}", resp.status(), url);
            return Err(fail(format!("HTTP {}", resp.status())));
        }

        resp.into_body()
            .read_to_string()
            .map_err(|e| fail(format!("unreadable body: {}", e)))
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str, method: FetchMethod) -> Result<String> {
        match method {
            FetchMethod::Http => self.get(url),
            FetchMethod::Browser => Err(Error::UnsupportedFetchMethod(method.to_string())),
        }
    }
}
