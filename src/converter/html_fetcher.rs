use crate::converter::config::ConverterConfig;
use crate::converter::errors::{ConverterResult, FetchError};
use log::{debug, info, trace};
use spider::compact_str::CompactString;
use spider::features::chrome_common::{AutomationScriptsMap, WaitForDelay, WebAutomation};
use spider::hashbrown::HashMap;
use spider::website::Website;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Seconds of scrolling before the rendered page is captured
const SCROLL_SECONDS: u32 = 5;

/// Source of raw page HTML.
///
/// The conversion core only ever sees the returned text. Timeouts, rendering
/// and retries are the fetcher's business.
pub trait PageFetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        wait_after_load: Duration,
    ) -> impl Future<Output = ConverterResult<String>> + Send;
}

/// Fetches one page with spider, optionally through headless Chrome
#[derive(Debug, Clone)]
pub struct SpiderFetcher {
    user_agent: String,
    render_js: bool,
    scroll: bool,
}

impl SpiderFetcher {
    pub fn new(user_agent: &str, render_js: bool) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            render_js,
            scroll: false,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            render_js: config.js_render.render_js,
            scroll: config.js_render.scroll,
        }
    }

    /// Configure the crawl for `url`. The wait and the scroll run inside the
    /// browser before the page is captured.
    fn build_website(&self, url: &str, wait_after_load: Duration) -> Website {
        let mut website = Website::new(url);
        website.configuration.user_agent = Some(Box::new(CompactString::new(&self.user_agent)));
        // only the requested page
        website.with_depth(0);

        if self.render_js {
            website.with_chrome_intercept(Default::default());
            debug!("Chrome rendering enabled for {}", url);
            if !wait_after_load.is_zero() {
                debug!("Waiting {:?} after load of {}", wait_after_load, url);
                website.with_wait_for_delay(Some(WaitForDelay::new(Some(wait_after_load))));
            }
            if self.scroll {
                debug!("Scrolling {} for {}s before capture", url, SCROLL_SECONDS);
            }
            website.with_automation_scripts(page_automation(self.scroll));
        } else {
            // nothing renders, so there is nothing to wait for
            debug!("Plain HTTP fetch for {}", url);
        }
        website
    }
}

/// Browser actions for every fetched page: an infinite scroll when enabled
fn page_automation(scroll: bool) -> Option<AutomationScriptsMap> {
    if !scroll {
        return None;
    }
    let mut scripts = HashMap::new();
    // "/" matches every path
    scripts.insert("/".to_string(), vec![WebAutomation::InfiniteScroll(SCROLL_SECONDS)]);
    Some(scripts)
}

/// Only absolute http(s) URLs can be fetched
pub fn validate_url(url: &str) -> ConverterResult<Url> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::InvalidUrl(format!("unsupported scheme '{}' in {}", other, url)).into()),
    }
}

impl PageFetcher for SpiderFetcher {
    async fn fetch(
        &self,
        url: &str,
        fetch_timeout: Duration,
        wait_after_load: Duration,
    ) -> ConverterResult<String> {
        validate_url(url)?;
        trace!("Fetching {} (timeout {:?})", url, fetch_timeout);

        let mut website = self.build_website(url, wait_after_load);
        if timeout(fetch_timeout, website.scrape()).await.is_err() {
            return Err(FetchError::Timeout {
                url: url.to_string(),
                seconds: fetch_timeout.as_secs(),
            }
            .into());
        }

        let pages = website
            .get_pages()
            .ok_or_else(|| FetchError::NoPage(url.to_string()))?;
        let page = pages
            .first()
            .ok_or_else(|| FetchError::NoPage(url.to_string()))?;
        let html = page.get_html();

        if html.trim().is_empty() {
            return Err(FetchError::RequestFailed(format!("{} returned an empty document", url)).into());
        }
        info!("Fetched {} bytes from {}", html.len(), url);
        Ok(html)
    }
}
