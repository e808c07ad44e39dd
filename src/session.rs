//! Browser session used for all Scholar lookups.
//!
//! A run owns exactly one session: it is opened before the first query,
//! reused for every title and closed at the end. The [`WebSession`] trait is
//! the seam between the query logic and the browser engine (Chromium via
//! chromiumoxide).

use crate::config::SessionConfig;
use crate::error::{CiteError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Operations the lookup needs from a live browser tab.
#[async_trait]
pub trait WebSession: Send {
    /// Load `url` and wait for the navigation to finish.
    async fn navigate(&mut self, url: &str) -> Result<()>;
    /// Clear the input named `input_name`, type `text` and press Enter.
    async fn submit_search(&mut self, input_name: &str, text: &str) -> Result<()>;
    /// Whether the current document has an element with this DOM id.
    async fn element_exists(&mut self, dom_id: &str) -> Result<bool>;
    /// Serialized DOM of the current page.
    async fn page_html(&mut self) -> Result<String>;
    /// Shut the browser down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Close a session, logging instead of propagating failures.
pub async fn close_session(session: Box<dyn WebSession>) {
    match session.close().await {
        Ok(()) => info!("Browser closed"),
        Err(e) => warn!(error = %e, "Failed to close browser cleanly"),
    }
}

/// Quote a string for embedding in a JavaScript expression.
fn js_string(value: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CiteError::Browser(e.to_string()))
}

fn browser_err(context: &str) -> impl Fn(chromiumoxide::error::CdpError) -> CiteError + '_ {
    move |e| CiteError::Browser(format!("{}: {}", context, e))
}

/// Chromium tab driven over the DevTools protocol.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    /// Launch a maximized Chromium window and open one tab.
    ///
    /// # Errors
    ///
    /// Returns `CiteError::SessionInit` if the executable does not exist or
    /// the browser fails to start.
    pub async fn open(config: &SessionConfig) -> Result<Self> {
        let driver = &config.driver_path;
        if !driver.is_file() {
            return Err(CiteError::SessionInit(format!(
                "browser executable not found at {:?}",
                driver
            )));
        }

        let mut builder = BrowserConfig::builder()
            .chrome_executable(driver)
            .viewport(None)
            .arg("--start-maximized")
            .arg("--disable-blink-features=AutomationControlled");

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(profile) = &config.profile_dir {
            std::fs::create_dir_all(profile).map_err(|e| {
                CiteError::SessionInit(format!("cannot create profile dir {:?}: {}", profile, e))
            })?;
            builder = builder.user_data_dir(profile);
        }

        let browser_config = builder
            .build()
            .map_err(|e| CiteError::SessionInit(format!("invalid browser config: {}", e)))?;

        info!(driver = %driver.display(), headless = config.headless, "Launching browser");

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CiteError::SessionInit(format!("failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(CiteError::SessionInit(format!("failed to open tab: {}", e)));
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

#[async_trait]
impl WebSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!(url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(browser_err("navigation failed"))?;
        Ok(())
    }

    async fn submit_search(&mut self, input_name: &str, text: &str) -> Result<()> {
        let selector = format!("input[name={}]", js_string(input_name)?);
        let input = self
            .page
            .find_element(selector.as_str())
            .await
            .map_err(browser_err("search input not found"))?;

        input
            .click()
            .await
            .map_err(browser_err("cannot focus search input"))?;
        input
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(browser_err("cannot clear search input"))?;
        input
            .type_str(text)
            .await
            .map_err(browser_err("cannot type search term"))?;
        input
            .press_key("Enter")
            .await
            .map_err(browser_err("cannot submit search"))?;

        self.page
            .wait_for_navigation()
            .await
            .map_err(browser_err("results page did not load"))?;
        Ok(())
    }

    async fn element_exists(&mut self, dom_id: &str) -> Result<bool> {
        let script = format!("document.getElementById({}) !== null", js_string(dom_id)?);
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(browser_err("DOM lookup failed"))?;
        result
            .into_value::<bool>()
            .map_err(|e| CiteError::Browser(format!("unexpected DOM lookup result: {}", e)))
    }

    async fn page_html(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(browser_err("failed to read page content"))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let closed = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(browser_err("close failed"));
        if closed.is_ok() {
            if let Err(e) = self.browser.wait().await {
                warn!(error = %e, "Browser process did not exit cleanly");
            }
        }
        self.handler.abort();
        closed
    }
}
