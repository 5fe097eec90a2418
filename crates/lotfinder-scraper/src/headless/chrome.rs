//! Chrome-backed [`RenderedPage`] built on chromiumoxide.
//!
//! Each session launches its own browser process so that concurrent
//! queries never share cookies, storage or fingerprint state.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::split_cookie_header;
use super::stealth::stealth_scripts;
use crate::error::ScraperError;
use crate::fetcher::{RenderRequest, RenderedPage};
use crate::markup::selectors::HarvestPlan;
use crate::markup::RawCard;

const HARVEST_SCRIPT: &str = r"
(() => {
  const plan = __PLAN__;
  const detail = new RegExp(plan.detailPattern, 'i');
  const abs = (h) => { try { return new URL(h || '', location.href).href; } catch (e) { return ''; } };
  const text = (el) => ((el && (el.innerText || el.textContent)) || '').trim();
  const images = (scope) => {
    const out = [];
    scope.querySelectorAll(plan.image).forEach((img) => {
      plan.imageAttrs.forEach((name) => { const v = img.getAttribute(name); if (v) out.push(v); });
      ['srcset', 'data-srcset'].forEach((name) => {
        const v = img.getAttribute(name);
        const first = v ? v.split(',')[0].trim().split(/\s+/)[0] : '';
        if (first) out.push(first);
      });
    });
    return out;
  };
  const cards = [];
  document.querySelectorAll(plan.card).forEach((card) => {
    try {
      const anchors = card.matches(plan.anchor) ? [card] : [];
      card.querySelectorAll(plan.anchor).forEach((a) => anchors.push(a));
      const hits = anchors.filter((a) => detail.test(abs(a.getAttribute('href'))));
      const distinct = new Set(hits.map((a) => abs(a.getAttribute('href')).split(/[?#]/)[0]));
      if (distinct.size !== 1) return;
      const primary = hits.find((a) => text(a) || a.getAttribute('title')) || hits[0];
      const first = (sel) => Array.from(card.querySelectorAll(sel)).map(text).find((t) => t) || '';
      cards.push({
        href: abs(primary.getAttribute('href')),
        anchorTitle: primary.getAttribute('title') || '',
        anchorText: text(primary),
        headingText: first(plan.heading),
        imageCandidates: images(card),
        cardText: text(card),
        containerText: text(card.parentElement),
        storeText: first(plan.store),
      });
    } catch (e) {}
  });
  if (cards.length === 0) {
    document.querySelectorAll(plan.anchor).forEach((a) => {
      const href = abs(a.getAttribute('href'));
      if (detail.test(href)) {
        cards.push({ href, anchorTitle: a.getAttribute('title') || '', anchorText: text(a) });
      }
    });
  }
  return JSON.stringify(cards);
})()
";

fn browser_err(e: impl std::fmt::Display) -> ScraperError {
    ScraperError::Browser(e.to_string())
}

pub(crate) struct ChromePage {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromePage {
    /// Launches an isolated browser and prepares a blank page for `req`.
    ///
    /// A missing or unlaunchable Chrome is reported as [`ScraperError::Capability`].
    pub(crate) async fn launch(
        req: &RenderRequest,
        chrome_path: Option<&Path>,
        timeout_secs: u64,
    ) -> Result<Self, ScraperError> {
        let (locale, timezone) = req.platform.browser_locale();

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(timeout_secs.max(1)))
            .window_size(1366, 900)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg(format!("--lang={locale}"));
        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| ScraperError::Capability(format!("no usable Chrome executable: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::Capability(format!("browser launch failed: {e}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    tracing::debug!(error = %close_err, "browser close after failed page open");
                }
                handler.abort();
                return Err(browser_err(e));
            }
        };

        let mut session = Self {
            browser,
            page,
            handler,
            closed: false,
        };
        if let Err(e) = session.prepare(req, locale, timezone).await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn prepare(
        &self,
        req: &RenderRequest,
        locale: &str,
        timezone: &str,
    ) -> Result<(), ScraperError> {
        for script in stealth_scripts(locale) {
            self.page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
                .await
                .map_err(browser_err)?;
        }

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(req.user_agent.clone())
            .accept_language(req.platform.accept_language())
            .build()
            .map_err(ScraperError::Browser)?;
        self.page.execute(ua).await.map_err(browser_err)?;

        if let Err(e) = self
            .page
            .execute(SetTimezoneOverrideParams::new(timezone))
            .await
        {
            tracing::debug!(timezone, error = %e, "timezone override rejected");
        }
        let locale_override = SetLocaleOverrideParams {
            locale: Some(locale.to_owned()),
        };
        if let Err(e) = self.page.execute(locale_override).await {
            tracing::debug!(locale, error = %e, "locale override rejected");
        }

        if let Some(header) = req.cookie.as_deref() {
            for (name, value) in split_cookie_header(header) {
                let param = CookieParam::builder()
                    .name(name.clone())
                    .value(value)
                    .domain(req.platform.cookie_domain())
                    .path("/")
                    .build();
                match param {
                    Ok(param) => {
                        if let Err(e) = self.page.set_cookie(param).await {
                            tracing::warn!(cookie = %name, error = %e, "failed to inject cookie");
                        }
                    }
                    Err(e) => tracing::warn!(cookie = %name, error = %e, "invalid cookie"),
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RenderedPage for ChromePage {
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError> {
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn has_cookie(&mut self, name: &str) -> Result<bool, ScraperError> {
        let cookies = self.page.get_cookies().await.map_err(browser_err)?;
        Ok(cookies.iter().any(|c| c.name == name))
    }

    async fn anchor_count(&mut self) -> Result<usize, ScraperError> {
        self.page
            .evaluate("document.querySelectorAll('a[href]').length")
            .await
            .map_err(browser_err)?
            .into_value::<usize>()
            .map_err(browser_err)
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.page.content().await.map_err(browser_err)
    }

    async fn harvest_cards(&mut self, plan: &HarvestPlan) -> Result<Vec<RawCard>, ScraperError> {
        let plan_json = serde_json::to_string(plan).map_err(|e| ScraperError::Deserialize {
            context: "harvest plan".to_owned(),
            source: e,
        })?;
        let script = HARVEST_SCRIPT.replace("__PLAN__", &plan_json);
        let json: String = self
            .page
            .evaluate(script)
            .await
            .map_err(browser_err)?
            .into_value()
            .map_err(browser_err)?;
        serde_json::from_str(&json).map_err(|e| ScraperError::Deserialize {
            context: "harvested cards".to_owned(),
            source: e,
        })
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), ScraperError> {
        self.page
            .evaluate("window.scrollTo(0, document.body ? document.body.scrollHeight : 0); true")
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!(error = %e, "page close failed");
        }
        if let Err(e) = self.browser.close().await {
            tracing::debug!(error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "browser process wait failed");
        }
        self.handler.abort();
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
