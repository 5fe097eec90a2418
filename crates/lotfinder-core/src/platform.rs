//! Source marketplaces and the static per-site data the pipeline needs.
//!
//! Every URL template uses `{query}` and `{page}` placeholders. `{query}` is
//! percent-encoded before substitution; `{page}` is the 1-based page number.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Unreserved characters (RFC 3986) stay literal inside query values.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A source marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "alibaba")]
    Alibaba,
    #[serde(rename = "1688")]
    Alibaba1688,
    #[serde(rename = "made-in-china")]
    MadeInChina,
    #[serde(rename = "yiwugo")]
    Yiwugo,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Alibaba,
        Platform::Alibaba1688,
        Platform::MadeInChina,
        Platform::Yiwugo,
    ];

    /// Stable slug used on the command line, in config keys, and in logs.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Platform::Alibaba => "alibaba",
            Platform::Alibaba1688 => "1688",
            Platform::MadeInChina => "made-in-china",
            Platform::Yiwugo => "yiwugo",
        }
    }

    /// Scheme + host that relative listing URLs resolve against.
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Platform::Alibaba => "https://www.alibaba.com",
            Platform::Alibaba1688 => "https://detail.1688.com",
            Platform::MadeInChina => "https://www.made-in-china.com",
            Platform::Yiwugo => "https://en.yiwugo.com",
        }
    }

    /// Referer sent with static search requests.
    #[must_use]
    pub fn referer(self) -> &'static str {
        match self {
            Platform::Alibaba => "https://www.alibaba.com/",
            Platform::Alibaba1688 => "https://www.1688.com/",
            Platform::MadeInChina => "https://www.made-in-china.com/",
            Platform::Yiwugo => "https://en.yiwugo.com/",
        }
    }

    /// `Accept-Language` header value. 1688 serves Chinese-only markup.
    #[must_use]
    pub fn accept_language(self) -> &'static str {
        match self {
            Platform::Alibaba1688 => "zh-CN,zh;q=0.9,en;q=0.6",
            _ => "en-US,en;q=0.9,zh-CN;q=0.6",
        }
    }

    /// Locale and IANA timezone the headless context pretends to live in.
    #[must_use]
    pub fn browser_locale(self) -> (&'static str, &'static str) {
        match self {
            Platform::Alibaba1688 | Platform::Yiwugo => ("zh-CN", "Asia/Shanghai"),
            Platform::Alibaba | Platform::MadeInChina => ("en-US", "America/Los_Angeles"),
        }
    }

    /// Cookie domain used when injecting the configured session cookie.
    #[must_use]
    pub fn cookie_domain(self) -> &'static str {
        match self {
            Platform::Alibaba => ".alibaba.com",
            Platform::Alibaba1688 => ".1688.com",
            Platform::MadeInChina => ".made-in-china.com",
            Platform::Yiwugo => ".yiwugo.com",
        }
    }

    /// Name of the cookie the site sets once its anti-bot check has passed.
    #[must_use]
    pub fn anti_bot_cookie(self) -> &'static str {
        match self {
            Platform::Alibaba | Platform::Alibaba1688 => "x5sec",
            Platform::MadeInChina => "sf_token",
            Platform::Yiwugo => "acw_tc",
        }
    }

    /// Suffix of the `LOTFINDER_COOKIE_*` environment variable.
    #[must_use]
    pub fn cookie_env_suffix(self) -> &'static str {
        match self {
            Platform::Alibaba => "ALIBABA",
            Platform::Alibaba1688 => "1688",
            Platform::MadeInChina => "MADE_IN_CHINA",
            Platform::Yiwugo => "YIWUGO",
        }
    }

    fn desktop_search_template(self) -> &'static str {
        match self {
            Platform::Alibaba => "https://www.alibaba.com/trade/search?SearchText={query}&page={page}",
            Platform::Alibaba1688 => {
                "https://s.1688.com/selloffer/offer_search.htm?keywords={query}&beginPage={page}"
            }
            Platform::MadeInChina => {
                "https://www.made-in-china.com/productdirectory.do?word={query}&page={page}"
            }
            Platform::Yiwugo => "https://en.yiwugo.com/search/s.html?q={query}&cpage={page}",
        }
    }

    fn mobile_search_template(self) -> &'static str {
        match self {
            Platform::Alibaba => "https://m.alibaba.com/trade/search?SearchText={query}&page={page}",
            Platform::Alibaba1688 => {
                "https://m.1688.com/offer_search/-6D7079.html?keywords={query}&page={page}"
            }
            Platform::MadeInChina => {
                "https://m.made-in-china.com/productdirectory.do?word={query}&page={page}"
            }
            Platform::Yiwugo => "https://m.yiwugo.com/search/s.html?q={query}&cpage={page}",
        }
    }

    fn alternate_template(self) -> &'static str {
        match self {
            Platform::Alibaba => "https://www.alibaba.com/showroom/{query}.html",
            Platform::Alibaba1688 => {
                "https://s.1688.com/selloffer/rpc_async_render.jsonp?keywords={query}&beginPage=1&async=true"
            }
            Platform::MadeInChina => "https://www.made-in-china.com/multi-search/{query}/F1/1.html",
            Platform::Yiwugo => "https://en.yiwugo.com/ywg/productlist.html?keyword={query}",
        }
    }

    /// Desktop search results URL for `query` and 1-based `page`.
    #[must_use]
    pub fn desktop_search_url(self, query: &str, page: u32) -> String {
        fill_template(self.desktop_search_template(), query, page)
    }

    /// Mobile search results URL for `query` and 1-based `page`.
    #[must_use]
    pub fn mobile_search_url(self, query: &str, page: u32) -> String {
        fill_template(self.mobile_search_template(), query, page)
    }

    /// Alternate/export-style endpoint tried when every other strategy came back sparse.
    #[must_use]
    pub fn alternate_url(self, query: &str) -> String {
        let query = match self {
            // Showroom pages are addressed by a dashed slug rather than a query string.
            Platform::Alibaba | Platform::MadeInChina => slugify_query(query),
            Platform::Alibaba1688 | Platform::Yiwugo => query.to_owned(),
        };
        fill_template(self.alternate_template(), &query, 1)
    }

    /// Markers that only appear on this site's login walls or challenge pages.
    #[must_use]
    pub fn block_markers(self) -> &'static [&'static str] {
        match self {
            Platform::Alibaba => &[
                "login.alibaba.com/newlogin",
                "passport.alibaba.com/mini_login",
                "_____tmd_____/punish",
                "x5secdata",
                "baxia-punish",
            ],
            Platform::Alibaba1688 => &[
                "login.1688.com/member/signin",
                "login.taobao.com/member/login",
                "_____tmd_____/punish",
                "x5secdata",
                "nocaptcha",
            ],
            Platform::MadeInChina => &[
                "login.made-in-china.com/sign-in",
                "please slide to verify",
                "security verification - made-in-china",
            ],
            Platform::Yiwugo => &["user.yiwugo.com/login", "acw_sc__v2", "访问验证"],
        }
    }

    /// Hosts whose links are littered with tracking parameters.
    #[must_use]
    pub fn tracking_heavy_hosts() -> &'static [&'static str] {
        &["alibaba.com", "1688.com", "made-in-china.com", "aliexpress.com"]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alibaba" => Ok(Platform::Alibaba),
            "1688" | "alibaba1688" | "alibaba-1688" => Ok(Platform::Alibaba1688),
            "made-in-china" | "madeinchina" | "mic" => Ok(Platform::MadeInChina),
            "yiwugo" => Ok(Platform::Yiwugo),
            other => Err(ConfigError::UnknownPlatform(other.to_owned())),
        }
    }
}

fn fill_template(template: &str, query: &str, page: u32) -> String {
    let encoded = utf8_percent_encode(query.trim(), QUERY_ENCODE_SET).to_string();
    template
        .replace("{query}", &encoded)
        .replace("{page}", &page.to_string())
}

/// `"LED Strip Light"` → `"led-strip-light"`; non-ASCII characters are kept.
fn slugify_query(query: &str) -> String {
    query
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_round_trips_through_from_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.slug().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn from_str_rejects_unknown_platform() {
        let err = "ebay".parse::<Platform>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlatform(ref p) if p == "ebay"));
    }

    #[test]
    fn desktop_search_url_encodes_query_and_page() {
        let url = Platform::Alibaba.desktop_search_url("led strip", 2);
        assert_eq!(
            url,
            "https://www.alibaba.com/trade/search?SearchText=led%20strip&page=2"
        );
    }

    #[test]
    fn search_url_encodes_non_ascii_query() {
        let url = Platform::Alibaba1688.desktop_search_url("手机壳", 1);
        assert!(url.contains("keywords=%E6%89%8B%E6%9C%BA%E5%A3%B3"), "{url}");
        assert!(url.ends_with("beginPage=1"));
    }

    #[test]
    fn alternate_url_uses_slug_for_showroom() {
        assert_eq!(
            Platform::Alibaba.alternate_url("LED  Strip Light"),
            "https://www.alibaba.com/showroom/led-strip-light.html"
        );
    }

    #[test]
    fn serde_uses_slug() {
        let json = serde_json::to_string(&Platform::MadeInChina).unwrap();
        assert_eq!(json, "\"made-in-china\"");
        let back: Platform = serde_json::from_str("\"1688\"").unwrap();
        assert_eq!(back, Platform::Alibaba1688);
    }
}
