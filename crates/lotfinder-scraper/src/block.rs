//! Login-wall and bot-challenge detection for fetched pages.

use lotfinder_core::Platform;

/// Challenge markers shared by every site (Cloudflare, Aliyun WAF sliders, generic notices).
const GENERIC_MARKERS: [&str; 8] = [
    "attention required! | cloudflare",
    "/cdn-cgi/challenge-platform/",
    "slide to verify",
    "please slide to verify",
    "unusual traffic from your computer",
    "captcha-container",
    "punish?x5secdata",
    "滑动验证",
];

/// Returns `true` when `html` is a login redirect or anti-bot challenge
/// rather than real search results.
#[must_use]
pub fn is_blocked(html: &str, platform: Platform) -> bool {
    let lowered = html.to_lowercase();

    let has_just_a_moment = lowered.contains("just a moment...");
    let cloudflare_interstitial = has_just_a_moment
        && (lowered.contains("please enable cookies") || lowered.contains("cf-chl-"));

    cloudflare_interstitial
        || GENERIC_MARKERS.iter().any(|m| lowered.contains(m))
        || platform.block_markers().iter().any(|m| lowered.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_platform_login_wall() {
        let html = r#"<script>location.href="https://login.1688.com/member/signin.htm?Done=..."</script>"#;
        assert!(is_blocked(html, Platform::Alibaba1688));
    }

    #[test]
    fn detects_generic_slider_challenge() {
        let html = "<div id='nc_1'>Please slide to verify</div>";
        for platform in Platform::ALL {
            assert!(is_blocked(html, platform));
        }
    }

    #[test]
    fn detects_cloudflare_interstitial_only_with_both_markers() {
        assert!(is_blocked(
            "<title>Just a moment...</title><p>Please enable cookies.</p>",
            Platform::Yiwugo
        ));
        assert!(!is_blocked(
            "<p>Just a moment... loading results</p>",
            Platform::Yiwugo
        ));
    }

    #[test]
    fn platform_markers_do_not_leak_across_sites() {
        let html = "<a href='https://user.yiwugo.com/login'>Sign in</a>";
        assert!(is_blocked(html, Platform::Yiwugo));
        assert!(!is_blocked(html, Platform::Alibaba));
    }

    #[test]
    fn ordinary_results_page_is_not_blocked() {
        let html = r#"<div class="search-card-item"><a href="/product-detail/a_1.html">LED</a></div>"#;
        assert!(!is_blocked(html, Platform::Alibaba));
    }
}
