//! Scripts registered before any page script runs to mask automation.

/// Fingerprint patches independent of locale.
const BASE_PATCHES: [&str; 4] = [
    r"
    Object.defineProperty(Navigator.prototype, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    ",
    r"
    if (!window.chrome) {
        window.chrome = { runtime: {}, app: { isInstalled: false }, csi() {}, loadTimes() {} };
    }
    ",
    r"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'PDF Viewer', filename: 'internal-pdf-viewer' },
            { name: 'Chrome PDF Viewer', filename: 'internal-pdf-viewer' },
            { name: 'Chromium PDF Viewer', filename: 'internal-pdf-viewer' }
        ],
        configurable: true
    });
    ",
    r"
    if (navigator.permissions && navigator.permissions.query) {
        const query = navigator.permissions.query.bind(navigator.permissions);
        navigator.permissions.query = (p) =>
            p && p.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : query(p);
    }
    ",
];

/// All stealth scripts for a context pretending to live in `locale`.
pub(crate) fn stealth_scripts(locale: &str) -> Vec<String> {
    let primary = locale.split('-').next().unwrap_or(locale);
    let languages = if primary == locale {
        format!("['{locale}']")
    } else {
        format!("['{locale}', '{primary}', 'en']")
    };
    let mut scripts: Vec<String> = BASE_PATCHES.iter().map(|s| (*s).to_owned()).collect();
    scripts.push(format!(
        "Object.defineProperty(navigator, 'languages', {{ get: () => {languages}, configurable: true }});"
    ));
    scripts
}
