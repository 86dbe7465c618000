//! User-agent identity parsing
//!
//! Pure functions from a user-agent string (plus optional high-entropy
//! hints) to the friendly identity fields of a record. Undetectable means
//! `None`, never a placeholder string.
//!
//! Detection order matters: Chromium-based browsers embed "Chrome" and
//! "Safari" tokens, Android UAs embed "Linux", and iOS UAs embed
//! "like Mac OS X", so the more specific token is always checked first.

use crate::types::UaHints;

/// Friendly browser name.
pub fn browser_name(ua: &str) -> Option<&'static str> {
    if ua.is_empty() {
        return None;
    }
    if ua.contains("Firefox") {
        return Some("Firefox");
    }
    if ua.contains("SamsungBrowser") {
        return Some("Samsung Internet");
    }
    if ua.contains("OPR") || ua.contains("Opera") {
        return Some("Opera");
    }
    if ua.contains("Trident") {
        return Some("Internet Explorer");
    }
    if ua.contains("Edg") {
        return Some("Edge");
    }
    if ua.contains("Chrome") {
        return Some("Chrome");
    }
    if ua.contains("Safari") {
        return Some("Safari");
    }
    None
}

/// Browser version for a detected browser name.
pub fn browser_version(ua: &str, browser: &str) -> Option<String> {
    match browser {
        "Firefox" => token_version(ua, "Firefox/"),
        "Samsung Internet" => token_version(ua, "SamsungBrowser/"),
        "Opera" => token_version(ua, "OPR/").or_else(|| token_version(ua, "Version/")),
        "Internet Explorer" => token_version(ua, "rv:"),
        "Edge" => token_version(ua, "Edg/"),
        "Chrome" => token_version(ua, "Chrome/"),
        // Safari reports its real version behind "Version/"
        "Safari" => token_version(ua, "Version/"),
        _ => None,
    }
}

/// Friendly OS name.
pub fn os_name(ua: &str) -> Option<&'static str> {
    if ua.is_empty() {
        return None;
    }
    if ua.contains("Win") {
        return Some("Windows");
    }
    // Android before Linux: Android UAs contain "Linux; Android"
    if ua.contains("Android") {
        return Some("Android");
    }
    // iOS before Mac: iPhone UAs contain "like Mac OS X"
    if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        return Some("iOS");
    }
    if ua.contains("Mac") {
        return Some("MacOS");
    }
    if ua.contains("Linux") {
        return Some("Linux");
    }
    None
}

/// OS version for a detected OS name, normalized to dotted form.
pub fn os_version(ua: &str, os: &str) -> Option<String> {
    match os {
        "Windows" => token_version(ua, "Windows NT "),
        "Android" => token_version(ua, "Android "),
        "iOS" => underscored_version(ua, " OS "),
        "MacOS" => underscored_version(ua, "Mac OS X "),
        _ => None,
    }
}

/// Friendly device model.
///
/// High-entropy hints win when present (Android devices report their
/// model string there); otherwise fall back to UA heuristics.
pub fn device_model(ua: &str, hints: Option<&UaHints>) -> Option<String> {
    if let Some(model) = hints.and_then(|h| h.model.as_deref()) {
        if !model.is_empty() {
            return Some(model.to_string());
        }
    }

    if ua.contains("iPhone") {
        return Some("iPhone".to_string());
    }
    if ua.contains("iPad") {
        return Some("iPad".to_string());
    }
    if let Some(model) = android_model(ua) {
        return Some(model);
    }
    if ua.contains("Windows") {
        return Some("Windows PC".to_string());
    }
    if let Some(version) = underscored_version(ua, "Mac OS X ") {
        return Some(format!("Mac {}", version));
    }
    if ua.contains("Mac") {
        return Some("Mac".to_string());
    }
    if ua.contains("Linux") {
        return Some("Linux Device".to_string());
    }
    None
}

/// CPU architecture, from hints or coarse UA heuristics.
pub fn cpu_architecture(ua: &str, hints: Option<&UaHints>) -> Option<String> {
    if let Some(arch) = hints.and_then(|h| h.architecture.as_deref()) {
        if !arch.is_empty() {
            return Some(arch.to_string());
        }
    }

    if ua.contains("aarch64") || ua.contains("arm64") || ua.contains("armv8") {
        return Some("arm64".to_string());
    }
    if ua.contains("arm") {
        return Some("arm".to_string());
    }
    if ua.contains("x86_64") || ua.contains("Win64") || ua.contains("x64") {
        return Some("x86_64".to_string());
    }
    None
}

/// Android device model: the token between the last list separator and
/// " Build/", e.g. "Linux; Android 14; Pixel 7 Build/..." → "Pixel 7".
fn android_model(ua: &str) -> Option<String> {
    if !ua.contains("Android") {
        return None;
    }
    let build = ua.find(" Build/")?;
    let head = &ua[..build];
    let start = head.rfind(|c| c == ';' || c == '(')? + 1;
    let model = head[start..].trim();
    if model.is_empty() {
        None
    } else {
        Some(model.to_string())
    }
}

/// The dotted-or-digit run following `marker`, e.g. "Chrome/124.0" → "124.0".
fn token_version(ua: &str, marker: &str) -> Option<String> {
    let start = ua.find(marker)? + marker.len();
    let rest = &ua[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(rest[..end].to_string())
    }
}

/// Like [`token_version`] but for Apple's underscore-separated versions,
/// normalized to dots: "Mac OS X 10_15_7" → "10.15.7".
fn underscored_version(ua: &str, marker: &str) -> Option<String> {
    let start = ua.find(marker)? + marker.len();
    let rest = &ua[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '_' && c != '.')
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(rest[..end].replace('_', "."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 7 Build/UQ1A.240205.002) \
                            AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.6261.64 \
                            Mobile Safari/537.36";
    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
                             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 \
                             Mobile/15E148 Safari/604.1";
    const MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.6367.91 \
                          Safari/537.36";
    const WINDOWS_EDGE_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                   AppleWebKit/537.36 (KHTML, like Gecko) \
                                   Chrome/123.0.0.0 Safari/537.36 Edg/123.0.2420.81";
    const FIREFOX_UA: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

    #[test]
    fn test_browser_detection_order() {
        assert_eq!(browser_name(PIXEL_UA), Some("Chrome"));
        assert_eq!(browser_name(IPHONE_UA), Some("Safari"));
        assert_eq!(browser_name(WINDOWS_EDGE_UA), Some("Edge"));
        assert_eq!(browser_name(FIREFOX_UA), Some("Firefox"));
        assert_eq!(browser_name(""), None);
        assert_eq!(browser_name("curl/8.4.0"), None);
    }

    #[test]
    fn test_browser_versions() {
        assert_eq!(
            browser_version(PIXEL_UA, "Chrome").as_deref(),
            Some("122.0.6261.64")
        );
        assert_eq!(browser_version(IPHONE_UA, "Safari").as_deref(), Some("17.4"));
        assert_eq!(
            browser_version(WINDOWS_EDGE_UA, "Edge").as_deref(),
            Some("123.0.2420.81")
        );
        assert_eq!(browser_version(FIREFOX_UA, "Firefox").as_deref(), Some("124.0"));
    }

    #[test]
    fn test_os_detection_handles_embedded_tokens() {
        // Android UAs contain "Linux"; iPhone UAs contain "like Mac OS X"
        assert_eq!(os_name(PIXEL_UA), Some("Android"));
        assert_eq!(os_name(IPHONE_UA), Some("iOS"));
        assert_eq!(os_name(MAC_UA), Some("MacOS"));
        assert_eq!(os_name(WINDOWS_EDGE_UA), Some("Windows"));
        assert_eq!(os_name(FIREFOX_UA), Some("Linux"));
    }

    #[test]
    fn test_os_versions() {
        assert_eq!(os_version(PIXEL_UA, "Android").as_deref(), Some("14"));
        assert_eq!(os_version(IPHONE_UA, "iOS").as_deref(), Some("17.4"));
        assert_eq!(os_version(MAC_UA, "MacOS").as_deref(), Some("10.15.7"));
        assert_eq!(os_version(WINDOWS_EDGE_UA, "Windows").as_deref(), Some("10.0"));
        assert_eq!(os_version(FIREFOX_UA, "Linux"), None);
    }

    #[test]
    fn test_device_model_heuristics() {
        assert_eq!(device_model(PIXEL_UA, None).as_deref(), Some("Pixel 7"));
        assert_eq!(device_model(IPHONE_UA, None).as_deref(), Some("iPhone"));
        assert_eq!(device_model(MAC_UA, None).as_deref(), Some("Mac 10.15.7"));
        assert_eq!(
            device_model(WINDOWS_EDGE_UA, None).as_deref(),
            Some("Windows PC")
        );
        assert_eq!(device_model(FIREFOX_UA, None).as_deref(), Some("Linux Device"));
        assert_eq!(device_model("", None), None);
    }

    #[test]
    fn test_hints_take_precedence() {
        let hints = UaHints {
            model: Some("Pixel 7 Pro".to_string()),
            architecture: Some("arm".to_string()),
            ..Default::default()
        };
        assert_eq!(
            device_model(PIXEL_UA, Some(&hints)).as_deref(),
            Some("Pixel 7 Pro")
        );
        assert_eq!(cpu_architecture(PIXEL_UA, Some(&hints)).as_deref(), Some("arm"));

        // Empty hint strings fall back to heuristics
        let empty = UaHints::default();
        assert_eq!(
            cpu_architecture(FIREFOX_UA, Some(&empty)).as_deref(),
            Some("x86_64")
        );
    }

    #[test]
    fn test_cpu_architecture_heuristics() {
        assert_eq!(cpu_architecture(WINDOWS_EDGE_UA, None).as_deref(), Some("x86_64"));
        assert_eq!(cpu_architecture(FIREFOX_UA, None).as_deref(), Some("x86_64"));
        assert_eq!(cpu_architecture("Linux aarch64", None).as_deref(), Some("arm64"));
        assert_eq!(cpu_architecture(IPHONE_UA, None), None);
    }
}
