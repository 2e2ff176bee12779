// Device classification from user-agent strings
// A lightweight heuristic stands in for a full device-detection library

use serde::{Deserialize, Serialize};

/// Device labels derived from a user-agent string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Broad hardware class (desktop, smartphone, tablet, bot)
    pub class: String,
    /// Kind of client software (browser, mobile-app, crawler)
    pub device_type: String,
    /// Concrete client product name
    pub client: String,
    /// Browser family
    pub browser: String,
    /// Operating system
    pub os: String,
}

/// Trait for pluggable device classifiers
///
/// Classification is stateless and must be deterministic: the same
/// user-agent string always yields the same labels, since session bucketing
/// depends on it.
pub trait DeviceClassifier: Send + Sync {
    fn classify(&self, user_agent: &str) -> DeviceInfo;
}

/// Built-in heuristic classifier
///
/// Pattern matching on well-known user-agent substrings. Good enough for
/// policy bucketing; swap in a real device-detection backed implementation
/// for analytics-grade accuracy.
#[derive(Debug, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceClassifier for HeuristicClassifier {
    fn classify(&self, user_agent: &str) -> DeviceInfo {
        let ua = user_agent.to_lowercase();

        if ua.is_empty() {
            return DeviceInfo {
                class: "unknown".to_string(),
                device_type: "unknown".to_string(),
                client: "unknown".to_string(),
                browser: "unknown".to_string(),
                os: "unknown".to_string(),
            };
        }

        let is_bot = ua.contains("bot")
            || ua.contains("spider")
            || ua.contains("crawler")
            || ua.contains("curl")
            || ua.contains("wget");

        let class = if is_bot {
            "bot"
        } else if ua.contains("tablet") || ua.contains("ipad") {
            "tablet"
        } else if ua.contains("mobile") || ua.contains("android") || ua.contains("iphone") {
            "smartphone"
        } else {
            "desktop"
        }
        .to_string();

        let device_type = if is_bot {
            "crawler"
        } else if ua.contains("okhttp") || ua.contains("cfnetwork") || ua.contains("dalvik") {
            "mobile-app"
        } else {
            "browser"
        }
        .to_string();

        // Order matters: Edge and Opera embed "chrome", Chrome embeds "safari"
        let browser = if ua.contains("edg") {
            "Edge"
        } else if ua.contains("opr") || ua.contains("opera") {
            "Opera"
        } else if ua.contains("chrome") {
            "Chrome"
        } else if ua.contains("firefox") {
            "Firefox"
        } else if ua.contains("safari") {
            "Safari"
        } else {
            "Unknown"
        }
        .to_string();

        let client = if device_type == "browser" {
            browser.clone()
        } else {
            // First product token, e.g. "okhttp/4.9.0" -> "okhttp"
            user_agent
                .split_whitespace()
                .next()
                .and_then(|t| t.split('/').next())
                .unwrap_or("unknown")
                .to_string()
        };

        // Mobile systems first: their user agents also carry generic tokens
        let os = if ua.contains("android") {
            "Android"
        } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ios") {
            "iOS"
        } else if ua.contains("windows") {
            "Windows"
        } else if ua.contains("mac os") || ua.contains("macos") {
            "macOS"
        } else if ua.contains("linux") {
            "Linux"
        } else {
            "Unknown"
        }
        .to_string();

        DeviceInfo {
            class,
            device_type,
            client,
            browser,
            os,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Mobile/15E148 Safari/604.1";

    #[test]
    fn test_desktop_chrome() {
        let info = HeuristicClassifier::new().classify(CHROME_DESKTOP);
        assert_eq!(info.class, "desktop");
        assert_eq!(info.device_type, "browser");
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.os, "Windows");
    }

    #[test]
    fn test_mobile_safari() {
        let info = HeuristicClassifier::new().classify(SAFARI_IPHONE);
        assert_eq!(info.class, "smartphone");
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.os, "iOS");
    }

    #[test]
    fn test_edge_not_reported_as_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 Chrome/91.0 Safari/537.36 Edg/91.0";
        let info = HeuristicClassifier::new().classify(ua);
        assert_eq!(info.browser, "Edge");
    }

    #[test]
    fn test_crawler() {
        let info = HeuristicClassifier::new().classify("Googlebot/2.1 (+http://www.google.com/bot.html)");
        assert_eq!(info.class, "bot");
        assert_eq!(info.device_type, "crawler");
    }

    #[test]
    fn test_empty_user_agent_is_stable() {
        let c = HeuristicClassifier::new();
        assert_eq!(c.classify(""), c.classify(""));
        assert_eq!(c.classify("").class, "unknown");
    }

    #[test]
    fn test_mobile_app_client_token() {
        let info = HeuristicClassifier::new().classify("okhttp/4.9.0");
        assert_eq!(info.device_type, "mobile-app");
        assert_eq!(info.client, "okhttp");
    }
}
