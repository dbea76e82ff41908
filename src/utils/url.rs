//! URL helpers for logging and source addressing

use regex::Regex;
use url::Url;

const SENSITIVE_QUERY: &str = r"(?i)([?&](?:username|password|user|pass|pwd|passwd|token)=)[^&]*";

/// URL utility functions
pub struct UrlUtils;

impl UrlUtils {
    /// Whether a source path should be fetched over HTTP rather than read from disk
    pub fn is_remote(path: &str) -> bool {
        let lower = path.trim().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    /// Mask credentials in a URL before it reaches a log line
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url)
            && (!parsed.username().is_empty() || parsed.password().is_some())
        {
            let mut masked = parsed.clone();
            let _ = masked.set_username("****");
            let _ = masked.set_password(Some("****"));
            obfuscated = masked.to_string();
        }

        match Regex::new(SENSITIVE_QUERY) {
            Ok(re) => re.replace_all(&obfuscated, "${1}****").into_owned(),
            Err(_) => obfuscated,
        }
    }
}
