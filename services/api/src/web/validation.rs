//! services/api/src/web/validation.rs
//!
//! Input checks shared by the handlers.

use regex::Regex;

/// Compiled patterns for the free-form fields clients send.
pub struct Validators {
    email: Regex,
    http_url: Regex,
    phone: Regex,
}

impl Validators {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            email: Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")?,
            http_url: Regex::new(r"^https?://([^/?#:\s]+)(?::\d+)?(?:[/?#]\S*)?$")?,
            phone: Regex::new(r"^\d{10}$")?,
        })
    }

    pub fn is_email(&self, value: &str) -> bool {
        self.email.is_match(value)
    }

    pub fn is_http_url(&self, value: &str) -> bool {
        self.http_url.is_match(value)
    }

    pub fn is_phone(&self, value: &str) -> bool {
        self.phone.is_match(value)
    }

    /// Host of an http(s) URL without a leading `www.`.
    pub fn source_of(&self, url: &str) -> Option<String> {
        let host = self.http_url.captures(url)?.get(1)?.as_str().to_lowercase();
        Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_emails_and_phones() {
        let v = Validators::new().unwrap();
        assert!(v.is_email("meera@clinic.in"));
        assert!(!v.is_email("meera@clinic"));
        assert!(!v.is_email("meera clinic@x.in"));
        assert!(v.is_phone("9876543210"));
        assert!(!v.is_phone("98765-43210"));
    }

    #[test]
    fn derives_article_source_from_host() {
        let v = Validators::new().unwrap();
        assert_eq!(
            v.source_of("https://www.who.int/news/item/heat-health").as_deref(),
            Some("who.int")
        );
        assert_eq!(
            v.source_of("http://Health.Example.org:8080?id=3").as_deref(),
            Some("health.example.org")
        );
        assert_eq!(v.source_of("ftp://files.example.org/a"), None);
        assert!(!v.is_http_url("javascript:alert(1)"));
    }
}
