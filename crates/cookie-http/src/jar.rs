//! Cookie jar keyed by domain.

use chrono::Utc;
use cookie::Cookie;
use reqwest::header::{HeaderMap, SET_COOKIE};
use std::collections::BTreeMap;
use tracing::{debug, trace};
use url::{Host, Url};

#[derive(Debug, Clone)]
struct StoredCookie {
    cookie: Cookie<'static>,
    /// Set without a Domain attribute: sent to the exact host only.
    host_only: bool,
}

impl StoredCookie {
    fn path(&self) -> &str {
        self.cookie.path().unwrap_or("/")
    }
}

/// Cookies received from the service, grouped by domain.
///
/// Only response `Set-Cookie` headers and [`CookieJar::inject`] add cookies.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    domains: BTreeMap<String, Vec<StoredCookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every `Set-Cookie` header of a response received from `url`.
    pub fn merge_response(&mut self, url: &Url, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            match value.to_str() {
                Ok(raw) => {
                    self.store(url, raw);
                }
                Err(_) => debug!(url = %url, "Skipping non-ASCII Set-Cookie header"),
            }
        }
    }

    /// Store one `Set-Cookie` value received from `url`.
    ///
    /// Returns false when the header is unparseable or names a domain the
    /// URL's host does not belong to.
    pub fn store(&mut self, url: &Url, set_cookie: &str) -> bool {
        let mut cookie = match Cookie::parse(set_cookie.to_string()) {
            Ok(cookie) => cookie,
            Err(e) => {
                debug!(url = %url, error = %e, "Ignoring unparseable Set-Cookie header");
                return false;
            }
        };

        let Some((domain, host_only)) = cookie_domain(url, cookie.domain()) else {
            debug!(url = %url, domain = ?cookie.domain(), "Rejecting cookie for foreign domain");
            return false;
        };

        if cookie.path().map_or(true, |path| !path.starts_with('/')) {
            cookie.set_path(default_path(url));
        }
        cookie.set_domain(domain.clone());

        let expired = is_expired(&cookie);
        let name = cookie.name().to_string();
        let path = cookie.path().unwrap_or("/").to_string();

        let entries = self.domains.entry(domain.clone()).or_default();
        entries.retain(|stored| !(stored.cookie.name() == name && stored.path() == path));
        if expired {
            trace!(name = %name, domain = %domain, "Removed expired cookie");
        } else {
            trace!(name = %name, domain = %domain, path = %path, "Stored cookie");
            entries.push(StoredCookie { cookie, host_only });
        }
        if entries.is_empty() {
            self.domains.remove(&domain);
        }
        true
    }

    /// Add a cookie restored from storage for `origin`.
    ///
    /// A cookie without a Domain is host-only for `origin`'s host. Returns
    /// false when the Domain does not cover that host.
    pub fn inject(&mut self, mut cookie: Cookie<'static>, origin: &Url) -> bool {
        let Some((domain, host_only)) = cookie_domain(origin, cookie.domain()) else {
            return false;
        };
        if cookie.path().is_none() {
            cookie.set_path("/");
        }
        cookie.set_domain(domain.clone());

        let name = cookie.name().to_string();
        let path = cookie.path().unwrap_or("/").to_string();
        let entries = self.domains.entry(domain).or_default();
        entries.retain(|stored| !(stored.cookie.name() == name && stored.path() == path));
        entries.push(StoredCookie { cookie, host_only });
        true
    }

    /// The cookie named `name` that requests to `url` carry, in a form that
    /// [`CookieJar::inject`] restores to the same scope. Host-only cookies
    /// come back without a Domain.
    pub fn export(&self, url: &Url, name: &str) -> Option<Cookie<'static>> {
        let host = url.host_str()?.to_ascii_lowercase();
        let stored = self
            .domains
            .iter()
            .filter(|(domain, _)| domain_matches(&host, domain))
            .flat_map(|(domain, cookies)| {
                let exact_host = *domain == host;
                cookies
                    .iter()
                    .filter(move |stored| exact_host || !stored.host_only)
            })
            .find(|stored| stored.cookie.name() == name)?;

        let mut cookie = stored.cookie.clone();
        if stored.host_only {
            cookie.unset_domain();
        }
        Some(cookie)
    }

    /// Render the `Cookie` header value for a request to `url`.
    ///
    /// Cookies with longer paths come first.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        let request_path = url.path();
        let secure_channel = url.scheme() == "https";

        let mut matching: Vec<&StoredCookie> = self
            .domains
            .iter()
            .filter(|(domain, _)| domain_matches(&host, domain))
            .flat_map(|(domain, cookies)| {
                let exact_host = *domain == host;
                cookies
                    .iter()
                    .filter(move |stored| exact_host || !stored.host_only)
            })
            .filter(|stored| path_matches(request_path, stored.path()))
            .filter(|stored| secure_channel || !stored.cookie.secure().unwrap_or(false))
            .filter(|stored| !is_expired(&stored.cookie))
            .collect();

        if matching.is_empty() {
            return None;
        }

        matching.sort_by(|a, b| b.path().len().cmp(&a.path().len()));
        Some(
            matching
                .iter()
                .map(|stored| format!("{}={}", stored.cookie.name(), stored.cookie.value()))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// First cookie with the given name, in any domain.
    pub fn find(&self, name: &str) -> Option<&Cookie<'static>> {
        self.domains
            .values()
            .flatten()
            .map(|stored| &stored.cookie)
            .find(|cookie| cookie.name() == name)
    }

    pub fn len(&self) -> usize {
        self.domains.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn clear(&mut self) {
        self.domains.clear();
    }
}

/// Storage domain and host-only flag for a cookie received from `url`.
///
/// `None` rejects the cookie: its Domain is a single label other than the
/// host itself, names an IP host inexactly, or does not cover the host.
fn cookie_domain(url: &Url, attribute: Option<&str>) -> Option<(String, bool)> {
    let host = url.host_str()?.to_ascii_lowercase();
    let Some(domain) = attribute
        .map(|domain| domain.trim_start_matches('.').to_ascii_lowercase())
        .filter(|domain| !domain.is_empty())
    else {
        return Some((host, true));
    };

    if domain == host {
        // A single-label host may only set host-only cookies.
        return Some((host, !domain.contains('.')));
    }
    let is_ip = !matches!(url.host(), Some(Host::Domain(_)));
    if is_ip || !domain.contains('.') || !domain_matches(&host, &domain) {
        return None;
    }
    Some((domain, false))
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Directory of the request path, as used when Set-Cookie names no Path.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}

fn is_expired(cookie: &Cookie<'_>) -> bool {
    if let Some(max_age) = cookie.max_age() {
        return max_age.is_zero() || max_age.is_negative();
    }
    cookie
        .expires_datetime()
        .map_or(false, |expires| expires.unix_timestamp() <= Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_set_cookie_renders_in_cookie_header() {
        let mut jar = CookieJar::new();
        assert!(jar.store(&url("https://library.example/api/login"), "a=1"));

        assert_eq!(
            jar.header_for(&url("https://library.example/api/templates")),
            Some("a=1".to_string())
        );
    }

    #[test]
    fn test_host_only_cookie_not_sent_to_subdomain() {
        let mut jar = CookieJar::new();
        jar.store(&url("https://library.example/"), "a=1");

        assert!(jar.header_for(&url("https://sso.library.example/")).is_none());
        assert!(jar.header_for(&url("https://other.example/")).is_none());
    }

    #[test]
    fn test_domain_cookie_sent_to_subdomains() {
        let mut jar = CookieJar::new();
        jar.store(
            &url("https://sso.library.example/auth"),
            "_forward_auth=abc; Domain=.library.example; Path=/",
        );

        assert_eq!(
            jar.header_for(&url("https://api.library.example/users/current")),
            Some("_forward_auth=abc".to_string())
        );
        assert!(jar.header_for(&url("https://evillibrary.example/")).is_none());
    }

    #[test]
    fn test_foreign_domain_rejected() {
        let mut jar = CookieJar::new();
        assert!(!jar.store(&url("https://library.example/"), "a=1; Domain=other.example"));
        assert!(jar.is_empty());
    }

    #[test]
    fn test_path_matching() {
        let mut jar = CookieJar::new();
        jar.store(&url("https://library.example/"), "a=1; Path=/api");

        assert!(jar.header_for(&url("https://library.example/api")).is_some());
        assert!(jar.header_for(&url("https://library.example/api/x")).is_some());
        assert!(jar.header_for(&url("https://library.example/apix")).is_none());
        assert!(jar.header_for(&url("https://library.example/")).is_none());
    }

    #[test]
    fn test_default_path_is_request_directory() {
        let mut jar = CookieJar::new();
        jar.store(&url("https://library.example/auth/realms/login"), "a=1");

        assert_eq!(jar.find("a").and_then(|c| c.path()), Some("/auth/realms"));
    }

    #[test]
    fn test_same_name_and_path_replaced() {
        let mut jar = CookieJar::new();
        let site = url("https://library.example/");
        jar.store(&site, "a=1; Path=/");
        jar.store(&site, "a=2; Path=/");

        assert_eq!(jar.len(), 1);
        assert_eq!(jar.header_for(&site), Some("a=2".to_string()));
    }

    #[test]
    fn test_max_age_zero_deletes_cookie() {
        let mut jar = CookieJar::new();
        let site = url("https://library.example/");
        jar.store(&site, "a=1; Path=/");
        jar.store(&site, "a=; Path=/; Max-Age=0");

        assert!(jar.is_empty());
    }

    #[test]
    fn test_secure_cookie_not_sent_over_http() {
        let mut jar = CookieJar::new();
        jar.store(&url("https://library.example/"), "a=1; Secure");

        assert!(jar.header_for(&url("http://library.example/")).is_none());
        assert!(jar.header_for(&url("https://library.example/")).is_some());
    }

    #[test]
    fn test_longer_paths_first() {
        let mut jar = CookieJar::new();
        let site = url("https://library.example/");
        jar.store(&site, "outer=1; Path=/");
        jar.store(&site, "inner=2; Path=/api");

        assert_eq!(
            jar.header_for(&url("https://library.example/api/templates")),
            Some("inner=2; outer=1".to_string())
        );
    }

    #[test]
    fn test_single_label_domain_rejected() {
        let mut jar = CookieJar::new();
        assert!(!jar.store(&url("https://library.example/"), "a=1; Domain=example"));
        assert!(!jar.store(&url("https://library.example/"), "a=1; Domain=.example"));
        assert!(jar.is_empty());
    }

    #[test]
    fn test_single_label_host_keeps_cookie_host_only() {
        let mut jar = CookieJar::new();
        assert!(jar.store(&url("http://localhost:8080/"), "a=1; Domain=localhost"));
        assert_eq!(jar.export(&url("http://localhost/"), "a").unwrap().domain(), None);
    }

    #[test]
    fn test_ip_host_needs_exact_domain() {
        let mut jar = CookieJar::new();
        assert!(!jar.store(&url("http://127.0.0.1/"), "a=1; Domain=0.0.1"));
        assert!(jar.store(&url("http://127.0.0.1/"), "a=1; Domain=127.0.0.1"));
    }

    #[test]
    fn test_exported_host_only_cookie_stays_host_only() {
        let mut jar = CookieJar::new();
        let site = url("https://library.example/api/users/current");
        jar.store(&site, "_forward_auth=abc; Path=/");

        let exported = jar.export(&site, "_forward_auth").unwrap();
        assert_eq!(exported.domain(), None);

        let mut restored = CookieJar::new();
        assert!(restored.inject(Cookie::parse(exported.to_string()).unwrap().into_owned(), &site));
        assert_eq!(
            restored.header_for(&url("https://library.example/api/templates")),
            Some("_forward_auth=abc".to_string())
        );
        assert!(restored.header_for(&url("https://sso.library.example/")).is_none());
    }

    #[test]
    fn test_exported_domain_cookie_keeps_domain() {
        let mut jar = CookieJar::new();
        jar.store(
            &url("https://sso.library.example/auth"),
            "_forward_auth=abc; Domain=library.example; Path=/",
        );

        let exported = jar
            .export(&url("https://api.library.example/"), "_forward_auth")
            .unwrap();
        assert_eq!(exported.domain(), Some("library.example"));
        assert!(jar.export(&url("https://other.example/"), "_forward_auth").is_none());
    }

    #[test]
    fn test_inject_and_find() {
        let mut jar = CookieJar::new();
        let cookie = Cookie::parse("_forward_auth=xyz; Domain=library.example; Path=/")
            .unwrap()
            .into_owned();

        assert!(jar.inject(cookie, &url("https://library.example/")));
        assert_eq!(jar.find("_forward_auth").map(|c| c.value()), Some("xyz"));
        assert_eq!(
            jar.header_for(&url("https://library.example/api/users/current")),
            Some("_forward_auth=xyz".to_string())
        );
    }

    #[test]
    fn test_inject_rejects_foreign_domain() {
        let mut jar = CookieJar::new();
        let cookie = Cookie::parse("a=1; Domain=other.example").unwrap().into_owned();
        assert!(!jar.inject(cookie, &url("https://library.example/")));
        assert!(jar.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut jar = CookieJar::new();
        jar.store(&url("https://library.example/"), "a=1");
        jar.clear();
        assert!(jar.is_empty());
        assert_eq!(jar.len(), 0);
    }
}
