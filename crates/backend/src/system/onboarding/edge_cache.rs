use std::collections::HashMap;

use axum::http::{header, HeaderMap, HeaderValue};

use super::ports::EdgeCache;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCookie {
    name: String,
    value: String,
    max_age_secs: i64,
}

impl PendingCookie {
    fn header_value(&self) -> String {
        format!(
            "{}={}; Max-Age={}; Path=/; SameSite=Lax",
            self.name,
            urlencoding::encode(&self.value),
            self.max_age_secs
        )
    }
}

/// Cookies of one request/response pair.
///
/// Reads come from the request `Cookie` header, writes are collected and
/// emitted as `Set-Cookie` headers on the response. A write is visible to
/// later reads on the same jar.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    values: HashMap<String, String>,
    pending: Vec<PendingCookie>,
}

impl CookieJar {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::default();
        for raw in headers.get_all(header::COOKIE) {
            // A header that is not valid ASCII is skipped, same as a missing cookie
            let Ok(raw) = raw.to_str() else {
                continue;
            };
            jar.parse_header(raw);
        }
        jar
    }

    fn parse_header(&mut self, raw: &str) {
        for pair in raw.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            let decoded = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            self.values.insert(name.to_string(), decoded);
        }
    }

    /// `Set-Cookie` values for every cookie written on this jar
    pub fn set_cookie_values(&self) -> Vec<String> {
        self.pending.iter().map(PendingCookie::header_value).collect()
    }

    /// Append `Set-Cookie` headers to a response
    pub fn apply(&self, headers: &mut HeaderMap) {
        for value in self.set_cookie_values() {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::warn!("Skipping unencodable cookie: {}", e),
            }
        }
    }
}

impl EdgeCache for CookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn set(&mut self, name: &str, value: &str, max_age_secs: i64) {
        self.values.insert(name.to_string(), value.to_string());
        self.pending.retain(|c| c.name != name);
        self.pending.push(PendingCookie {
            name: name.to_string(),
            value: value.to_string(),
            max_age_secs,
        });
    }
}
