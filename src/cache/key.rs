//! Cache key normalization.
//!
//! Same method, same gateway URL (host + path + query) and same values for the
//! configured vary headers map to the same entry.

use axum::http::{header, HeaderMap, Method, Uri};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap, vary: &[String]) -> Self {
        let host = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                headers
                    .get(header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default()
            .to_ascii_lowercase();
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

        let mut key = format!("{} {}{}", method, host, path_and_query);
        for name in vary {
            let values: Vec<&str> = headers
                .get_all(name.as_str())
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            if !values.is_empty() {
                key.push('\n');
                key.push_str(&name.to_ascii_lowercase());
                key.push(':');
                key.push_str(&values.join(","));
            }
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
