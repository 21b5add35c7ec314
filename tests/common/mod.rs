//! Shared wiremock fixtures for the integration tests.
#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use marquee::feed::FetchContext;
use marquee::tmdb::TmdbClient;

pub fn context(server: &MockServer) -> FetchContext {
    let client = TmdbClient::new(reqwest::Client::new(), &server.uri(), None);
    FetchContext::new(Arc::new(client), "en-US", "US")
}

/// Page `page` of a list with `per_page` items; ids are `page * 100 + index`.
pub fn page_body(page: u32, total_pages: u32, per_page: u64) -> serde_json::Value {
    let results: Vec<_> = (0..per_page)
        .map(|i| {
            let id = u64::from(page) * 100 + i;
            json!({"id": id, "title": format!("Title {id}"), "release_date": "2020-01-01"})
        })
        .collect();
    json!({"page": page, "total_pages": total_pages, "results": results})
}

/// Serves every page of a list endpoint. `filters` must all be present in
/// the query for a request to match.
pub async fn mount_list(
    server: &MockServer,
    endpoint: &str,
    filters: &[(&str, &str)],
    total_pages: u32,
    per_page: u64,
) {
    for page in 1..=total_pages {
        let mut mock = Mock::given(method("GET"))
            .and(path(endpoint))
            .and(query_param("page", page.to_string()));
        for (key, value) in filters {
            mock = mock.and(query_param(*key, *value));
        }
        mock.respond_with(
            ResponseTemplate::new(200).set_body_json(page_body(page, total_pages, per_page)),
        )
        .mount(server)
        .await;
    }
}

pub async fn mount_genres(server: &MockServer, endpoint: &str, genres: &[(u64, &str)]) {
    let genres: Vec<_> = genres
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name}))
        .collect();
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "genres": genres })))
        .mount(server)
        .await;
}

/// Answers `/{media}/{id}` with a record carrying that id.
pub async fn mount_items(server: &MockServer, media: &str) {
    let prefix = media.to_string();
    Mock::given(method("GET"))
        .and(path_regex(format!(r"^/{media}/\d+$")))
        .respond_with(move |req: &Request| {
            let id: u64 = req
                .url
                .path()
                .rsplit('/')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "title": format!("{prefix} {id}"),
                "name": format!("{prefix} {id}"),
            }))
        })
        .mount(server)
        .await;
}

pub async fn mount_rate_limited(server: &MockServer, endpoint: &str) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "status_code": 25,
            "status_message": "Your request count (41) is over the allowed limit of (40)."
        })))
        .mount(server)
        .await;
}

/// Pages requested from `endpoint`, sorted.
pub async fn pages_requested(server: &MockServer, endpoint: &str) -> Vec<u32> {
    let mut pages: Vec<u32> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.url.path() == endpoint)
        .filter_map(|req| {
            req.url
                .query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
        })
        .collect();
    pages.sort_unstable();
    pages
}

/// Number of requests whose path starts with `prefix`.
pub async fn request_count(server: &MockServer, prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.url.path().starts_with(prefix))
        .count()
}
