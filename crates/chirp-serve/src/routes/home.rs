//! Static index page.

use axum::response::Html;

/// The index page, embedded at compile time.
static INDEX_HTML: &str = include_str!("../../assets/index.html");

/// `GET /`
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
