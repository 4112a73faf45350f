//! Health check endpoint.

/// `GET /health`
///
/// Liveness probe for load balancers. Returns a fixed literal; reachability
/// of the store or the upstream is deliberately not checked here.
pub async fn health_check() -> &'static str {
    "1"
}
