use crate::backend::SimpleInput;
use actix_web::dev::ServiceRequest;
use std::time::Duration;

/// Identifier used when neither the peer address nor a forwarding header is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client identifier for a request.
///
/// Prefers the connection peer IP, then the raw `x-forwarded-for` header value, and finally
/// falls back to [UNKNOWN_CLIENT]. All clients without an address therefore share one window.
///
/// # Security
///
/// The `x-forwarded-for` header is client controlled. It is only consulted when the peer
/// address is unavailable, and should only be trusted when a proxy you control sets it.
pub fn client_identifier(req: &ServiceRequest) -> String {
    if let Some(peer) = req.peer_addr() {
        return peer.ip().to_string();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

/// Input function keying every request by its [client identifier](client_identifier) alone.
pub fn client_input(
    interval: Duration,
    max_requests: u64,
) -> impl Fn(&ServiceRequest) -> Result<SimpleInput, actix_web::Error> + 'static {
    move |req| {
        Ok(SimpleInput {
            interval,
            max_requests,
            key: client_identifier(req),
        })
    }
}
