//! Per-request cancellation token.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use tokio_util::sync::{CancellationToken, DropGuard};

/// A [`CancellationToken`] that fires when the handler future is dropped.
///
/// Hyper drops the handler future when the client disconnects, which drops
/// this extractor and cancels the token; storage calls racing the token
/// then stop early.
pub struct RequestCancellation {
    token: CancellationToken,
    _guard: DropGuard,
}

impl RequestCancellation {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        Self {
            token,
            _guard: guard,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for RequestCancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> FromRequestParts<S> for RequestCancellation
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cancelled_on_drop() {
        let cancellation = RequestCancellation::new();
        let token = cancellation.token().clone();
        assert!(!token.is_cancelled());

        drop(cancellation);
        assert!(token.is_cancelled());
    }
}
