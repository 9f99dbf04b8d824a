use std::sync::Arc;

use reqwest::RequestBuilder;

use crate::session::SessionStore;

/// Whether a request carries the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    Bearer,
    /// Register and login: sent without credentials.
    Exempt,
}

/// Point-in-time access to the current auth token.
pub trait TokenSource {
    /// Empty when there is no session.
    fn token(&self) -> String;
}

impl TokenSource for SessionStore {
    fn token(&self) -> String {
        SessionStore::token(self)
    }
}

/// Adds `Authorization: Bearer <token>` to outgoing requests.
#[derive(Clone)]
pub struct AuthInterceptor {
    tokens: Arc<dyn TokenSource + Send + Sync>,
}

impl AuthInterceptor {
    pub fn new(tokens: Arc<dyn TokenSource + Send + Sync>) -> Self {
        Self { tokens }
    }

    pub fn intercept(&self, request: RequestBuilder, policy: AuthPolicy) -> RequestBuilder {
        let token = self.tokens.token();

        if token.is_empty() || policy == AuthPolicy::Exempt {
            return request;
        }

        request.bearer_auth(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use reqwest::Client;

    struct FixedToken(&'static str);

    impl TokenSource for FixedToken {
        fn token(&self) -> String {
            self.0.to_string()
        }
    }

    fn authorization(token: &'static str, policy: AuthPolicy) -> Option<String> {
        let interceptor = AuthInterceptor::new(Arc::new(FixedToken(token)));
        let request = interceptor
            .intercept(Client::new().get("http://localhost/stories"), policy)
            .build()
            .unwrap();
        request
            .headers()
            .get(AUTHORIZATION)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn test_bearer_added_when_token_present() {
        assert_eq!(
            authorization("abc123", AuthPolicy::Bearer),
            Some("Bearer abc123".to_string())
        );
    }

    #[test]
    fn test_no_header_without_token() {
        assert_eq!(authorization("", AuthPolicy::Bearer), None);
    }

    #[test]
    fn test_exempt_request_untouched() {
        assert_eq!(authorization("abc123", AuthPolicy::Exempt), None);
    }

    #[test]
    fn test_reads_token_at_request_time() {
        use crate::domain::Session;
        use crate::store::SqliteStore;

        let session = Arc::new(
            SessionStore::with_default_language(Arc::new(SqliteStore::in_memory().unwrap()), "en")
                .unwrap(),
        );
        let interceptor = AuthInterceptor::new(session.clone());
        let build = || {
            interceptor
                .intercept(Client::new().get("http://localhost/stories"), AuthPolicy::Bearer)
                .build()
                .unwrap()
        };

        assert!(build().headers().get(AUTHORIZATION).is_none());

        session
            .save_session(&Session::new("user-1", "Ana", "fresh"))
            .unwrap();
        assert_eq!(
            build().headers().get(AUTHORIZATION).unwrap(),
            "Bearer fresh"
        );
    }
}
