//! Session & configuration store.
//!
//! Sessions are in-memory and keyed by a random UUID carried in a signed
//! cookie:
//!
//! ```text
//! sc_session=<uuid v4>.<hex HMAC-SHA256(uuid, secret)>; HttpOnly; SameSite=Lax; Path=/
//! ```
//!
//! A missing cookie, a bad signature, or a key the store no longer knows
//! yields a fresh key with an implicit unauthenticated session. Nothing is
//! stored for that key until a handler first calls [`SessionStore::update`],
//! and the cookie is only issued once the session exists. `SessionLayer`
//! resolves the key before every request and exposes it as a request
//! extension.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderValue, Request};
use axum::response::Response;
use futures::future::BoxFuture;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sc_01_device_auth::{DeviceIdentity, SessionAuth};
use sc_02_enhancement_pipeline::FilterConfig;
use sha2::Sha256;
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

use crate::domain::error::GatewayError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "sc_session";

type HmacSha256 = Hmac<Sha256>;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(Uuid);

impl SessionKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-client state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub authenticated: bool,
    /// Identity of the device that authenticated this session
    pub device: Option<DeviceIdentity>,
    /// Last configuration set by the client
    pub config: Option<FilterConfig>,
}

impl SessionAuth for Session {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// In-memory session table with signed keys.
pub struct SessionStore {
    mac: HmacSha256,
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl SessionStore {
    pub fn new(secret: &str) -> Result<Self, GatewayError> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| GatewayError::Config(format!("session key: {e}")))?;
        Ok(Self {
            mac,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Cookie value for a key.
    pub fn sign(&self, key: &SessionKey) -> String {
        let mut mac = self.mac.clone();
        mac.update(key.0.as_bytes());
        format!("{}.{}", key.0, hex::encode(mac.finalize().into_bytes()))
    }

    /// Parse and verify a cookie value.
    pub fn verify(&self, value: &str) -> Option<SessionKey> {
        let (id, signature) = value.split_once('.')?;
        let id = Uuid::parse_str(id).ok()?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(SessionKey(id))
    }

    /// Find the session named by a cookie value, or mint a fresh key.
    ///
    /// Returns the key and whether it is new. A new key is not stored.
    pub fn resolve(&self, cookie: Option<&str>) -> (SessionKey, bool) {
        let known = cookie
            .and_then(|value| self.verify(value))
            .filter(|key| self.contains(key));

        match known {
            Some(key) => (key, false),
            None => (SessionKey::new(), true),
        }
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.lock().contains_key(key)
    }

    /// Snapshot of a session.
    pub fn get(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.lock().get(key).cloned()
    }

    /// Mutate a session in place, storing it on first write.
    pub fn update<R>(&self, key: &SessionKey, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.lock();
        f(sessions.entry(*key).or_default())
    }

    pub fn remove(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

/// Find the session cookie among all `Cookie` headers.
fn session_cookie<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` header value for a signed key.
pub fn set_cookie_value(signed: &str) -> String {
    format!("{SESSION_COOKIE}={signed}; HttpOnly; SameSite=Lax; Path=/")
}

/// Layer that attaches a `SessionKey` to every request.
#[derive(Clone)]
pub struct SessionLayer {
    store: Arc<SessionStore>,
}

impl SessionLayer {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            store: Arc::clone(&self.store),
        }
    }
}

/// Session resolution service
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    store: Arc<SessionStore>,
}

impl<S> Service<Request<Body>> for SessionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let store = Arc::clone(&self.store);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let cookie = session_cookie(&req);
            let (key, created) = store.resolve(cookie.as_deref());
            req.extensions_mut().insert(key);

            let mut response = inner.call(req).await?;

            if created && store.contains(&key) {
                debug!(session = %key, "Created session");
                if let Ok(value) = HeaderValue::from_str(&set_cookie_value(&store.sign(&key))) {
                    response.headers_mut().append(SET_COOKIE, value);
                }
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    fn store() -> SessionStore {
        SessionStore::new("cookie-secret").unwrap()
    }

    #[test]
    fn test_sign_verify() {
        let store = store();
        let key = SessionKey::new();
        let signed = store.sign(&key);
        assert_eq!(store.verify(&signed), Some(key));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let store = store();
        let key = SessionKey::new();
        let signed = store.sign(&key);

        let other = SessionKey::new();
        let (_, sig) = signed.split_once('.').unwrap();
        assert_eq!(store.verify(&format!("{other}.{sig}")), None);
        assert_eq!(store.verify("garbage"), None);
        assert_eq!(store.verify(&format!("{key}.zz")), None);
    }

    #[test]
    fn test_other_secret_rejected() {
        let key = SessionKey::new();
        let signed = SessionStore::new("a").unwrap().sign(&key);
        assert_eq!(SessionStore::new("b").unwrap().verify(&signed), None);
    }

    #[test]
    fn test_resolve_does_not_store() {
        let store = store();
        for _ in 0..100 {
            let (key, created) = store.resolve(None);
            assert!(created);
            assert!(store.get(&key).is_none());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_resolve_reuses_known_session() {
        let store = store();
        let (key, _) = store.resolve(None);
        store.update(&key, |s| s.authenticated = false);

        let signed = store.sign(&key);
        assert_eq!(store.resolve(Some(signed.as_str())), (key, false));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_signed_but_unstored_key_is_replaced() {
        let store = store();
        let (key, _) = store.resolve(None);
        let signed = store.sign(&key);

        let (fresh, created) = store.resolve(Some(signed.as_str()));
        assert!(created);
        assert_ne!(fresh, key);
    }

    #[test]
    fn test_resolve_after_removal_creates_fresh() {
        let store = store();
        let (key, _) = store.resolve(None);
        store.update(&key, |s| s.authenticated = true);
        let signed = store.sign(&key);
        store.remove(&key);

        let (fresh, created) = store.resolve(Some(signed.as_str()));
        assert!(created);
        assert_ne!(fresh, key);
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_and_auth() {
        let store = store();
        let (key, _) = store.resolve(None);
        assert!(!store.get(&key).unwrap_or_default().is_authenticated());

        store.update(&key, |s| s.authenticated = true);
        assert!(store.get(&key).unwrap().is_authenticated());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cookie_parsing() {
        let req = Request::builder()
            .header(COOKIE, "theme=dark; sc_session=abc.def; other=1")
            .body(())
            .unwrap();
        assert_eq!(session_cookie(&req).as_deref(), Some("abc.def"));

        let none = Request::builder().body(()).unwrap();
        assert_eq!(session_cookie(&none), None);
    }

    fn layered(
        store: &Arc<SessionStore>,
    ) -> impl Service<Request<Body>, Response = Response, Error = std::convert::Infallible> + Clone
    {
        let writer = Arc::clone(store);
        let inner = tower::service_fn(move |req: Request<Body>| {
            let store = Arc::clone(&writer);
            async move {
                let key = *req.extensions().get::<SessionKey>().unwrap();
                if req.uri().path() == "/write" {
                    store.update(&key, |s| s.authenticated = true);
                }
                Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
            }
        });
        SessionLayer::new(Arc::clone(store)).layer(inner)
    }

    fn request(path: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_layer_skips_cookie_for_untouched_session() {
        let store = Arc::new(store());
        let service = layered(&store);

        for _ in 0..50 {
            let response =
                tokio_test::block_on(service.clone().oneshot(request("/read", None))).unwrap();
            assert!(response.headers().get(SET_COOKIE).is_none());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_layer_sets_cookie_once() {
        let store = Arc::new(store());
        let service = layered(&store);

        let first =
            tokio_test::block_on(service.clone().oneshot(request("/write", None))).unwrap();
        let cookie = first.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let pair = cookie.split(';').next().unwrap().to_string();
        assert_eq!(store.len(), 1);

        let second =
            tokio_test::block_on(service.oneshot(request("/write", Some(&pair)))).unwrap();
        assert!(second.headers().get(SET_COOKIE).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_cookie_attributes() {
        let value = set_cookie_value("k.s");
        assert!(value.starts_with("sc_session=k.s;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Path=/"));
    }
}
