//! Privileged-context dispatcher: the static action table and its handlers.

use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    rc::Rc,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::FutureExt;
use leptos::logging;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{client::HostCookies, BridgeAction, PrivilegedReply, PrivilegedRequest};
use crate::session::SessionArea;

/// Object-safe boxed future used by [`PrivilegedHost`] and the dispatcher.
pub type PrivilegedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Session-area key holding the current [`StoredSession`].
pub const SESSION_ID_KEY: &str = "pd.sessionId";
/// Session id lifetime, measured from creation.
pub const SESSION_TTL_MS: u64 = 30 * 60 * 1000;

const SESSION_COOKIE: &str = "overleaf_session2";
const GCLB_COOKIE: &str = "GCLB";

/// Privileged extension APIs the dispatcher handlers run against.
pub trait PrivilegedHost {
    /// Reads cookie `name` scoped to `url`.
    fn get_cookie<'a>(
        &'a self,
        url: &'a str,
        name: &'a str,
    ) -> PrivilegedFuture<'a, Result<Option<String>, String>>;

    /// Resolves a package-relative path to an absolute extension URL.
    fn runtime_url(&self, path: &str) -> Result<String, String>;

    /// Fetches `url` without the page's network restrictions.
    fn fetch_bytes<'a>(&'a self, url: &'a str) -> PrivilegedFuture<'a, Result<Vec<u8>, String>>;

    /// Prompts the user for host permission on `origins`.
    fn request_permission<'a>(
        &'a self,
        origins: &'a [String],
    ) -> PrivilegedFuture<'a, Result<bool, String>>;

    /// Lists every origin pattern currently granted.
    fn permitted_origins(&self) -> PrivilegedFuture<'_, Result<Vec<String>, String>>;

    /// Removes every dynamically registered content script.
    fn unregister_content_scripts(&self) -> PrivilegedFuture<'_, Result<(), String>>;

    /// Registers `scripts`.
    fn register_content_scripts<'a>(
        &'a self,
        scripts: &'a [ContentScript],
    ) -> PrivilegedFuture<'a, Result<(), String>>;

    /// Wall-clock time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Execution world of a content script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptWorld {
    /// Shares the page's JavaScript context.
    Main,
    /// Extension-private context with access to runtime messaging.
    Isolated,
}

/// Document lifecycle point at which a content script is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptRunAt {
    /// Before any page script runs.
    DocumentStart,
    /// After the document has settled.
    DocumentIdle,
}

/// One dynamic content-script registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentScript {
    /// Registration id.
    pub id: String,
    /// Script files, relative to the package root.
    pub js: Vec<String>,
    /// Origin match patterns.
    pub matches: Vec<String>,
    /// Execution world.
    pub world: ScriptWorld,
    /// Injection point.
    pub run_at: ScriptRunAt,
    /// Survives browser restarts.
    pub persist_across_sessions: bool,
}

/// Bundles injected into permitted origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentScriptConfig {
    /// UI bundle, injected into the page's main world.
    pub main_script: String,
    /// Relay bundle, injected into the isolated world.
    pub bridge_script: String,
}

impl Default for ContentScriptConfig {
    fn default() -> Self {
        Self {
            main_script: "content/main.js".to_string(),
            bridge_script: "content/bridge.js".to_string(),
        }
    }
}

impl ContentScriptConfig {
    /// The two registrations for `matches`.
    pub fn scripts(&self, matches: &[String]) -> [ContentScript; 2] {
        [
            ContentScript {
                id: "pd-main".to_string(),
                js: vec![self.main_script.clone()],
                matches: matches.to_vec(),
                world: ScriptWorld::Main,
                run_at: ScriptRunAt::DocumentIdle,
                persist_across_sessions: true,
            },
            ContentScript {
                id: "pd-bridge".to_string(),
                js: vec![self.bridge_script.clone()],
                matches: matches.to_vec(),
                world: ScriptWorld::Isolated,
                run_at: ScriptRunAt::DocumentStart,
                persist_across_sessions: true,
            },
        ]
    }
}

/// Converts an origin such as `https://example.com/` into the match pattern `https://example.com/*`.
pub fn origin_match_pattern(origin: &str) -> String {
    let origin = origin.trim();
    if origin.ends_with("/*") {
        return origin.to_string();
    }
    format!("{}/*", origin.trim_end_matches('/'))
}

/// Replaces the dynamic content scripts with registrations for `origins`.
///
/// Existing registrations are always removed first; nothing is registered for an empty list.
///
/// # Errors
///
/// Returns the host error from either step.
pub async fn register_content_scripts(
    host: &dyn PrivilegedHost,
    config: &ContentScriptConfig,
    origins: &[String],
) -> Result<(), String> {
    host.unregister_content_scripts().await?;
    if origins.is_empty() {
        return Ok(());
    }
    let scripts = config.scripts(origins);
    host.register_content_scripts(&scripts).await
}

/// Session id record kept in the session area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    /// Opaque session id.
    pub id: String,
    /// Creation time in milliseconds.
    pub created_at_ms: u64,
}

impl StoredSession {
    fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) < SESSION_TTL_MS
    }
}

/// Maps named actions to handlers and turns every handler outcome, panics included, into a
/// [`PrivilegedReply`].
#[derive(Clone)]
pub struct PrivilegedDispatcher {
    host: Rc<dyn PrivilegedHost>,
    session: Rc<dyn SessionArea>,
    scripts: Rc<ContentScriptConfig>,
}

impl PrivilegedDispatcher {
    /// Creates a dispatcher over `host`, keeping session ids in `session`.
    pub fn new(
        host: Rc<dyn PrivilegedHost>,
        session: Rc<dyn SessionArea>,
        scripts: ContentScriptConfig,
    ) -> Self {
        Self {
            host,
            session,
            scripts: Rc::new(scripts),
        }
    }

    /// Runs the handler named by `request`.
    ///
    /// Returns `None` for unknown actions so another listener may answer.
    pub fn dispatch(
        &self,
        request: PrivilegedRequest,
    ) -> Option<PrivilegedFuture<'static, PrivilegedReply>> {
        let action = BridgeAction::from_name(&request.action)?;
        let this = self.clone();
        Some(Box::pin(async move {
            match AssertUnwindSafe(this.run(action, request.args))
                .catch_unwind()
                .await
            {
                Ok(Ok(data)) => PrivilegedReply::Data(data),
                Ok(Err(message)) => {
                    logging::warn!("[bridge] `{}` failed: {message}", action.as_str());
                    PrivilegedReply::Error(Value::String(message))
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    logging::warn!("[bridge] `{}` panicked: {message}", action.as_str());
                    PrivilegedReply::Error(Value::String(message))
                }
            }
        }))
    }

    /// Registers content scripts for every origin already granted. Run at background startup.
    ///
    /// # Errors
    ///
    /// Returns the host error when origins cannot be listed or scripts cannot be registered.
    pub async fn sync_content_scripts(&self) -> Result<(), String> {
        let origins = self.host.permitted_origins().await?;
        register_content_scripts(self.host.as_ref(), &self.scripts, &origins).await
    }

    async fn run(&self, action: BridgeAction, args: Value) -> Result<Value, String> {
        match action {
            BridgeAction::GetCookies => {
                let cookies = self.get_cookies(&string_arg(action, &args)?).await?;
                serde_json::to_value(cookies).map_err(|err| err.to_string())
            }
            BridgeAction::GetUrl => self
                .host
                .runtime_url(&string_arg(action, &args)?)
                .map(Value::String),
            BridgeAction::GetOrCreateSessionId => {
                self.get_or_create_session_id().await.map(Value::String)
            }
            BridgeAction::FetchImage => {
                let bytes = self.host.fetch_bytes(&string_arg(action, &args)?).await?;
                Ok(Value::String(STANDARD.encode(bytes)))
            }
            BridgeAction::RequestHostPermission => self
                .request_host_permission(&string_arg(action, &args)?)
                .await
                .map(Value::Bool),
        }
    }

    async fn get_cookies(&self, domain: &str) -> Result<HostCookies, String> {
        let url = format!("https://{domain}");
        Ok(HostCookies {
            session: self.host.get_cookie(&url, SESSION_COOKIE).await?,
            gclb: self.host.get_cookie(&url, GCLB_COOKIE).await?,
        })
    }

    async fn get_or_create_session_id(&self) -> Result<String, String> {
        let now_ms = self.host.now_ms();
        let stored = self
            .session
            .get_json(SESSION_ID_KEY)
            .await?
            .and_then(|value| serde_json::from_value::<StoredSession>(value).ok());
        if let Some(session) = stored.filter(|session| session.is_valid_at(now_ms)) {
            return Ok(session.id);
        }

        let session = StoredSession {
            id: Uuid::new_v4().to_string(),
            created_at_ms: now_ms,
        };
        let value = serde_json::to_value(&session).map_err(|err| err.to_string())?;
        self.session.set_json(SESSION_ID_KEY, value).await?;
        Ok(session.id)
    }

    async fn request_host_permission(&self, origin: &str) -> Result<bool, String> {
        let pattern = [origin_match_pattern(origin)];
        if !self.host.request_permission(&pattern).await? {
            return Ok(false);
        }
        if let Err(err) = self.sync_content_scripts().await {
            logging::warn!("[bridge] content script registration failed: {err}");
        }
        Ok(true)
    }
}

fn string_arg(action: BridgeAction, args: &Value) -> Result<String, String> {
    args.as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("`{}` expects a string argument", action.as_str()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::HashMap,
    };

    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::session::MemorySessionArea;

    #[derive(Default)]
    struct FakeHost {
        cookies: HashMap<(String, String), String>,
        fetched: RefCell<Option<Result<Vec<u8>, String>>>,
        grant: Cell<bool>,
        origins: RefCell<Vec<String>>,
        calls: RefCell<Vec<String>>,
        registered: RefCell<Vec<ContentScript>>,
        now_ms: Cell<u64>,
    }

    impl PrivilegedHost for FakeHost {
        fn get_cookie<'a>(
            &'a self,
            url: &'a str,
            name: &'a str,
        ) -> PrivilegedFuture<'a, Result<Option<String>, String>> {
            Box::pin(async move {
                Ok(self
                    .cookies
                    .get(&(url.to_string(), name.to_string()))
                    .cloned())
            })
        }

        fn runtime_url(&self, path: &str) -> Result<String, String> {
            if path.is_empty() {
                return Err("empty path".to_string());
            }
            Ok(format!("chrome-extension://abc/{path}"))
        }

        fn fetch_bytes<'a>(
            &'a self,
            url: &'a str,
        ) -> PrivilegedFuture<'a, Result<Vec<u8>, String>> {
            Box::pin(async move {
                if url.contains("explode") {
                    panic!("fetch exploded");
                }
                self.fetched
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| Err("no response".to_string()))
            })
        }

        fn request_permission<'a>(
            &'a self,
            origins: &'a [String],
        ) -> PrivilegedFuture<'a, Result<bool, String>> {
            Box::pin(async move {
                self.calls
                    .borrow_mut()
                    .push(format!("request {}", origins.join(",")));
                if self.grant.get() {
                    self.origins.borrow_mut().extend(origins.iter().cloned());
                }
                Ok(self.grant.get())
            })
        }

        fn permitted_origins(&self) -> PrivilegedFuture<'_, Result<Vec<String>, String>> {
            Box::pin(async move { Ok(self.origins.borrow().clone()) })
        }

        fn unregister_content_scripts(&self) -> PrivilegedFuture<'_, Result<(), String>> {
            Box::pin(async move {
                self.calls.borrow_mut().push("unregister".to_string());
                self.registered.borrow_mut().clear();
                Ok(())
            })
        }

        fn register_content_scripts<'a>(
            &'a self,
            scripts: &'a [ContentScript],
        ) -> PrivilegedFuture<'a, Result<(), String>> {
            Box::pin(async move {
                self.calls.borrow_mut().push("register".to_string());
                self.registered.borrow_mut().extend(scripts.iter().cloned());
                Ok(())
            })
        }

        fn now_ms(&self) -> u64 {
            self.now_ms.get()
        }
    }

    fn dispatcher(host: FakeHost) -> (PrivilegedDispatcher, Rc<FakeHost>, MemorySessionArea) {
        let host = Rc::new(host);
        let session = MemorySessionArea::default();
        let dispatcher = PrivilegedDispatcher::new(
            host.clone(),
            Rc::new(session.clone()),
            ContentScriptConfig::default(),
        );
        (dispatcher, host, session)
    }

    fn call(dispatcher: &PrivilegedDispatcher, action: &str, args: Value) -> PrivilegedReply {
        let reply = dispatcher
            .dispatch(PrivilegedRequest {
                action: action.to_string(),
                args,
            })
            .expect("known action");
        block_on(reply)
    }

    #[test]
    fn get_cookies_reads_both_cookies_for_the_https_origin() {
        let mut host = FakeHost::default();
        host.cookies.insert(
            ("https://www.overleaf.com".to_string(), SESSION_COOKIE.to_string()),
            "s3cr3t".to_string(),
        );
        let (dispatcher, _, _) = dispatcher(host);

        assert_eq!(
            call(&dispatcher, "get-cookies", json!("www.overleaf.com")),
            PrivilegedReply::Data(json!({"session": "s3cr3t"}))
        );
    }

    #[test]
    fn session_id_is_reused_within_ttl_and_regenerated_after() {
        let host = FakeHost::default();
        host.now_ms.set(1_000_000);
        let (dispatcher, host, session) = dispatcher(host);

        let PrivilegedReply::Data(first) = call(&dispatcher, "get-or-create-session-id", json!(null))
        else {
            panic!("expected data reply");
        };

        host.now_ms.set(1_000_000 + 5 * 60 * 1000);
        assert_eq!(
            call(&dispatcher, "get-or-create-session-id", json!(null)),
            PrivilegedReply::Data(first.clone())
        );

        host.now_ms.set(1_000_000 + 31 * 60 * 1000);
        let PrivilegedReply::Data(second) =
            call(&dispatcher, "get-or-create-session-id", json!(null))
        else {
            panic!("expected data reply");
        };
        assert_ne!(first, second);
        assert_eq!(
            session.get::<StoredSession>(SESSION_ID_KEY),
            Some(StoredSession {
                id: second.as_str().expect("string id").to_string(),
                created_at_ms: 1_000_000 + 31 * 60 * 1000,
            })
        );
    }

    #[test]
    fn stored_session_is_reused_until_cleared() {
        let host = FakeHost::default();
        host.now_ms.set(2_000_000);
        let (dispatcher, _, session) = dispatcher(host);
        session
            .set(
                SESSION_ID_KEY,
                &StoredSession {
                    id: "existing".to_string(),
                    created_at_ms: 2_000_000 - 60 * 1000,
                },
            )
            .expect("seed session");

        assert_eq!(
            call(&dispatcher, "get-or-create-session-id", json!(null)),
            PrivilegedReply::Data(json!("existing"))
        );

        session.remove(SESSION_ID_KEY);
        let PrivilegedReply::Data(fresh) =
            call(&dispatcher, "get-or-create-session-id", json!(null))
        else {
            panic!("expected data reply");
        };
        assert_ne!(fresh, json!("existing"));
        assert_eq!(
            session.get::<StoredSession>(SESSION_ID_KEY).map(|stored| stored.id),
            fresh.as_str().map(str::to_string)
        );
    }

    #[test]
    fn fetch_image_returns_base64() {
        let host = FakeHost::default();
        *host.fetched.borrow_mut() = Some(Ok(b"hi".to_vec()));
        let (dispatcher, _, _) = dispatcher(host);

        assert_eq!(
            call(&dispatcher, "fetch-image", json!("https://img.example/a.png")),
            PrivilegedReply::Data(json!("aGk="))
        );
    }

    #[test]
    fn handler_errors_and_panics_become_error_replies() {
        let host = FakeHost::default();
        *host.fetched.borrow_mut() = Some(Err("HTTP 404".to_string()));
        let (dispatcher, _, _) = dispatcher(host);

        assert_eq!(
            call(&dispatcher, "fetch-image", json!("https://img.example/missing.png")),
            PrivilegedReply::Error(json!("HTTP 404"))
        );
        assert_eq!(
            call(&dispatcher, "fetch-image", json!("https://img.example/explode")),
            PrivilegedReply::Error(json!("fetch exploded"))
        );
        assert_eq!(
            call(&dispatcher, "get-url", json!(42)),
            PrivilegedReply::Error(json!("`get-url` expects a string argument"))
        );
        assert_eq!(
            call(&dispatcher, "get-url", json!("icons/logo.png")),
            PrivilegedReply::Data(json!("chrome-extension://abc/icons/logo.png"))
        );
    }

    #[test]
    fn unknown_actions_are_not_answered() {
        let (dispatcher, _, _) = dispatcher(FakeHost::default());
        assert!(dispatcher
            .dispatch(PrivilegedRequest {
                action: "delete-everything".to_string(),
                args: Value::Null,
            })
            .is_none());
    }

    #[test]
    fn granted_permission_re_registers_scripts_for_all_permitted_origins() {
        let host = FakeHost::default();
        host.grant.set(true);
        host.origins
            .borrow_mut()
            .push("https://www.overleaf.com/*".to_string());
        let (dispatcher, host, _) = dispatcher(host);

        assert_eq!(
            call(&dispatcher, "request-host-permission", json!("https://example.com/")),
            PrivilegedReply::Data(json!(true))
        );
        assert_eq!(
            *host.calls.borrow(),
            vec!["request https://example.com/*", "unregister", "register"]
        );

        let registered = host.registered.borrow();
        assert_eq!(registered.len(), 2);
        assert_eq!(registered[0].id, "pd-main");
        assert_eq!(registered[0].world, ScriptWorld::Main);
        assert_eq!(registered[1].id, "pd-bridge");
        assert_eq!(registered[1].run_at, ScriptRunAt::DocumentStart);
        assert!(registered.iter().all(|script| script.persist_across_sessions));
        assert_eq!(
            registered[1].matches,
            vec!["https://www.overleaf.com/*", "https://example.com/*"]
        );
    }

    #[test]
    fn denied_permission_leaves_registrations_alone() {
        let (dispatcher, host, _) = dispatcher(FakeHost::default());

        assert_eq!(
            call(&dispatcher, "request-host-permission", json!("https://example.com")),
            PrivilegedReply::Data(json!(false))
        );
        assert_eq!(*host.calls.borrow(), vec!["request https://example.com/*"]);
    }

    #[test]
    fn content_script_wire_shape() {
        let [main, _] = ContentScriptConfig::default().scripts(&["https://a.test/*".to_string()]);
        assert_eq!(
            serde_json::to_value(main).expect("serialize"),
            json!({
                "id": "pd-main",
                "js": ["content/main.js"],
                "matches": ["https://a.test/*"],
                "world": "MAIN",
                "runAt": "document_idle",
                "persistAcrossSessions": true,
            })
        );
    }

    #[test]
    fn match_patterns_from_origins() {
        assert_eq!(origin_match_pattern("https://example.com/"), "https://example.com/*");
        assert_eq!(origin_match_pattern("https://example.com"), "https://example.com/*");
        assert_eq!(origin_match_pattern("https://example.com/*"), "https://example.com/*");
    }
}
