//! Chrome extension contexts: the page-side client, the isolated relay, and the background
//! dispatcher.

use std::rc::Rc;

use assistant_host::{
    unix_time_ms_now, BridgeClient, BridgeRelay, ContentScript, ContentScriptConfig,
    PrivilegedDispatcher, PrivilegedFuture, PrivilegedHost, PrivilegedReply, PrivilegedRequest,
    PrivilegedTransport, RelayHandle, SessionArea, SessionFuture, TransportFuture,
};
#[cfg(target_arch = "wasm32")]
use leptos::logging;
use serde_json::Value;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{closure::Closure, JsValue};

use crate::{
    events::DomEventChannel, interop, runtime::browser_spawner, runtime::WebTimers,
    storage::local_storage::install_default_storage_factory,
};

/// `chrome.runtime.sendMessage` transport used by the relay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeRuntimeTransport;

impl PrivilegedTransport for ChromeRuntimeTransport {
    fn send(
        &self,
        request: PrivilegedRequest,
    ) -> TransportFuture<Result<Option<PrivilegedReply>, String>> {
        Box::pin(async move { interop::chrome_send_message(&request).await })
    }
}

/// `chrome.storage.session`, cleared when the browser session ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeSessionArea;

impl SessionArea for ChromeSessionArea {
    fn get_json<'a>(&'a self, key: &'a str) -> SessionFuture<'a, Result<Option<Value>, String>> {
        Box::pin(interop::chrome_session_get(key))
    }

    fn set_json<'a>(&'a self, key: &'a str, value: Value) -> SessionFuture<'a, Result<(), String>> {
        Box::pin(async move { interop::chrome_session_set(key, &value).await })
    }
}

/// Background-context extension APIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromePrivilegedHost;

impl PrivilegedHost for ChromePrivilegedHost {
    fn get_cookie<'a>(
        &'a self,
        url: &'a str,
        name: &'a str,
    ) -> PrivilegedFuture<'a, Result<Option<String>, String>> {
        Box::pin(interop::chrome_get_cookie(url, name))
    }

    fn runtime_url(&self, path: &str) -> Result<String, String> {
        interop::chrome_runtime_url(path)
    }

    fn fetch_bytes<'a>(&'a self, url: &'a str) -> PrivilegedFuture<'a, Result<Vec<u8>, String>> {
        Box::pin(interop::chrome_fetch_bytes(url))
    }

    fn request_permission<'a>(
        &'a self,
        origins: &'a [String],
    ) -> PrivilegedFuture<'a, Result<bool, String>> {
        Box::pin(interop::chrome_request_permission(origins))
    }

    fn permitted_origins(&self) -> PrivilegedFuture<'_, Result<Vec<String>, String>> {
        Box::pin(interop::chrome_permitted_origins())
    }

    fn unregister_content_scripts(&self) -> PrivilegedFuture<'_, Result<(), String>> {
        Box::pin(interop::chrome_unregister_scripts())
    }

    fn register_content_scripts<'a>(
        &'a self,
        scripts: &'a [ContentScript],
    ) -> PrivilegedFuture<'a, Result<(), String>> {
        Box::pin(interop::chrome_register_scripts(scripts))
    }

    fn now_ms(&self) -> u64 {
        unix_time_ms_now()
    }
}

/// Page-side bridge client over DOM events and browser timers.
pub fn bridge_client() -> BridgeClient {
    BridgeClient::new(
        Rc::new(DomEventChannel::default()),
        Rc::new(WebTimers::default()),
    )
}

/// Starts the isolated-world relay. Keep the handle alive (or [`RelayHandle::forget`] it) for as
/// long as requests should be relayed.
pub fn install_relay() -> RelayHandle {
    install_default_storage_factory();
    BridgeRelay::install(
        Rc::new(DomEventChannel::default()),
        Rc::new(ChromeRuntimeTransport),
        browser_spawner(),
    )
}

/// Builds the background dispatcher, answers runtime messages with it, and re-registers content
/// scripts for origins granted in earlier sessions.
///
/// # Errors
///
/// Returns an error when the runtime message listener cannot be attached.
pub fn install_background(scripts: ContentScriptConfig) -> Result<PrivilegedDispatcher, String> {
    install_default_storage_factory();
    let dispatcher = PrivilegedDispatcher::new(
        Rc::new(ChromePrivilegedHost),
        Rc::new(ChromeSessionArea),
        scripts,
    );

    #[cfg(target_arch = "wasm32")]
    {
        let handler = dispatcher.clone();
        let listener = Closure::wrap(Box::new(move |message: JsValue| -> JsValue {
            let Ok(request) = interop::request_from_js(message) else {
                return JsValue::UNDEFINED;
            };
            match handler.dispatch(request) {
                Some(reply) => wasm_bindgen_futures::future_to_promise(async move {
                    interop::reply_to_js(&reply.await)
                })
                .into(),
                None => JsValue::UNDEFINED,
            }
        }) as Box<dyn FnMut(JsValue) -> JsValue>);
        interop::chrome_on_message(&listener)?;
        listener.forget();

        let startup = dispatcher.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = startup.sync_content_scripts().await {
                logging::warn!("[bridge] startup content script registration failed: {err}");
            }
        });
    }

    Ok(dispatcher)
}
