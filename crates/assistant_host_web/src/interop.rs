//! JS interop for the browser, Office, and extension hosts, with a non-wasm fallback shim.
//!
//! Every call returns `Result<_, String>` or an option; typed errors are applied by the adapter
//! types built on top of this module. Closure-taking bindings only exist on `wasm32`.

use assistant_host::{ContentScript, PrivilegedReply, PrivilegedRequest};
use serde::Deserialize;
use serde_json::Value;

/// Selection snapshot returned by the Word binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WordSelectionPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use super::*;
    use js_sys::{Promise, Uint8Array};
    use serde::Serialize;
    use serde_wasm_bindgen::{from_value, Serializer};
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;

    #[wasm_bindgen(inline_js = r#"
function fail(message) {
  throw new Error(message);
}

function cmView() {
  const content = document.querySelector('.cm-content');
  return content && content.cmView ? content.cmView.view : null;
}

const TEXT_INPUT_TYPES = new Set(['text', 'search', 'url', 'email', 'tel', '']);
let lastField = null;

function isTextField(el) {
  if (!el) return false;
  if (el.tagName === 'TEXTAREA') return true;
  return el.tagName === 'INPUT' && TEXT_INPUT_TYPES.has((el.getAttribute('type') || '').toLowerCase());
}

if (typeof document !== 'undefined') {
  document.addEventListener('focusin', (event) => {
    if (isTextField(event.target)) lastField = event.target;
  }, true);
}

function field() {
  if (isTextField(document.activeElement)) lastField = document.activeElement;
  return lastField && lastField.isConnected ? lastField : null;
}

function wordReady() {
  return typeof Word !== 'undefined' && typeof Office !== 'undefined' && !!Office.context;
}

let wordSelectionListener = null;

function settingsBag() {
  if (!wordReady() || !Office.context.document || !Office.context.document.settings) {
    fail('Office document settings are not available');
  }
  return Office.context.document.settings;
}

function chromeApi(path) {
  let node = typeof chrome === 'undefined' ? undefined : chrome;
  for (const part of path.split('.')) {
    node = node ? node[part] : undefined;
  }
  if (!node) fail(`chrome.${path} is not available`);
  return node;
}

export function jsCmMounted() { return cmView() !== null; }
export function jsCmText() {
  const view = cmView();
  return view ? view.state.doc.toString() : null;
}
export function jsCmSelection() {
  const view = cmView();
  if (!view) return null;
  const main = view.state.selection.main;
  return [main.anchor, main.head];
}
export function jsCmApply(from, to, insert, cursor) {
  const view = cmView();
  if (!view) fail('CodeMirror editor not found');
  view.dispatch({ changes: { from, to, insert }, selection: { anchor: cursor } });
  view.focus();
}

export function jsFieldMounted() { return field() !== null; }
export function jsFieldText() {
  const el = field();
  return el ? el.value : null;
}
export function jsFieldSelection() {
  const el = field();
  if (!el || el.selectionStart === null) return null;
  return el.selectionDirection === 'backward'
    ? [el.selectionEnd, el.selectionStart]
    : [el.selectionStart, el.selectionEnd];
}
export function jsFieldApply(from, to, insert, cursor) {
  const el = field();
  if (!el) fail('No focused text field');
  el.setRangeText(insert, from, to, 'end');
  el.setSelectionRange(cursor, cursor);
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.focus();
}

export function jsWordAvailable() { return wordReady(); }
export async function jsWordBodyText() {
  return await Word.run(async (ctx) => {
    const body = ctx.document.body;
    body.load('text');
    await ctx.sync();
    return body.text;
  });
}
export async function jsWordSelection() {
  return await Word.run(async (ctx) => {
    const selection = ctx.document.getSelection();
    selection.load('text');
    const paragraphs = selection.paragraphs;
    paragraphs.load('items');
    await ctx.sync();
    if (paragraphs.items.length === 0) {
      return { text: selection.text, before: '', after: '' };
    }
    const first = paragraphs.items[0];
    const last = paragraphs.items[paragraphs.items.length - 1];
    const before = first.getRange('Start').expandTo(selection.getRange('Start'));
    const after = selection.getRange('End').expandTo(last.getRange('End'));
    before.load('text');
    after.load('text');
    await ctx.sync();
    return { text: selection.text, before: before.text, after: after.text };
  });
}
export async function jsWordInsert(text, location) {
  await Word.run(async (ctx) => {
    if (location === 'Replace') {
      ctx.document.getSelection().insertText(text, 'Replace');
    } else {
      ctx.document.body.insertText(text, location);
    }
    await ctx.sync();
  });
}
export function jsWordDocumentUrl() {
  return wordReady() && Office.context.document ? (Office.context.document.url || null) : null;
}
export function jsWordAttachSelectionEvent(handler) {
  if (!wordReady()) fail('Word API not available');
  if (wordSelectionListener) return;
  wordSelectionListener = () => handler();
  Office.context.document.addHandlerAsync(Office.EventType.DocumentSelectionChanged, wordSelectionListener);
}
export function jsWordDetachSelectionEvent() {
  const listener = wordSelectionListener;
  wordSelectionListener = null;
  if (!listener || !wordReady()) return;
  Office.context.document.removeHandlerAsync(Office.EventType.DocumentSelectionChanged, { handler: listener });
}

export function jsSettingsGet(key) {
  const value = settingsBag().get(key);
  return value === null || value === undefined ? null : JSON.stringify(value);
}
export function jsSettingsSet(key, json) { settingsBag().set(key, JSON.parse(json)); }
export function jsSettingsRemove(key) { settingsBag().remove(key); }
export function jsSettingsSave() {
  return new Promise((resolve, reject) => {
    settingsBag().saveAsync((result) => {
      if (result.status === Office.AsyncResultStatus.Succeeded) resolve();
      else reject(result.error || new Error('settings save failed'));
    });
  });
}

export function jsEventDispatch(name, detail) {
  window.dispatchEvent(new CustomEvent(name, { detail }));
}
export function jsEventListen(name, callback) {
  const listener = (event) => {
    const detail = event.detail;
    callback(typeof detail === 'string' ? detail : JSON.stringify(detail === undefined ? null : detail));
  };
  window.addEventListener(name, listener);
  return listener;
}
export function jsEventUnlisten(name, listener) { window.removeEventListener(name, listener); }

export function jsSleep(ms) { return new Promise((resolve) => setTimeout(resolve, ms)); }
export function jsSetInterval(ms, tick) { return setInterval(() => tick(), ms); }
export function jsClearInterval(id) { clearInterval(id); }

export async function jsChromeGetCookie(url, name) {
  const cookie = await chromeApi('cookies').get({ url, name });
  return cookie ? cookie.value : null;
}
export function jsChromeRuntimeUrl(path) { return chromeApi('runtime').getURL(path); }
export async function jsChromeFetchBytes(url) {
  const response = await fetch(url);
  if (!response.ok) fail(`HTTP ${response.status}`);
  return new Uint8Array(await response.arrayBuffer());
}
export async function jsChromeRequestPermission(origins) {
  return await chromeApi('permissions').request({ origins });
}
export async function jsChromePermittedOrigins() {
  const all = await chromeApi('permissions').getAll();
  return all.origins || [];
}
export async function jsChromeUnregisterScripts() {
  await chromeApi('scripting').unregisterContentScripts();
}
export async function jsChromeRegisterScripts(scripts) {
  await chromeApi('scripting').registerContentScripts(scripts);
}
export async function jsChromeSessionGet(key) {
  const items = await chromeApi('storage.session').get(key);
  return items[key] === undefined ? null : items[key];
}
export async function jsChromeSessionSet(key, value) {
  await chromeApi('storage.session').set({ [key]: value });
}
export async function jsChromeSendMessage(message) {
  const reply = await chromeApi('runtime').sendMessage(message);
  return reply === undefined ? null : reply;
}
export function jsChromeOnMessage(handler) {
  chromeApi('runtime').onMessage.addListener((message, _sender, sendResponse) => {
    const pending = handler(message);
    if (!pending) return false;
    pending.then(sendResponse, (err) => sendResponse({ error: String((err && err.message) || err) }));
    return true;
  });
}
"#)]
    extern "C" {
        #[wasm_bindgen(js_name = jsCmMounted)]
        fn js_cm_mounted() -> bool;
        #[wasm_bindgen(js_name = jsCmText)]
        fn js_cm_text() -> Option<String>;
        #[wasm_bindgen(js_name = jsCmSelection)]
        fn js_cm_selection() -> JsValue;
        #[wasm_bindgen(catch, js_name = jsCmApply)]
        fn js_cm_apply(from: u32, to: u32, insert: &str, cursor: u32) -> Result<(), JsValue>;

        #[wasm_bindgen(js_name = jsFieldMounted)]
        fn js_field_mounted() -> bool;
        #[wasm_bindgen(js_name = jsFieldText)]
        fn js_field_text() -> Option<String>;
        #[wasm_bindgen(js_name = jsFieldSelection)]
        fn js_field_selection() -> JsValue;
        #[wasm_bindgen(catch, js_name = jsFieldApply)]
        fn js_field_apply(from: u32, to: u32, insert: &str, cursor: u32) -> Result<(), JsValue>;

        #[wasm_bindgen(js_name = jsWordAvailable)]
        fn js_word_available() -> bool;
        #[wasm_bindgen(js_name = jsWordBodyText)]
        fn js_word_body_text() -> Promise;
        #[wasm_bindgen(js_name = jsWordSelection)]
        fn js_word_selection() -> Promise;
        #[wasm_bindgen(js_name = jsWordInsert)]
        fn js_word_insert(text: &str, location: &str) -> Promise;
        #[wasm_bindgen(js_name = jsWordDocumentUrl)]
        fn js_word_document_url() -> Option<String>;
        #[wasm_bindgen(catch, js_name = jsWordAttachSelectionEvent)]
        fn js_word_attach_selection_event(handler: &Closure<dyn FnMut()>) -> Result<(), JsValue>;
        #[wasm_bindgen(js_name = jsWordDetachSelectionEvent)]
        fn js_word_detach_selection_event();

        #[wasm_bindgen(catch, js_name = jsSettingsGet)]
        fn js_settings_get(key: &str) -> Result<Option<String>, JsValue>;
        #[wasm_bindgen(catch, js_name = jsSettingsSet)]
        fn js_settings_set(key: &str, json: &str) -> Result<(), JsValue>;
        #[wasm_bindgen(catch, js_name = jsSettingsRemove)]
        fn js_settings_remove(key: &str) -> Result<(), JsValue>;
        #[wasm_bindgen(catch, js_name = jsSettingsSave)]
        fn js_settings_save() -> Result<Promise, JsValue>;

        #[wasm_bindgen(js_name = jsEventDispatch)]
        fn js_event_dispatch(name: &str, detail: &str);
        #[wasm_bindgen(js_name = jsEventListen)]
        fn js_event_listen(name: &str, callback: &Closure<dyn FnMut(String)>) -> JsValue;
        #[wasm_bindgen(js_name = jsEventUnlisten)]
        fn js_event_unlisten(name: &str, listener: &JsValue);

        #[wasm_bindgen(js_name = jsSleep)]
        fn js_sleep(ms: u32) -> Promise;
        #[wasm_bindgen(js_name = jsSetInterval)]
        fn js_set_interval(ms: u32, tick: &Closure<dyn FnMut()>) -> f64;
        #[wasm_bindgen(js_name = jsClearInterval)]
        fn js_clear_interval(id: f64);

        #[wasm_bindgen(js_name = jsChromeGetCookie)]
        fn js_chrome_get_cookie(url: &str, name: &str) -> Promise;
        #[wasm_bindgen(catch, js_name = jsChromeRuntimeUrl)]
        fn js_chrome_runtime_url(path: &str) -> Result<String, JsValue>;
        #[wasm_bindgen(js_name = jsChromeFetchBytes)]
        fn js_chrome_fetch_bytes(url: &str) -> Promise;
        #[wasm_bindgen(js_name = jsChromeRequestPermission)]
        fn js_chrome_request_permission(origins: JsValue) -> Promise;
        #[wasm_bindgen(js_name = jsChromePermittedOrigins)]
        fn js_chrome_permitted_origins() -> Promise;
        #[wasm_bindgen(js_name = jsChromeUnregisterScripts)]
        fn js_chrome_unregister_scripts() -> Promise;
        #[wasm_bindgen(js_name = jsChromeRegisterScripts)]
        fn js_chrome_register_scripts(scripts: JsValue) -> Promise;
        #[wasm_bindgen(js_name = jsChromeSessionGet)]
        fn js_chrome_session_get(key: &str) -> Promise;
        #[wasm_bindgen(js_name = jsChromeSessionSet)]
        fn js_chrome_session_set(key: &str, value: JsValue) -> Promise;
        #[wasm_bindgen(js_name = jsChromeSendMessage)]
        fn js_chrome_send_message(message: JsValue) -> Promise;
        #[wasm_bindgen(catch, js_name = jsChromeOnMessage)]
        fn js_chrome_on_message(
            handler: &Closure<dyn FnMut(JsValue) -> JsValue>,
        ) -> Result<(), JsValue>;
    }

    pub fn js_error_to_string(err: JsValue) -> String {
        if let Some(text) = err.as_string() {
            return text;
        }
        if let Ok(message) = js_sys::Reflect::get(&err, &JsValue::from_str("message")) {
            if let Some(text) = message.as_string() {
                return text;
            }
        }
        format!("{err:?}")
    }

    async fn await_promise(promise: Promise) -> Result<JsValue, String> {
        JsFuture::from(promise).await.map_err(js_error_to_string)
    }

    fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
        value
            .serialize(&Serializer::json_compatible())
            .map_err(|e| e.to_string())
    }

    fn pair(value: JsValue) -> Option<(u32, u32)> {
        from_value::<Option<(u32, u32)>>(value).ok().flatten()
    }

    pub fn cm_is_mounted() -> bool {
        js_cm_mounted()
    }

    pub fn cm_text() -> Option<String> {
        js_cm_text()
    }

    pub fn cm_selection() -> Option<(u32, u32)> {
        pair(js_cm_selection())
    }

    pub fn cm_apply(from: u32, to: u32, insert: &str, cursor: u32) -> Result<(), String> {
        js_cm_apply(from, to, insert, cursor).map_err(js_error_to_string)
    }

    pub fn field_is_mounted() -> bool {
        js_field_mounted()
    }

    pub fn field_text() -> Option<String> {
        js_field_text()
    }

    pub fn field_selection() -> Option<(u32, u32)> {
        pair(js_field_selection())
    }

    pub fn field_apply(from: u32, to: u32, insert: &str, cursor: u32) -> Result<(), String> {
        js_field_apply(from, to, insert, cursor).map_err(js_error_to_string)
    }

    pub fn location_href() -> Option<String> {
        web_sys::window()?.location().href().ok()
    }

    pub fn location_pathname() -> Option<String> {
        web_sys::window()?.location().pathname().ok()
    }

    pub fn word_available() -> bool {
        js_word_available()
    }

    pub async fn word_body_text() -> Result<String, String> {
        let value = await_promise(js_word_body_text()).await?;
        value
            .as_string()
            .ok_or_else(|| "Word returned a non-string body".to_string())
    }

    pub async fn word_selection() -> Result<WordSelectionPayload, String> {
        let value = await_promise(js_word_selection()).await?;
        from_value(value).map_err(|e| e.to_string())
    }

    pub async fn word_insert(text: &str, location: &str) -> Result<(), String> {
        await_promise(js_word_insert(text, location)).await?;
        Ok(())
    }

    pub fn word_document_url() -> Option<String> {
        js_word_document_url()
    }

    pub fn word_attach_selection_event(handler: &Closure<dyn FnMut()>) -> Result<(), String> {
        js_word_attach_selection_event(handler).map_err(js_error_to_string)
    }

    pub fn word_detach_selection_event() {
        js_word_detach_selection_event();
    }

    pub fn settings_get(key: &str) -> Result<Option<Value>, String> {
        match js_settings_get(key).map_err(js_error_to_string)? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| e.to_string()),
            None => Ok(None),
        }
    }

    pub fn settings_set(key: &str, value: &Value) -> Result<(), String> {
        js_settings_set(key, &value.to_string()).map_err(js_error_to_string)
    }

    pub fn settings_remove(key: &str) -> Result<(), String> {
        js_settings_remove(key).map_err(js_error_to_string)
    }

    pub async fn settings_save() -> Result<(), String> {
        let promise = js_settings_save().map_err(js_error_to_string)?;
        await_promise(promise).await?;
        Ok(())
    }

    pub fn event_dispatch(name: &str, detail: &Value) {
        js_event_dispatch(name, &detail.to_string());
    }

    pub fn event_listen(name: &str, callback: &Closure<dyn FnMut(String)>) -> JsValue {
        js_event_listen(name, callback)
    }

    pub fn event_unlisten(name: &str, listener: &JsValue) {
        js_event_unlisten(name, listener);
    }

    pub async fn sleep(ms: u32) {
        let _ = JsFuture::from(js_sleep(ms)).await;
    }

    pub fn set_interval(ms: u32, tick: &Closure<dyn FnMut()>) -> f64 {
        js_set_interval(ms, tick)
    }

    pub fn clear_interval(id: f64) {
        js_clear_interval(id);
    }

    pub async fn chrome_get_cookie(url: &str, name: &str) -> Result<Option<String>, String> {
        let value = await_promise(js_chrome_get_cookie(url, name)).await?;
        Ok(value.as_string())
    }

    pub fn chrome_runtime_url(path: &str) -> Result<String, String> {
        js_chrome_runtime_url(path).map_err(js_error_to_string)
    }

    pub async fn chrome_fetch_bytes(url: &str) -> Result<Vec<u8>, String> {
        let value = await_promise(js_chrome_fetch_bytes(url)).await?;
        Ok(Uint8Array::new(&value).to_vec())
    }

    pub async fn chrome_request_permission(origins: &[String]) -> Result<bool, String> {
        let value = await_promise(js_chrome_request_permission(to_js(origins)?)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn chrome_permitted_origins() -> Result<Vec<String>, String> {
        let value = await_promise(js_chrome_permitted_origins()).await?;
        from_value(value).map_err(|e| e.to_string())
    }

    pub async fn chrome_unregister_scripts() -> Result<(), String> {
        await_promise(js_chrome_unregister_scripts()).await?;
        Ok(())
    }

    pub async fn chrome_register_scripts(scripts: &[ContentScript]) -> Result<(), String> {
        await_promise(js_chrome_register_scripts(to_js(scripts)?)).await?;
        Ok(())
    }

    pub async fn chrome_session_get(key: &str) -> Result<Option<Value>, String> {
        let value = await_promise(js_chrome_session_get(key)).await?;
        if value.is_null() || value.is_undefined() {
            Ok(None)
        } else {
            from_value(value).map(Some).map_err(|e| e.to_string())
        }
    }

    pub async fn chrome_session_set(key: &str, value: &Value) -> Result<(), String> {
        await_promise(js_chrome_session_set(key, to_js(value)?)).await?;
        Ok(())
    }

    pub async fn chrome_send_message(
        request: &PrivilegedRequest,
    ) -> Result<Option<PrivilegedReply>, String> {
        let value = await_promise(js_chrome_send_message(to_js(request)?)).await?;
        if value.is_null() || value.is_undefined() {
            Ok(None)
        } else {
            from_value(value).map(Some).map_err(|e| e.to_string())
        }
    }

    pub fn chrome_on_message(
        handler: &Closure<dyn FnMut(JsValue) -> JsValue>,
    ) -> Result<(), String> {
        js_chrome_on_message(handler).map_err(js_error_to_string)
    }

    pub fn reply_to_js(reply: &PrivilegedReply) -> Result<JsValue, JsValue> {
        to_js(reply).map_err(|err| JsValue::from_str(&err))
    }

    pub fn request_from_js(message: JsValue) -> Result<PrivilegedRequest, String> {
        from_value(message).map_err(|e| e.to_string())
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use super::*;

    fn unsupported(api: &str) -> String {
        format!("{api} is only available when compiled for wasm32")
    }

    pub fn cm_is_mounted() -> bool {
        false
    }

    pub fn cm_text() -> Option<String> {
        None
    }

    pub fn cm_selection() -> Option<(u32, u32)> {
        None
    }

    pub fn cm_apply(_from: u32, _to: u32, _insert: &str, _cursor: u32) -> Result<(), String> {
        Err(unsupported("CodeMirror"))
    }

    pub fn field_is_mounted() -> bool {
        false
    }

    pub fn field_text() -> Option<String> {
        None
    }

    pub fn field_selection() -> Option<(u32, u32)> {
        None
    }

    pub fn field_apply(_from: u32, _to: u32, _insert: &str, _cursor: u32) -> Result<(), String> {
        Err(unsupported("DOM text field"))
    }

    pub fn location_href() -> Option<String> {
        None
    }

    pub fn location_pathname() -> Option<String> {
        None
    }

    pub fn word_available() -> bool {
        false
    }

    pub async fn word_body_text() -> Result<String, String> {
        Err(unsupported("Word"))
    }

    pub async fn word_selection() -> Result<WordSelectionPayload, String> {
        Err(unsupported("Word"))
    }

    pub async fn word_insert(_text: &str, _location: &str) -> Result<(), String> {
        Err(unsupported("Word"))
    }

    pub fn word_document_url() -> Option<String> {
        None
    }

    pub fn word_detach_selection_event() {}

    pub fn settings_get(_key: &str) -> Result<Option<Value>, String> {
        Err(unsupported("Office document settings"))
    }

    pub fn settings_set(_key: &str, _value: &Value) -> Result<(), String> {
        Err(unsupported("Office document settings"))
    }

    pub fn settings_remove(_key: &str) -> Result<(), String> {
        Err(unsupported("Office document settings"))
    }

    pub async fn settings_save() -> Result<(), String> {
        Err(unsupported("Office document settings"))
    }

    pub async fn chrome_get_cookie(_url: &str, _name: &str) -> Result<Option<String>, String> {
        Err(unsupported("chrome.cookies"))
    }

    pub fn chrome_runtime_url(_path: &str) -> Result<String, String> {
        Err(unsupported("chrome.runtime"))
    }

    pub async fn chrome_fetch_bytes(_url: &str) -> Result<Vec<u8>, String> {
        Err(unsupported("fetch"))
    }

    pub async fn chrome_request_permission(_origins: &[String]) -> Result<bool, String> {
        Err(unsupported("chrome.permissions"))
    }

    pub async fn chrome_permitted_origins() -> Result<Vec<String>, String> {
        Ok(Vec::new())
    }

    pub async fn chrome_unregister_scripts() -> Result<(), String> {
        Err(unsupported("chrome.scripting"))
    }

    pub async fn chrome_register_scripts(_scripts: &[ContentScript]) -> Result<(), String> {
        Err(unsupported("chrome.scripting"))
    }

    pub async fn chrome_session_get(_key: &str) -> Result<Option<Value>, String> {
        Err(unsupported("chrome.storage.session"))
    }

    pub async fn chrome_session_set(_key: &str, _value: &Value) -> Result<(), String> {
        Err(unsupported("chrome.storage.session"))
    }

    pub async fn chrome_send_message(
        _request: &PrivilegedRequest,
    ) -> Result<Option<PrivilegedReply>, String> {
        Err(unsupported("chrome.runtime"))
    }
}

pub use imp::*;
