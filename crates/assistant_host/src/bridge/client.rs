//! Caller side of the bridge: one correlated call per sequence token, raced against a timeout.

use std::{cell::RefCell, rc::Rc};

use futures::{
    channel::oneshot,
    future::{select, Either},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{
    channel::{EventChannel, ListenerId},
    error_event, error_message, response_event, BridgeAction, BridgeError, DEFAULT_TIMEOUT_MS,
    REQUEST_EVENT,
};
use crate::timer::TimerHost;

/// Per-call options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Wait before abandoning the call, or `None` to wait indefinitely.
    pub timeout_ms: Option<u32>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout_ms: Some(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl CallOptions {
    /// Waits indefinitely. Meant for actions gated on user interaction such as permission prompts.
    pub const fn without_timeout() -> Self {
        Self { timeout_ms: None }
    }

    /// Waits at most `timeout_ms`.
    pub const fn with_timeout(timeout_ms: u32) -> Self {
        Self {
            timeout_ms: Some(timeout_ms),
        }
    }
}

/// Cookies returned by `get-cookies`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCookies {
    /// Overleaf session cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Load-balancer affinity cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gclb: Option<String>,
}

/// Result of a host-permission request, keeping denial distinct from failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// The user granted the permission.
    Granted,
    /// The user declined.
    Denied,
    /// The request itself failed.
    Failed(String),
}

#[derive(Clone)]
struct PendingListeners {
    channel: Rc<dyn EventChannel>,
    listeners: Rc<RefCell<Vec<(String, ListenerId)>>>,
}

impl PendingListeners {
    fn release(&self) {
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for (event, id) in listeners {
            self.channel.unlisten(&event, id);
        }
    }
}

/// Removes both response listeners however the call ends.
struct ListenerGuard(PendingListeners);

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

type Outcome = Result<Value, Value>;

fn listen_once(
    channel: &Rc<dyn EventChannel>,
    seq: &str,
    sender: oneshot::Sender<Outcome>,
) -> ListenerGuard {
    let pending = PendingListeners {
        channel: channel.clone(),
        listeners: Rc::default(),
    };
    let sender = Rc::new(RefCell::new(Some(sender)));

    let on_success = {
        let pending = pending.clone();
        let sender = sender.clone();
        Rc::new(move |detail: Value| {
            pending.release();
            if let Some(tx) = sender.borrow_mut().take() {
                let _ = tx.send(Ok(detail.get("res").cloned().unwrap_or(Value::Null)));
            }
        })
    };
    let on_error = {
        let pending = pending.clone();
        Rc::new(move |detail: Value| {
            pending.release();
            if let Some(tx) = sender.borrow_mut().take() {
                let _ = tx.send(Err(detail.get("err").cloned().unwrap_or(Value::Null)));
            }
        })
    };

    let success_event = response_event(seq);
    let failure_event = error_event(seq);
    let success_id = channel.listen(&success_event, on_success);
    let failure_id = channel.listen(&failure_event, on_error);
    pending
        .listeners
        .borrow_mut()
        .extend([(success_event, success_id), (failure_event, failure_id)]);
    ListenerGuard(pending)
}

/// Page-side bridge client.
#[derive(Clone)]
pub struct BridgeClient {
    channel: Rc<dyn EventChannel>,
    timers: Rc<dyn TimerHost>,
}

impl BridgeClient {
    /// Creates a client dispatching on `channel` and timing out through `timers`.
    pub fn new(channel: Rc<dyn EventChannel>, timers: Rc<dyn TimerHost>) -> Self {
        Self { channel, timers }
    }

    /// Sends `action` with `args` and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Handler`] when the privileged handler failed and
    /// [`BridgeError::Timeout`] when no response arrived in time. A response arriving after the
    /// timeout is dropped.
    pub async fn call(
        &self,
        action: &str,
        args: Value,
        options: CallOptions,
    ) -> Result<Value, BridgeError> {
        let seq = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel::<Outcome>();
        let _guard = listen_once(&self.channel, &seq, tx);

        self.channel.dispatch(
            REQUEST_EVENT,
            serde_json::json!({ "seq": seq, "action": action, "args": args }),
        );

        let received = match options.timeout_ms {
            None => rx.await,
            Some(after_ms) => match select(rx, self.timers.sleep(after_ms)).await {
                Either::Left((received, _)) => received,
                Either::Right(((), _)) => {
                    return Err(BridgeError::Timeout {
                        action: action.to_string(),
                        after_ms,
                    })
                }
            },
        };

        match received {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(BridgeError::Handler {
                action: action.to_string(),
                message: error_message(&err),
            }),
            Err(_) => Err(BridgeError::Disconnected {
                action: action.to_string(),
            }),
        }
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        action: BridgeAction,
        args: Value,
        options: CallOptions,
    ) -> Result<T, BridgeError> {
        let value = self.call(action.as_str(), args, options).await?;
        serde_json::from_value(value).map_err(|err| BridgeError::Decode {
            action: action.as_str().to_string(),
            message: err.to_string(),
        })
    }

    /// Reads the session and load-balancer cookies for `https://{domain}`.
    pub async fn get_cookies(&self, domain: &str) -> Result<HostCookies, BridgeError> {
        self.call_typed(
            BridgeAction::GetCookies,
            Value::String(domain.to_string()),
            CallOptions::default(),
        )
        .await
    }

    /// Resolves a package-relative path to an absolute extension URL.
    pub async fn get_url(&self, path: &str) -> Result<String, BridgeError> {
        self.call_typed(
            BridgeAction::GetUrl,
            Value::String(path.to_string()),
            CallOptions::default(),
        )
        .await
    }

    /// Returns the current session id.
    pub async fn get_or_create_session_id(&self) -> Result<String, BridgeError> {
        self.call_typed(
            BridgeAction::GetOrCreateSessionId,
            Value::Null,
            CallOptions::default(),
        )
        .await
    }

    /// Fetches `url` from the privileged context and returns it base64-encoded.
    pub async fn fetch_image(&self, url: &str) -> Result<String, BridgeError> {
        self.call_typed(
            BridgeAction::FetchImage,
            Value::String(url.to_string()),
            CallOptions::default(),
        )
        .await
    }

    /// Requests host permission for `origin`. Must run in response to a user gesture; waits for
    /// the user without a timeout.
    pub async fn request_host_permission(&self, origin: &str) -> PermissionOutcome {
        match self
            .call(
                BridgeAction::RequestHostPermission.as_str(),
                Value::String(origin.to_string()),
                CallOptions::without_timeout(),
            )
            .await
        {
            Ok(Value::Bool(true)) => PermissionOutcome::Granted,
            Ok(Value::Bool(false)) => PermissionOutcome::Denied,
            Ok(other) => PermissionOutcome::Failed(format!(
                "unexpected permission response: {other}"
            )),
            Err(err) => PermissionOutcome::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{executor::LocalPool, task::LocalSpawnExt};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{
        bridge::{channel::LocalEventBus, BridgeFailure, BridgeRequest, BridgeSuccess},
        timer::ManualTimers,
    };

    struct Harness {
        pool: LocalPool,
        bus: LocalEventBus,
        timers: ManualTimers,
        client: BridgeClient,
        requests: Rc<RefCell<Vec<BridgeRequest>>>,
    }

    impl Harness {
        fn new() -> Self {
            let bus = LocalEventBus::default();
            let timers = ManualTimers::default();
            let requests = Rc::new(RefCell::new(Vec::new()));
            let sink = requests.clone();
            bus.listen(
                REQUEST_EVENT,
                Rc::new(move |detail| {
                    sink.borrow_mut()
                        .push(serde_json::from_value(detail).expect("request payload"))
                }),
            );
            let client = BridgeClient::new(Rc::new(bus.clone()), Rc::new(timers.clone()));
            Self {
                pool: LocalPool::new(),
                bus,
                timers,
                client,
                requests,
            }
        }

        fn spawn_call(
            &self,
            action: &'static str,
            options: CallOptions,
        ) -> Rc<RefCell<Option<Result<Value, BridgeError>>>> {
            let slot = Rc::new(RefCell::new(None));
            let out = slot.clone();
            let client = self.client.clone();
            self.pool
                .spawner()
                .spawn_local(async move {
                    let result = client.call(action, json!(null), options).await;
                    *out.borrow_mut() = Some(result);
                })
                .expect("spawn");
            slot
        }

        fn seq(&self, index: usize) -> String {
            self.requests.borrow()[index].seq.clone()
        }

        fn respond(&self, seq: &str, res: Value) {
            let detail = serde_json::to_value(BridgeSuccess {
                seq: seq.to_string(),
                res,
            })
            .expect("serialize");
            self.bus.dispatch(&response_event(seq), detail);
        }

        fn fail(&self, seq: &str, err: Value) {
            let detail = serde_json::to_value(BridgeFailure {
                seq: seq.to_string(),
                err,
            })
            .expect("serialize");
            self.bus.dispatch(&error_event(seq), detail);
        }
    }

    #[test]
    fn success_resolves_and_cleans_up_both_listeners() {
        let mut harness = Harness::new();
        let result = harness.spawn_call("get-url", CallOptions::default());
        harness.pool.run_until_stalled();

        let seq = harness.seq(0);
        assert_eq!(harness.requests.borrow()[0].action, "get-url");
        assert_eq!(harness.bus.listener_count(&response_event(&seq)), 1);
        assert_eq!(harness.bus.listener_count(&error_event(&seq)), 1);

        harness.respond(&seq, json!("chrome-extension://id/x.png"));
        harness.fail(&seq, json!("too late"));
        harness.pool.run_until_stalled();

        assert_eq!(
            *result.borrow(),
            Some(Ok(json!("chrome-extension://id/x.png")))
        );
        assert_eq!(harness.bus.listener_count(&response_event(&seq)), 0);
        assert_eq!(harness.bus.listener_count(&error_event(&seq)), 0);
    }

    #[test]
    fn handler_error_rejects_with_detail() {
        let mut harness = Harness::new();
        let result = harness.spawn_call("fetch-image", CallOptions::default());
        harness.pool.run_until_stalled();

        harness.fail(&harness.seq(0), json!({"message": "HTTP 404"}));
        harness.pool.run_until_stalled();

        assert_eq!(
            *result.borrow(),
            Some(Err(BridgeError::Handler {
                action: "fetch-image".to_string(),
                message: "HTTP 404".to_string(),
            }))
        );
    }

    #[test]
    fn silence_times_out_and_late_response_is_ignored() {
        let mut harness = Harness::new();
        let result = harness.spawn_call("get-cookies", CallOptions::default());
        harness.pool.run_until_stalled();
        let seq = harness.seq(0);

        harness.timers.advance(u64::from(DEFAULT_TIMEOUT_MS) - 1);
        harness.pool.run_until_stalled();
        assert!(result.borrow().is_none());

        harness.timers.advance(1);
        harness.pool.run_until_stalled();
        assert_eq!(
            *result.borrow(),
            Some(Err(BridgeError::Timeout {
                action: "get-cookies".to_string(),
                after_ms: DEFAULT_TIMEOUT_MS,
            }))
        );
        assert_eq!(harness.bus.listener_count(&response_event(&seq)), 0);

        harness.respond(&seq, json!({"session": "late"}));
        harness.pool.run_until_stalled();
        assert!(matches!(
            *result.borrow(),
            Some(Err(BridgeError::Timeout { .. }))
        ));
    }

    #[test]
    fn opting_out_of_timeout_waits_indefinitely() {
        let mut harness = Harness::new();
        let result = harness.spawn_call("request-host-permission", CallOptions::without_timeout());
        harness.pool.run_until_stalled();

        harness.timers.advance(10 * 60 * 1000);
        harness.pool.run_until_stalled();
        assert!(result.borrow().is_none());
        assert_eq!(harness.timers.pending_sleeps(), 0);

        harness.respond(&harness.seq(0), json!(true));
        harness.pool.run_until_stalled();
        assert_eq!(*result.borrow(), Some(Ok(json!(true))));
    }

    #[test]
    fn concurrent_calls_resolve_independently_out_of_order() {
        let mut harness = Harness::new();
        let first = harness.spawn_call("get-url", CallOptions::default());
        let second = harness.spawn_call("get-url", CallOptions::default());
        harness.pool.run_until_stalled();
        let (first_seq, second_seq) = (harness.seq(0), harness.seq(1));
        assert_ne!(first_seq, second_seq);

        harness.respond(&second_seq, json!("second"));
        harness.pool.run_until_stalled();
        assert!(first.borrow().is_none());
        assert_eq!(*second.borrow(), Some(Ok(json!("second"))));

        harness.respond(&first_seq, json!("first"));
        harness.pool.run_until_stalled();
        assert_eq!(*first.borrow(), Some(Ok(json!("first"))));
    }

    #[test]
    fn permission_outcomes_stay_distinct() {
        let mut harness = Harness::new();
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..3 {
            let client = harness.client.clone();
            let sink = outcomes.clone();
            harness
                .pool
                .spawner()
                .spawn_local(async move {
                    let outcome = client.request_host_permission("https://example.com/").await;
                    sink.borrow_mut().push(outcome);
                })
                .expect("spawn");
        }
        harness.pool.run_until_stalled();

        harness.respond(&harness.seq(0), json!(true));
        harness.pool.run_until_stalled();
        harness.respond(&harness.seq(1), json!(false));
        harness.pool.run_until_stalled();
        harness.fail(&harness.seq(2), json!("permissions API unavailable"));
        harness.pool.run_until_stalled();

        assert_eq!(
            *outcomes.borrow(),
            vec![
                PermissionOutcome::Granted,
                PermissionOutcome::Denied,
                PermissionOutcome::Failed(
                    "bridge call `request-host-permission` failed: permissions API unavailable"
                        .to_string()
                ),
            ]
        );
    }

    #[test]
    fn typed_helper_reports_decode_errors() {
        let mut harness = Harness::new();
        let slot = Rc::new(RefCell::new(None));
        let out = slot.clone();
        let client = harness.client.clone();
        harness
            .pool
            .spawner()
            .spawn_local(async move {
                *out.borrow_mut() = Some(client.get_or_create_session_id().await);
            })
            .expect("spawn");
        harness.pool.run_until_stalled();

        harness.respond(&harness.seq(0), json!(42));
        harness.pool.run_until_stalled();

        assert!(matches!(
            *slot.borrow(),
            Some(Err(BridgeError::Decode { .. }))
        ));
    }
}
