//! Isolated-context relay forwarding page requests to the privileged context.

use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use leptos::logging;
use serde_json::{json, Value};

use super::{
    channel::{EventChannel, ListenerId},
    error_event, response_event, BridgeRequest, PrivilegedReply, PrivilegedRequest, REQUEST_EVENT,
};
use crate::timer::Spawner;

/// Boxed future returned by [`PrivilegedTransport::send`].
pub type TransportFuture<T> = LocalBoxFuture<'static, T>;

/// Structured messaging channel from the relay to the privileged context.
pub trait PrivilegedTransport {
    /// Sends `request` and waits for the privileged reply.
    ///
    /// `Ok(None)` means no handler answered. `Err` means the channel itself failed.
    fn send(
        &self,
        request: PrivilegedRequest,
    ) -> TransportFuture<Result<Option<PrivilegedReply>, String>>;
}

/// Installed relay. Dropping the handle stops relaying.
pub struct RelayHandle {
    channel: Rc<dyn EventChannel>,
    listener: Option<ListenerId>,
}

impl RelayHandle {
    /// Stops relaying. Idempotent.
    pub fn uninstall(&mut self) {
        if let Some(id) = self.listener.take() {
            self.channel.unlisten(REQUEST_EVENT, id);
        }
    }

    /// Whether requests are still being relayed.
    pub fn is_installed(&self) -> bool {
        self.listener.is_some()
    }

    /// Keeps the relay installed for the lifetime of the page.
    pub fn forget(mut self) {
        self.listener = None;
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Bridge relay entry point.
pub struct BridgeRelay;

impl BridgeRelay {
    /// Starts listening for [`REQUEST_EVENT`] on `channel` and forwards each request through
    /// `transport`, dispatching the scoped success or error event when the reply arrives.
    pub fn install(
        channel: Rc<dyn EventChannel>,
        transport: Rc<dyn PrivilegedTransport>,
        spawner: Spawner,
    ) -> RelayHandle {
        let weak_channel: Weak<dyn EventChannel> = Rc::downgrade(&channel);
        let listener = channel.listen(
            REQUEST_EVENT,
            Rc::new(move |detail: Value| {
                let request = match serde_json::from_value::<BridgeRequest>(detail) {
                    Ok(request) => request,
                    Err(err) => {
                        logging::warn!("[bridge] ignoring malformed request: {err}");
                        return;
                    }
                };
                let Some(channel) = weak_channel.upgrade() else {
                    return;
                };
                spawner(Box::pin(forward(channel, transport.clone(), request)));
            }),
        );
        RelayHandle {
            channel,
            listener: Some(listener),
        }
    }
}

async fn forward(
    channel: Rc<dyn EventChannel>,
    transport: Rc<dyn PrivilegedTransport>,
    request: BridgeRequest,
) {
    let BridgeRequest { seq, action, args } = request;
    let reply = transport
        .send(PrivilegedRequest {
            action: action.clone(),
            args,
        })
        .await;
    match reply {
        Ok(Some(PrivilegedReply::Data(res))) => {
            channel.dispatch(&response_event(&seq), json!({ "seq": seq, "res": res }));
        }
        Ok(Some(PrivilegedReply::Error(err))) => {
            channel.dispatch(&error_event(&seq), json!({ "seq": seq, "err": err }));
        }
        Ok(None) => {
            logging::warn!("[bridge] no privileged handler answered `{action}`");
        }
        Err(err) => {
            logging::warn!("[bridge] relaying `{action}` failed: {err}");
            channel.dispatch(&error_event(&seq), json!({ "seq": seq, "err": err }));
        }
    }
}
