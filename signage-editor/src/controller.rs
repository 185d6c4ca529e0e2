//! Host side of the editor: mounts a frame, tracks the selection projection and exposes the
//! two imperative operations, `send_update` and `serialize`.
//!
//! Failures detected here are returned to the caller. Failures inside the frame never are.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::EditorConfig;
use crate::error::{EditorError, EditorResult};
use crate::frame::{spawn_frame, FrameHandle};
use crate::identity::ElementId;
use crate::protocol::{self, HostMessage, RuntimeMessage, SelectedElement};
use crate::runtime::LayoutProbe;

pub type ReadyCallback = Arc<dyn Fn() + Send + Sync>;
pub type SelectionCallback = Arc<dyn Fn(Option<&SelectedElement>) + Send + Sync>;

struct PendingSerialize {
    request_id: u64,
    reply: oneshot::Sender<String>,
}

#[derive(Default)]
struct Observers {
    ready: Vec<ReadyCallback>,
    selection: Vec<SelectionCallback>,
}

/// State shared between the controller and its listener task.
struct Shared {
    selected: Mutex<Option<SelectedElement>>,
    pending: Mutex<Option<PendingSerialize>>,
    observers: Mutex<Observers>,
    ready_tx: watch::Sender<bool>,
}

struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    listener: JoinHandle<()>,
    frame: Option<(FrameHandle, JoinHandle<()>)>,
}

pub struct HostController {
    config: EditorConfig,
    shared: Arc<Shared>,
    connection: Mutex<Option<Connection>>,
    next_request_id: AtomicU64,
}

/// Insert the runtime `<script>` right before the first `</body>`, or append it when the
/// template has no closing body tag.
pub fn inject_runtime(template_html: &str, runtime_src: &str) -> String {
    let script = format!(
        "<script {} src=\"{}\"></script>",
        crate::decoration::RUNTIME_SCRIPT_ATTRIBUTE,
        runtime_src.replace('"', "&quot;")
    );
    match template_html.find("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(template_html.len() + script.len() + 1);
            out.push_str(&template_html[..pos]);
            out.push_str(&script);
            out.push('\n');
            out.push_str(&template_html[pos..]);
            out
        }
        None => format!("{}{}", template_html, script),
    }
}

impl HostController {
    pub fn new(config: EditorConfig) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            config,
            shared: Arc::new(Shared {
                selected: Mutex::new(None),
                pending: Mutex::new(None),
                observers: Mutex::new(Observers::default()),
                ready_tx,
            }),
            connection: Mutex::new(None),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn on_ready(&self, callback: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut observers) = self.shared.observers.lock() {
            observers.ready.push(Arc::new(callback));
        }
    }

    pub fn on_element_selected(
        &self,
        callback: impl Fn(Option<&SelectedElement>) + Send + Sync + 'static,
    ) {
        if let Ok(mut observers) = self.shared.observers.lock() {
            observers.selection.push(Arc::new(callback));
        }
    }

    /// Load a template into a fresh frame with the runtime injected. Replaces any previous frame.
    pub fn mount(&self, template_html: &str) -> FrameHandle {
        self.mount_with_layout(template_html, None)
    }

    pub fn mount_with_layout(
        &self,
        template_html: &str,
        layout: Option<Box<dyn LayoutProbe>>,
    ) -> FrameHandle {
        let html = inject_runtime(template_html, &self.config.runtime_src);
        let (frame, channel, task) = spawn_frame(&html, &self.config, layout);
        self.connect(channel.outbound, channel.inbound, Some((frame.clone(), task)));
        tracing::debug!("template mounted");
        frame
    }

    /// Use a caller-provided transport instead of a local frame.
    pub fn attach(
        &self,
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) {
        self.connect(outbound, inbound, None);
    }

    fn connect(
        &self,
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
        frame: Option<(FrameHandle, JoinHandle<()>)>,
    ) {
        self.close();
        let listener = tokio::spawn(listen(self.shared.clone(), inbound));
        if let Ok(mut connection) = self.connection.lock() {
            *connection = Some(Connection {
                outbound,
                listener,
                frame,
            });
        }
    }

    /// Tear down the current frame. The selection projection and readiness are reset.
    pub fn close(&self) {
        let previous = self.connection.lock().ok().and_then(|mut c| c.take());
        if let Some(connection) = previous {
            connection.listener.abort();
            if let Some((_, task)) = connection.frame {
                task.abort();
            }
            tracing::debug!("frame closed");
        }
        self.shared.ready_tx.send_replace(false);
        if let Ok(mut selected) = self.shared.selected.lock() {
            *selected = None;
        }
        // Dropping the reply sender fails any waiting serialize() with FrameUnavailable.
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.take();
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.shared.ready_tx.borrow()
    }

    /// Resolves once the runtime has announced `editor-ready`.
    pub async fn wait_ready(&self) -> EditorResult<()> {
        let mut ready = self.shared.ready_tx.subscribe();
        ready
            .wait_for(|r| *r)
            .await
            .map(|_| ())
            .map_err(|_| EditorError::FrameUnavailable)
    }

    pub fn selected(&self) -> Option<SelectedElement> {
        self.shared.selected.lock().ok().and_then(|s| s.clone())
    }

    pub fn frame(&self) -> Option<FrameHandle> {
        self.connection
            .lock()
            .ok()
            .and_then(|c| c.as_ref().and_then(|c| c.frame.as_ref().map(|(f, _)| f.clone())))
    }

    fn outbound(&self) -> Option<mpsc::UnboundedSender<String>> {
        self.connection
            .lock()
            .ok()
            .and_then(|c| c.as_ref().map(|c| c.outbound.clone()))
            .filter(|tx| !tx.is_closed())
    }

    /// Fire-and-forget property update. Silently does nothing without a frame.
    pub fn send_update(&self, element_id: &ElementId, property: &str, value: &str) {
        let Some(outbound) = self.outbound() else {
            tracing::debug!(%element_id, property, "no frame, update dropped");
            return;
        };
        let message = HostMessage::UpdateProperty {
            element_id: element_id.clone(),
            property: property.to_string(),
            value: value.to_string(),
        };
        match protocol::encode(&message) {
            Ok(payload) => {
                let _ = outbound.send(payload);
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode update"),
        }
    }

    /// Request the cleaned document.
    ///
    /// Errors: no frame, a request already in flight, an empty result, or no answer within
    /// the configured timeout. After a timeout, or when the returned future is dropped early,
    /// the slot is free again and late answers to the abandoned request are discarded.
    pub async fn serialize(&self) -> EditorResult<String> {
        let outbound = self.outbound().ok_or(EditorError::FrameUnavailable)?;
        let (slot, reply) = self.begin_serialize()?;
        let request_id = slot.request_id;

        let payload = protocol::encode(&HostMessage::Serialize { request_id })?;
        outbound
            .send(payload)
            .map_err(|_| EditorError::FrameUnavailable)?;

        let timeout = self.config.serialize_timeout();
        match tokio::time::timeout(timeout, reply).await {
            Err(_) => {
                tracing::warn!(request_id, timeout_ms = self.config.serialize_timeout_ms, "serialize timed out");
                Err(EditorError::SerializeTimeout {
                    timeout_ms: self.config.serialize_timeout_ms,
                })
            }
            Ok(Err(_)) => {
                tracing::warn!(request_id, "frame went away during serialize");
                Err(EditorError::FrameUnavailable)
            }
            Ok(Ok(html)) if html.is_empty() => {
                tracing::warn!(request_id, "serialize returned an empty document");
                Err(EditorError::EmptySerialization)
            }
            Ok(Ok(html)) => Ok(html),
        }
    }

    fn begin_serialize(&self) -> EditorResult<(PendingSlot<'_>, oneshot::Receiver<String>)> {
        let mut pending = self
            .shared
            .pending
            .lock()
            .map_err(|_| EditorError::FrameUnavailable)?;
        if pending.is_some() {
            return Err(EditorError::SerializeInFlight);
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        *pending = Some(PendingSerialize {
            request_id,
            reply: tx,
        });
        let slot = PendingSlot {
            shared: self.shared.as_ref(),
            request_id,
        };
        Ok((slot, rx))
    }
}

impl Shared {
    fn clear_pending(&self, request_id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            if pending.as_ref().is_some_and(|p| p.request_id == request_id) {
                pending.take();
            }
        }
    }
}

/// Frees the in-flight serialize slot however `serialize` ends, including cancellation.
struct PendingSlot<'a> {
    shared: &'a Shared,
    request_id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.shared.clear_pending(self.request_id);
    }
}

impl Drop for HostController {
    fn drop(&mut self) {
        self.close();
    }
}

async fn listen(shared: Arc<Shared>, mut inbound: mpsc::UnboundedReceiver<String>) {
    while let Some(payload) = inbound.recv().await {
        let Some(message) = protocol::decode::<RuntimeMessage>(&payload) else {
            continue;
        };
        tracing::debug!(kind = message.kind(), "runtime message");
        shared.dispatch(message);
    }
    // Channel gone: nobody can answer a pending serialize any more.
    if let Ok(mut pending) = shared.pending.lock() {
        pending.take();
    }
    shared.ready_tx.send_replace(false);
    tracing::debug!("runtime channel closed");
}

impl Shared {
    fn dispatch(&self, message: RuntimeMessage) {
        match message {
            RuntimeMessage::EditorReady => {
                self.ready_tx.send_replace(true);
                for callback in self.ready_callbacks() {
                    callback();
                }
            }
            RuntimeMessage::ElementSelected(element) => {
                self.set_selected(Some(element.clone()));
                for callback in self.selection_callbacks() {
                    callback(Some(&element));
                }
            }
            RuntimeMessage::ElementDeselected => {
                self.set_selected(None);
                for callback in self.selection_callbacks() {
                    callback(None);
                }
            }
            RuntimeMessage::PropertyUpdated { element_id, styles } => {
                // Echoes confirm eventually; they never gate anything.
                if let Ok(mut selected) = self.selected.lock() {
                    if let Some(sel) = selected.as_mut().filter(|s| s.element_id == element_id) {
                        sel.styles = styles;
                    }
                }
            }
            RuntimeMessage::TextChanged { element_id, text } => {
                if let Ok(mut selected) = self.selected.lock() {
                    if let Some(sel) = selected.as_mut().filter(|s| s.element_id == element_id) {
                        sel.text_content = text;
                    }
                }
            }
            RuntimeMessage::Serialized { request_id, html } => {
                let waiting = match self.pending.lock() {
                    Ok(mut pending) => match pending.take() {
                        Some(p) if p.request_id == request_id => Some(p),
                        other => {
                            *pending = other;
                            None
                        }
                    },
                    Err(_) => None,
                };
                match waiting {
                    Some(p) => {
                        let _ = p.reply.send(html);
                    }
                    None => tracing::debug!(request_id, "stale serialize response discarded"),
                }
            }
        }
    }

    fn set_selected(&self, element: Option<SelectedElement>) {
        if let Ok(mut selected) = self.selected.lock() {
            *selected = element;
        }
    }

    fn ready_callbacks(&self) -> Vec<ReadyCallback> {
        self.observers
            .lock()
            .map(|o| o.ready.clone())
            .unwrap_or_default()
    }

    fn selection_callbacks(&self) -> Vec<SelectionCallback> {
        self.observers
            .lock()
            .map(|o| o.selection.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inject_before_closing_body() {
        assert_eq!(
            inject_runtime("<html><body><p>x</p></body></html>", "/r.js"),
            "<html><body><p>x</p><script data-editor-runtime src=\"/r.js\"></script>\n</body></html>"
        );
    }

    #[test]
    fn test_inject_appends_without_body() {
        assert_eq!(
            inject_runtime("<p>x</p>", "/r.js"),
            "<p>x</p><script data-editor-runtime src=\"/r.js\"></script>"
        );
    }

    #[tokio::test]
    async fn test_operations_without_frame() {
        let controller = HostController::new(EditorConfig::default());
        controller.send_update(&ElementId::from("e-0"), "color", "red");
        assert_eq!(controller.serialize().await, Err(EditorError::FrameUnavailable));
        assert!(!controller.is_ready());
        assert!(controller.selected().is_none());
    }
}
