//! The sandboxed frame: a task that exclusively owns one loaded document and its runtime.
//!
//! The host talks to it only through the message channel. Tests and tools additionally
//! reach it through [`FrameHandle`], which plays the part of the user's pointer and keyboard.

use signage_markup::{parse_html, select_first, Document, NodeId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::EditorConfig;
use crate::decoration::RUNTIME_SCRIPT_ATTRIBUTE;
use crate::runtime::{Disposition, EditState, EditorRuntime, LayoutProbe, NoLayout, UserEvent};

enum FrameCommand {
    Dispatch(UserEvent, oneshot::Sender<Disposition>),
    Locate(String, oneshot::Sender<Option<NodeId>>),
    Snapshot(oneshot::Sender<FrameSnapshot>),
}

/// Point-in-time copy of the frame's document and runtime state.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub document: Document,
    pub state: Option<EditState>,
}

/// The two ends of the message channel as seen from the host.
pub struct FrameChannel {
    /// Host -> runtime envelopes.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Runtime -> host envelopes.
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Automation handle for a running frame. Cheap to clone.
#[derive(Clone)]
pub struct FrameHandle {
    control: mpsc::UnboundedSender<FrameCommand>,
}

/// True when the markup carries the injected runtime `<script>`.
pub fn has_runtime_script(doc: &Document) -> bool {
    doc.find_element(|d, n| d.tag_name(n) == Some("script") && d.has_attr(n, RUNTIME_SCRIPT_ATTRIBUTE))
        .is_some()
}

/// Load `html` into a new frame task.
///
/// The runtime only boots when the document contains the runtime script; without it the frame
/// behaves like a plain page: host messages go unanswered and events pass through.
pub fn spawn_frame(
    html: &str,
    config: &EditorConfig,
    layout: Option<Box<dyn LayoutProbe>>,
) -> (FrameHandle, FrameChannel, JoinHandle<()>) {
    let (host_tx, host_rx) = mpsc::unbounded_channel::<String>();
    let (runtime_tx, runtime_rx) = mpsc::unbounded_channel::<String>();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let doc = parse_html(html);
    let boots = has_runtime_script(&doc);
    let runtime = EditorRuntime::new(doc, config, runtime_tx)
        .with_layout(layout.unwrap_or_else(|| Box::new(NoLayout)));

    let task = tokio::spawn(run_frame(runtime, boots, host_rx, control_rx));
    (
        FrameHandle {
            control: control_tx,
        },
        FrameChannel {
            outbound: host_tx,
            inbound: runtime_rx,
        },
        task,
    )
}

async fn run_frame(
    mut runtime: EditorRuntime<mpsc::UnboundedSender<String>>,
    boots: bool,
    mut host_rx: mpsc::UnboundedReceiver<String>,
    mut control_rx: mpsc::UnboundedReceiver<FrameCommand>,
) {
    if boots {
        runtime.boot();
    } else {
        tracing::debug!("document has no runtime script, editor stays inert");
    }

    let mut host_open = true;
    let mut control_open = true;
    while host_open || control_open {
        tokio::select! {
            payload = host_rx.recv(), if host_open => match payload {
                Some(payload) if boots => runtime.handle_payload(&payload),
                Some(_) => {}
                None => host_open = false,
            },
            command = control_rx.recv(), if control_open => match command {
                Some(command) => handle_command(&mut runtime, boots, command),
                None => control_open = false,
            },
        }
    }
    tracing::debug!("frame unloaded");
}

fn handle_command(
    runtime: &mut EditorRuntime<mpsc::UnboundedSender<String>>,
    boots: bool,
    command: FrameCommand,
) {
    match command {
        FrameCommand::Dispatch(event, reply) => {
            let disposition = if boots {
                runtime.handle_event(event)
            } else {
                Disposition::PASS
            };
            let _ = reply.send(disposition);
        }
        FrameCommand::Locate(selector, reply) => {
            let found = match select_first(runtime.document(), &selector) {
                Ok(found) => found,
                Err(e) => {
                    tracing::debug!(error = %e, "locate failed");
                    None
                }
            };
            let _ = reply.send(found);
        }
        FrameCommand::Snapshot(reply) => {
            let _ = reply.send(FrameSnapshot {
                document: runtime.document().clone(),
                state: boots.then(|| runtime.state()),
            });
        }
    }
}

impl FrameHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> FrameCommand) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.control.send(make(tx)).ok()?;
        rx.await.ok()
    }

    /// Deliver an input event. `None` once the frame is gone.
    pub async fn dispatch(&self, event: UserEvent) -> Option<Disposition> {
        self.request(|tx| FrameCommand::Dispatch(event, tx)).await
    }

    /// First element matching a simple CSS selector.
    pub async fn locate(&self, selector: &str) -> Option<NodeId> {
        let selector = selector.to_string();
        self.request(|tx| FrameCommand::Locate(selector, tx))
            .await
            .flatten()
    }

    pub async fn snapshot(&self) -> Option<FrameSnapshot> {
        self.request(FrameCommand::Snapshot).await
    }

    /// Locate then click. `None` when nothing matches.
    pub async fn click(&self, selector: &str) -> Option<Disposition> {
        let node = self.locate(selector).await?;
        self.dispatch(UserEvent::Click(node)).await
    }

    pub async fn double_click(&self, selector: &str) -> Option<Disposition> {
        let node = self.locate(selector).await?;
        self.dispatch(UserEvent::DoubleClick(node)).await
    }

    pub async fn hover(&self, selector: &str) -> Option<Disposition> {
        let node = self.locate(selector).await?;
        self.dispatch(UserEvent::PointerOver(node)).await
    }

    pub async fn type_text(&self, text: &str) -> Option<Disposition> {
        self.dispatch(UserEvent::Input(text.to_string())).await
    }

    pub async fn press(&self, key: &str, shift: bool) -> Option<Disposition> {
        self.dispatch(UserEvent::KeyDown {
            key: key.to_string(),
            shift,
        })
        .await
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}
