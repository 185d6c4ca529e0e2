//! # Signage template editor
//!
//! Direct-manipulation editing of HTML signage templates. A template is loaded into an isolated
//! frame together with the editor runtime; the host controller talks to that runtime only
//! through versioned JSON messages.
//!
//! ## Features
//! - Stable per-element identities (`data-editor-id`) assigned when the runtime boots
//! - Hover, selection and in-place text editing with non-destructive outlines
//! - Property updates with computed-style echoes
//! - Clean serialization: no identities, outlines, `contenteditable` or runtime script
//! - Property panels per element capability (text, image, container) and fit-to-viewport zoom
//! - Multiple concurrent sessions
//!
//! ## Example
//! ```ignore
//! use signage_editor::{EditorConfig, HostController};
//!
//! let controller = HostController::new(EditorConfig::default());
//! let frame = controller.mount(r#"<body><h1 data-editable="true">Title</h1></body>"#);
//! controller.wait_ready().await?;
//! frame.click("h1").await;
//! let selected = controller.selected().unwrap();
//! controller.send_update(&selected.element_id, "color", "#ff0000");
//! let html = controller.serialize().await?;
//! ```

pub mod capability;
pub mod cli;
pub mod config;
pub mod controller;
pub mod decoration;
pub mod error;
pub mod frame;
pub mod identity;
pub mod panel;
pub mod protocol;
pub mod runtime;
pub mod sessions;
pub mod zoom;

// --- Core types ---
pub use capability::{detect_element_type, ElementType};
pub use config::EditorConfig;
pub use controller::{inject_runtime, HostController};
pub use error::{EditorError, EditorResult};
pub use frame::{spawn_frame, FrameHandle};
pub use identity::{ElementId, IDENTITY_ATTRIBUTE};
pub use protocol::{HostMessage, Rect, RuntimeMessage, SelectedElement, PROTOCOL_VERSION};
pub use runtime::{Disposition, EditState, EditorRuntime, LayoutProbe, UserEvent};
pub use sessions::{EditorSession, SessionStore};

// --- Panels & zoom ---
pub use panel::{PanelContext, PropertyChangeCommand, PropertyPanel, UpdateSink};
pub use zoom::{fit_to_viewport, Size, ZoomLayout};
