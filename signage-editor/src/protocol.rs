//! Wire schema shared by the frame runtime and the host controller.
//!
//! Every message travels as a JSON envelope `{"v": 1, "message": {"type": "...", ...}}`.
//! Payloads that fail to decode, or carry another version, are dropped by the receiver.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use signage_markup::ComputedStyles;

use crate::capability::ElementType;
use crate::identity::ElementId;

pub const PROTOCOL_VERSION: u32 = 1;

/// Viewport-relative box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
            bottom: top + height,
            right: left + width,
        }
    }
}

/// Host-side projection of the selected element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedElement {
    pub element_id: ElementId,
    pub element_type: ElementType,
    pub tag_name: String,
    /// Bounded snapshot of `textContent`.
    pub text_content: String,
    /// Empty when the element has no `src`.
    #[serde(default)]
    pub src: String,
    pub styles: ComputedStyles,
    #[serde(default)]
    pub rect: Rect,
}

/// Runtime -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuntimeMessage {
    EditorReady,
    ElementSelected(SelectedElement),
    ElementDeselected,
    #[serde(rename_all = "camelCase")]
    PropertyUpdated {
        element_id: ElementId,
        styles: ComputedStyles,
    },
    #[serde(rename_all = "camelCase")]
    TextChanged { element_id: ElementId, text: String },
    #[serde(rename_all = "camelCase")]
    Serialized { request_id: u64, html: String },
}

/// Host -> runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    #[serde(rename_all = "camelCase")]
    UpdateProperty {
        element_id: ElementId,
        property: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    Serialize { request_id: u64 },
}

impl RuntimeMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeMessage::EditorReady => "editor-ready",
            RuntimeMessage::ElementSelected(_) => "element-selected",
            RuntimeMessage::ElementDeselected => "element-deselected",
            RuntimeMessage::PropertyUpdated { .. } => "property-updated",
            RuntimeMessage::TextChanged { .. } => "text-changed",
            RuntimeMessage::Serialized { .. } => "serialized",
        }
    }
}

impl HostMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            HostMessage::UpdateProperty { .. } => "update-property",
            HostMessage::Serialize { .. } => "serialize",
        }
    }
}

#[derive(Serialize)]
struct OutgoingEnvelope<'a, M> {
    v: u32,
    message: &'a M,
}

#[derive(Deserialize)]
struct IncomingEnvelope {
    v: u32,
    message: serde_json::Value,
}

pub fn encode<M: Serialize>(message: &M) -> serde_json::Result<String> {
    serde_json::to_string(&OutgoingEnvelope {
        v: PROTOCOL_VERSION,
        message,
    })
}

/// Decode one envelope. Foreign, malformed and unknown messages yield `None`.
pub fn decode<M: DeserializeOwned>(payload: &str) -> Option<M> {
    let envelope: IncomingEnvelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring payload without an envelope");
            return None;
        }
    };
    if envelope.v != PROTOCOL_VERSION {
        tracing::debug!(version = envelope.v, "ignoring envelope with foreign protocol version");
        return None;
    }
    match serde_json::from_value(envelope.message) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unrecognized message");
            None
        }
    }
}
