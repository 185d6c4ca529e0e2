use thiserror::Error;

pub type MarkupResult<T> = Result<T, MarkupError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkupError {
    #[error("Unknown style property '{property}'")]
    UnknownProperty { property: String },

    #[error("Invalid value '{value}' for style property '{property}': {reason}")]
    InvalidStyle {
        property: String,
        value: String,
        reason: String,
    },

    #[error("Invalid color value '{value}'")]
    InvalidColor { value: String },

    #[error("Invalid length value '{value}'")]
    InvalidLength { value: String },

    #[error("Unsupported selector '{selector}': {reason}")]
    UnsupportedSelector { selector: String, reason: String },

    #[error("Node {0} is not an element")]
    NotAnElement(usize),
}
