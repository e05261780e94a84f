//! Error types for binding operations

use dom::DomError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BindError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("Template is missing its id attribute")]
    MissingTemplateId,

    #[error("Expected a <template> element, got <{0}>")]
    NotATemplate(String),

    #[error("Invalid custom element name: {0}")]
    InvalidComponentName(String),

    #[error("Component already defined: {0}")]
    AlreadyDefined(String),

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Render failed: {0}")]
    Render(String),
}
