//! View abstraction: named templates with parameters, produced by factories.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("failed to render view: {0}")]
    Render(String),
}

/// A renderable template with a parameter set.
pub trait View: Send {
    fn set_parameter(&mut self, name: &str, value: Value);

    fn parameter(&self, name: &str) -> Option<&Value>;

    fn render(&self) -> Result<String, ViewError>;
}

/// Produces views by name. `None` means the factory has no such view.
pub trait ViewFactory: Send + Sync {
    fn create_view(&self, name: &str) -> Option<Box<dyn View>>;
}
