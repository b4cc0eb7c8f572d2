//! Web layer: HTTP request/response abstraction, the action router for
//! web-facing processors, and an axum bridge that feeds HTTP traffic into an
//! `ApplicationContext`.

pub mod command;
pub mod errors;
pub mod http;
pub mod router;
pub mod transport;

pub use command::WebCommand;
pub use errors::TransportError;
pub use http::{HttpRequest, HttpResponse};
pub use router::{
    ActionError, ActionHandler, ActionRouter, ActionStage, ActionTable, ActionTableBuilder,
    ActionTableError, WebProcessor,
};
