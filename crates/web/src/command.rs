use sparks_commands::Command;

use crate::http::{HttpRequest, HttpResponse};

/// A request addressed to a named action of the bound web processor.
///
/// An empty or unknown action is valid input; the router answers it through
/// its not-found hook.
#[derive(Debug, Clone)]
pub struct WebCommand {
    action: String,
    request: HttpRequest,
}

impl WebCommand {
    pub fn new(action: impl Into<String>, request: HttpRequest) -> Self {
        Self {
            action: action.into(),
            request,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn into_request(self) -> HttpRequest {
        self.request
    }
}

impl Command for WebCommand {
    type Output = HttpResponse;
}
