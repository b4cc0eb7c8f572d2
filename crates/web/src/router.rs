//! Metadata-driven action routing for web-facing processors.
//!
//! A [`WebProcessor`] declares its actions as a table of named handler
//! functions; [`ActionRouter`] wraps it into a regular processor bound to
//! [`WebCommand`] and owns the fixed dispatch algorithm:
//!
//! ```text
//! on_before_action ──Some(response)──────────────────────────────► response
//!        │ None
//!        ▼
//! action in table? ──no──► on_action_not_found ──────────────────► response
//!        │ yes
//!        ▼
//! handler ──► on_after_action ───────────────────────────────────► response
//!
//! any stage fails or panics ──► on_action_error ─────────────────► response
//! ```
//!
//! `process` never fails: every error, including a panic, becomes a response.

use core::any::{Any, type_name};
use core::fmt;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use axum::http::StatusCode;
use sparks_infra::{ContextRef, Process, Processor, ProcessorDeclaration, Scope};
use thiserror::Error;
use tracing::{debug, error};

use crate::command::WebCommand;
use crate::http::{HttpRequest, HttpResponse};

/// Handler bound to one action name.
pub type ActionHandler<P> = fn(&P, &HttpRequest) -> anyhow::Result<HttpResponse>;

/// A processor that answers named actions.
///
/// ```ignore
/// impl WebProcessor for Users {
///     fn create(context: ContextRef) -> anyhow::Result<Self> { Ok(Self { context }) }
///
///     fn actions(table: &mut ActionTableBuilder<Self>) {
///         table.action("list", Self::list).action("show", Self::show);
///     }
/// }
/// ```
pub trait WebProcessor: Sized + Send + Sync + 'static {
    const SCOPE: Scope = Scope::PerCall;

    fn create(context: ContextRef) -> anyhow::Result<Self>;

    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Declare the action table. Names are case-sensitive and must be unique.
    fn actions(table: &mut ActionTableBuilder<Self>);

    /// Runs before every action, known or not. Returning a response skips the handler.
    fn on_before_action(
        &self,
        _action: &str,
        _request: &HttpRequest,
    ) -> anyhow::Result<Option<HttpResponse>> {
        Ok(None)
    }

    /// Post-processes the handler's response.
    fn on_after_action(
        &self,
        _action: &str,
        _request: &HttpRequest,
        response: HttpResponse,
    ) -> anyhow::Result<HttpResponse> {
        Ok(response)
    }

    fn on_action_not_found(&self, action: &str, _request: &HttpRequest) -> HttpResponse {
        not_found_response(action, type_name::<Self>())
    }

    fn on_action_error(&self, _action: &str, _request: &HttpRequest, error: &ActionError) -> HttpResponse {
        error_response(error)
    }
}

/// `404 text/plain` naming the action and the processor.
pub fn not_found_response(action: &str, processor: &str) -> HttpResponse {
    HttpResponse::text(
        StatusCode::NOT_FOUND,
        format!("Action \"{action}\" not found in processor \"{processor}\""),
    )
}

/// `500 text/plain` carrying the error and its cause chain.
pub fn error_response(error: &ActionError) -> HttpResponse {
    HttpResponse::text(StatusCode::INTERNAL_SERVER_ERROR, format!("{error}\n"))
}

/// Dispatch stage in which an action failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActionStage {
    Before,
    Handler,
    After,
    NotFound,
}

impl fmt::Display for ActionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionStage::Before => "before hook",
            ActionStage::Handler => "handler",
            ActionStage::After => "after hook",
            ActionStage::NotFound => "not-found hook",
        })
    }
}

/// Failure contained by the router and handed to `on_action_error`.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{stage} of action \"{action}\" failed: {source:#}")]
    Failed {
        action: String,
        stage: ActionStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} of action \"{action}\" panicked: {message}")]
    Panicked {
        action: String,
        stage: ActionStage,
        message: String,
    },
}

impl ActionError {
    pub fn action(&self) -> &str {
        match self {
            ActionError::Failed { action, .. } | ActionError::Panicked { action, .. } => action,
        }
    }

    pub fn stage(&self) -> ActionStage {
        match self {
            ActionError::Failed { stage, .. } | ActionError::Panicked { stage, .. } => *stage,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionTableError {
    #[error("action \"{action}\" is declared more than once in \"{processor}\"")]
    DuplicateAction {
        processor: &'static str,
        action: String,
    },
}

/// Collects action declarations for processor `P`.
pub struct ActionTableBuilder<P> {
    actions: Vec<(String, ActionHandler<P>)>,
}

impl<P> ActionTableBuilder<P> {
    pub fn action(&mut self, name: impl Into<String>, handler: ActionHandler<P>) -> &mut Self {
        self.actions.push((name.into(), handler));
        self
    }
}

/// Immutable action-name to handler mapping.
pub struct ActionTable<P> {
    handlers: HashMap<String, ActionHandler<P>>,
}

impl<P: WebProcessor> ActionTable<P> {
    /// Build the table from `P::actions`, rejecting duplicate names.
    pub fn build() -> Result<Self, ActionTableError> {
        let mut builder = ActionTableBuilder {
            actions: Vec::new(),
        };
        P::actions(&mut builder);

        let mut handlers = HashMap::with_capacity(builder.actions.len());
        for (name, handler) in builder.actions {
            if handlers.contains_key(&name) {
                return Err(ActionTableError::DuplicateAction {
                    processor: type_name::<P>(),
                    action: name,
                });
            }
            handlers.insert(name, handler);
        }
        Ok(Self { handlers })
    }

    pub fn get(&self, action: &str) -> Option<ActionHandler<P>> {
        self.handlers.get(action).copied()
    }

    /// Declared action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Processor adapter that routes [`WebCommand`]s to `P`'s actions.
///
/// Register it like any processor: `context.register_processor::<ActionRouter<Users>>()`.
/// Its scope is `P::SCOPE`.
pub struct ActionRouter<P> {
    processor: P,
    table: ActionTable<P>,
}

impl<P: WebProcessor> ActionRouter<P> {
    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn table(&self) -> &ActionTable<P> {
        &self.table
    }

    /// Run the hook chain for `action`. Never fails.
    pub fn dispatch(&self, action: &str, request: &HttpRequest) -> HttpResponse {
        let span = tracing::debug_span!("action", action, request_id = %request.id());
        let _entered = span.enter();

        match self.run(action, request) {
            Ok(response) => response,
            Err(failure) => {
                error!(error = %failure, "action failed");
                let processor = &self.processor;
                catch_unwind(AssertUnwindSafe(|| processor.on_action_error(action, request, &failure)))
                    .unwrap_or_else(|_| error_response(&failure))
            }
        }
    }

    fn run(&self, action: &str, request: &HttpRequest) -> Result<HttpResponse, ActionError> {
        let processor = &self.processor;

        if let Some(response) = stage(action, ActionStage::Before, || {
            processor.on_before_action(action, request)
        })? {
            debug!("before hook answered the request");
            return Ok(response);
        }

        match self.table.get(action) {
            Some(handler) => {
                debug!("invoking action handler");
                let response = stage(action, ActionStage::Handler, || handler(processor, request))?;
                stage(action, ActionStage::After, || {
                    processor.on_after_action(action, request, response)
                })
            }
            None => {
                debug!("action not found");
                stage(action, ActionStage::NotFound, || {
                    Ok(processor.on_action_not_found(action, request))
                })
            }
        }
    }
}

fn stage<T>(
    action: &str,
    stage: ActionStage,
    run: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, ActionError> {
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(ActionError::Failed {
            action: action.to_string(),
            stage,
            source,
        }),
        Err(payload) => Err(ActionError::Panicked {
            action: action.to_string(),
            stage,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<P: WebProcessor> Processor for ActionRouter<P> {
    const SCOPE: Scope = P::SCOPE;

    fn create(context: ContextRef) -> anyhow::Result<Self> {
        let processor = P::create(context)?;
        let table = ActionTable::build()?;
        Ok(Self { processor, table })
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.processor.initialize()
    }

    fn declare(declaration: &mut ProcessorDeclaration<Self>) {
        declaration.handles::<WebCommand>();
    }
}

impl<P: WebProcessor> Process<WebCommand> for ActionRouter<P> {
    fn process(&self, command: WebCommand) -> HttpResponse {
        self.dispatch(command.action(), command.request())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::http::header::{self, HeaderValue};
    use sparks_infra::{ApplicationContext, ContextError};

    use crate::http::mime;

    fn router<P: WebProcessor>() -> ActionRouter<P> {
        let mut router = ActionRouter::<P>::create(ContextRef::detached()).unwrap();
        router.initialize().unwrap();
        router
    }

    /// Handlers, failures and panics with default hooks.
    struct Catalog {
        listed: AtomicBool,
    }

    impl Catalog {
        fn list(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
            self.listed.store(true, Ordering::SeqCst);
            Ok(HttpResponse::text(StatusCode::OK, "apples, pears"))
        }

        fn show(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
            let id = request
                .parameter("id")
                .ok_or_else(|| anyhow::anyhow!("missing id parameter"))?;
            Ok(HttpResponse::text(StatusCode::OK, format!("item {id}")))
        }

        fn explode(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
            panic!("inventory corrupted")
        }
    }

    impl WebProcessor for Catalog {
        fn create(_context: ContextRef) -> anyhow::Result<Self> {
            Ok(Self {
                listed: AtomicBool::new(false),
            })
        }

        fn actions(table: &mut ActionTableBuilder<Self>) {
            table
                .action("list", Self::list)
                .action("show", Self::show)
                .action("explode", Self::explode);
        }
    }

    #[test]
    fn known_action_returns_handler_output() {
        let router = router::<Catalog>();
        let response = router.dispatch("list", &HttpRequest::get("/list"));
        assert_eq!(response, HttpResponse::text(StatusCode::OK, "apples, pears"));
        assert!(router.processor().listed.load(Ordering::SeqCst));
    }

    #[test]
    fn action_names_are_case_sensitive() {
        let router = router::<Catalog>();
        let response = router.dispatch("LIST", &HttpRequest::get("/LIST"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!router.processor().listed.load(Ordering::SeqCst));
    }

    #[test]
    fn unknown_and_empty_actions_use_not_found_hook() {
        let router = router::<Catalog>();
        for action in ["unknown", ""] {
            let response = router.dispatch(action, &HttpRequest::get("/"));
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.header(header::CONTENT_TYPE), Some(mime::TEXT_PLAIN));
            let body = String::from_utf8(response.body().to_vec()).unwrap();
            assert!(body.starts_with(&format!("Action \"{action}\" not found in processor")));
            assert!(body.contains("Catalog"));
        }
    }

    #[test]
    fn handler_error_becomes_internal_error_response() {
        let router = router::<Catalog>();
        let response = router.dispatch("show", &HttpRequest::get("/show"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(body.contains("missing id parameter"));
    }

    #[test]
    fn handler_panic_is_contained() {
        let router = router::<Catalog>();
        let response = router.dispatch("explode", &HttpRequest::get("/explode"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(body.contains("panicked"));
        assert!(body.contains("inventory corrupted"));
    }

    #[test]
    fn table_lists_declared_actions() {
        let router = router::<Catalog>();
        assert_eq!(router.table().names(), vec!["explode", "list", "show"]);
        assert_eq!(router.table().len(), 3);
    }

    /// Overrides every hook and records the order they run in.
    struct Guarded {
        calls: Mutex<Vec<String>>,
        handled: AtomicUsize,
    }

    impl Guarded {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn secret(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            self.record("handler");
            Ok(HttpResponse::text(StatusCode::OK, "secret"))
        }

        fn fail(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
            self.record("handler");
            anyhow::bail!("boom")
        }
    }

    impl WebProcessor for Guarded {
        fn create(_context: ContextRef) -> anyhow::Result<Self> {
            Ok(Self {
                calls: Mutex::new(Vec::new()),
                handled: AtomicUsize::new(0),
            })
        }

        fn actions(table: &mut ActionTableBuilder<Self>) {
            table.action("secret", Self::secret).action("fail", Self::fail);
        }

        fn on_before_action(
            &self,
            action: &str,
            request: &HttpRequest,
        ) -> anyhow::Result<Option<HttpResponse>> {
            self.record(format!("before:{action}"));
            if request.header(header::AUTHORIZATION).is_none() {
                return Ok(Some(HttpResponse::text(StatusCode::UNAUTHORIZED, "login required")));
            }
            Ok(None)
        }

        fn on_after_action(
            &self,
            action: &str,
            _request: &HttpRequest,
            mut response: HttpResponse,
        ) -> anyhow::Result<HttpResponse> {
            self.record(format!("after:{action}"));
            response.add_header(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            );
            Ok(response)
        }

        fn on_action_not_found(&self, action: &str, _request: &HttpRequest) -> HttpResponse {
            self.record(format!("not_found:{action}"));
            HttpResponse::text(StatusCode::NOT_FOUND, "nope")
        }

        fn on_action_error(&self, action: &str, _request: &HttpRequest, error: &ActionError) -> HttpResponse {
            self.record(format!("error:{action}:{}", error.stage()));
            HttpResponse::text(StatusCode::SERVICE_UNAVAILABLE, "try later")
        }
    }

    fn authorized(path: &str) -> HttpRequest {
        HttpRequest::get(path).with_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"))
    }

    #[test]
    fn before_hook_short_circuits_handler() {
        let router = router::<Guarded>();
        let response = router.dispatch("secret", &HttpRequest::get("/secret"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(router.processor().handled.load(Ordering::SeqCst), 0);
        assert_eq!(router.processor().calls(), vec!["before:secret"]);
    }

    #[test]
    fn hooks_run_in_fixed_order() {
        let router = router::<Guarded>();
        let response = router.dispatch("secret", &authorized("/secret"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header(header::CACHE_CONTROL), Some("no-store"));
        assert_eq!(
            router.processor().calls(),
            vec!["before:secret", "handler", "after:secret"]
        );
    }

    #[test]
    fn before_hook_runs_for_unknown_actions() {
        let router = router::<Guarded>();
        let response = router.dispatch("missing", &authorized("/missing"));
        assert_eq!(response.body(), b"nope");
        assert_eq!(
            router.processor().calls(),
            vec!["before:missing", "not_found:missing"]
        );
    }

    #[test]
    fn error_hook_replaces_failed_stage() {
        let router = router::<Guarded>();
        let response = router.dispatch("fail", &authorized("/fail"));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            router.processor().calls(),
            vec!["before:fail", "handler", "error:fail:handler"]
        );
    }

    /// Its error hook itself panics.
    struct Fragile;

    impl Fragile {
        fn fail(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
            anyhow::bail!("first failure")
        }
    }

    impl WebProcessor for Fragile {
        fn create(_context: ContextRef) -> anyhow::Result<Self> {
            Ok(Self)
        }

        fn actions(table: &mut ActionTableBuilder<Self>) {
            table.action("fail", Self::fail);
        }

        fn on_action_error(&self, _action: &str, _request: &HttpRequest, _error: &ActionError) -> HttpResponse {
            panic!("error hook is broken")
        }
    }

    #[test]
    fn panicking_error_hook_falls_back_to_default_response() {
        let router = router::<Fragile>();
        let response = router.dispatch("fail", &HttpRequest::get("/fail"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(body.contains("first failure"));
    }

    struct Duplicated;

    impl Duplicated {
        fn a(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
            Ok(HttpResponse::ok())
        }
    }

    impl WebProcessor for Duplicated {
        fn create(_context: ContextRef) -> anyhow::Result<Self> {
            Ok(Self)
        }

        fn actions(table: &mut ActionTableBuilder<Self>) {
            table.action("same", Self::a).action("same", Self::a);
        }
    }

    #[test]
    fn duplicate_actions_are_a_configuration_error() {
        let err = ActionTable::<Duplicated>::build().err().unwrap();
        assert!(matches!(err, ActionTableError::DuplicateAction { ref action, .. } if action == "same"));
    }

    #[test]
    fn duplicate_actions_fail_processor_initialization() {
        let context = ApplicationContext::new();
        context.register_processor::<ActionRouter<Duplicated>>();
        context.start().unwrap();

        let err = context
            .process_command(WebCommand::new("same", HttpRequest::get("/same")))
            .unwrap_err();
        assert!(matches!(err, ContextError::ProcessorInitialization { .. }));
    }

    #[test]
    fn router_dispatches_through_the_context() {
        let context = ApplicationContext::new();
        context.register_processor::<ActionRouter<Catalog>>();
        context.start().unwrap();

        let response = context
            .process_command(WebCommand::new("show", HttpRequest::get("/show").with_parameter("id", "7")))
            .unwrap();
        assert_eq!(response.body(), b"item 7");

        // Per-call by default: every dispatch gets a fresh processor.
        let a = context.resolve_processor::<WebCommand>().unwrap();
        let b = context.resolve_processor::<WebCommand>().unwrap();
        assert!(!a.ptr_eq(&b));
        assert!(a.downcast::<ActionRouter<Catalog>>().is_some());
    }

    struct Shared;

    impl Shared {
        fn ping(&self, _request: &HttpRequest) -> anyhow::Result<HttpResponse> {
            Ok(HttpResponse::text(StatusCode::OK, "pong"))
        }
    }

    impl WebProcessor for Shared {
        const SCOPE: Scope = Scope::Singleton;

        fn create(_context: ContextRef) -> anyhow::Result<Self> {
            Ok(Self)
        }

        fn actions(table: &mut ActionTableBuilder<Self>) {
            table.action("ping", Self::ping);
        }
    }

    #[test]
    fn singleton_web_processor_is_shared() {
        let context = ApplicationContext::new();
        context.register_processor::<ActionRouter<Shared>>();
        context.start().unwrap();

        let a = context.resolve_processor::<WebCommand>().unwrap();
        let b = context.resolve_processor::<WebCommand>().unwrap();
        assert!(a.ptr_eq(&b));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || {
                    context
                        .process_command(WebCommand::new("ping", HttpRequest::get("/ping")))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().body(), b"pong");
        }
    }
}
