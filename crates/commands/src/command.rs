/// A command identifies a unit of work by its concrete type (command abstraction).
///
/// Commands represent **intent**: a request for some processor to do something.
/// They are created by a caller per use case, consumed exactly once by the
/// application context, and discarded afterwards.
///
/// ## Dispatch key
///
/// The concrete Rust type of the command is the dispatch key. Exactly one
/// processor type is bound to each command type while the context is running;
/// dispatching an unbound command type is an error, never a silent no-op.
///
/// ## Typed results
///
/// Each command declares the value its processor produces through `Output`.
/// Fallible use cases declare a `Result` output (CRUD commands use
/// `EntityResult<_>`), keeping business failures separate from dispatch failures.
///
/// ## Design Constraints
///
/// Commands must be:
/// - **Send**: commands cross thread boundaries (one thread per inbound request)
/// - **'static**: commands own all their data
/// - **Debug**: commands appear in dispatch logs and error messages
pub trait Command: core::fmt::Debug + Send + 'static {
    type Output: Send + 'static;
}

/// Human-readable name of a command type, used in logs and errors.
pub fn command_name<C: Command>() -> &'static str {
    core::any::type_name::<C>()
}
