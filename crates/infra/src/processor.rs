//! Processors: units of business logic bound to command types.
//!
//! A processor type declares, without any runtime introspection:
//!
//! - its **scope** (`Processor::SCOPE`): one shared instance per running context
//!   (`Scope::Singleton`) or a fresh instance per dispatch (`Scope::PerCall`)
//! - the **command types** it handles (`Processor::declare`), each backed by a
//!   `Process<C>` implementation
//!
//! ```ignore
//! struct Users { /* ... */ }
//!
//! impl Processor for Users {
//!     const SCOPE: Scope = Scope::Singleton;
//!
//!     fn create(context: ContextRef) -> anyhow::Result<Self> { /* ... */ }
//!
//!     fn declare(declaration: &mut ProcessorDeclaration<Self>) {
//!         declaration.handles::<CreateUser>().handles::<ListUsers>();
//!     }
//! }
//!
//! impl Process<CreateUser> for Users { /* ... */ }
//! impl Process<ListUsers> for Users { /* ... */ }
//! ```
//!
//! The declaration is compiled into a type-erased `ProcessorDescriptor` that the
//! application context reads at `start()`.

use core::any::{Any, TypeId, type_name};
use std::sync::Arc;

use sparks_commands::{Command, command_name};

use crate::context::ContextRef;
use crate::error::ContextError;

/// Lifecycle scope of a processor type.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One instance per running context, created at `start()` and dropped at `stop()`.
    ///
    /// Singleton processors are shared by concurrent dispatches and must guard
    /// their own mutable state.
    Singleton,
    /// A fresh instance for every dispatch, dropped when `process` returns.
    #[default]
    PerCall,
}

/// A unit of business logic with a declared scope and command set.
pub trait Processor: Sized + Send + Sync + 'static {
    const SCOPE: Scope = Scope::PerCall;

    /// Construct the processor, bound to its owning context.
    ///
    /// The context reference is set once here and never reassigned.
    fn create(context: ContextRef) -> anyhow::Result<Self>;

    /// One-time setup, called exactly once after `create` and before any `process`.
    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Declare the command types this processor handles.
    fn declare(declaration: &mut ProcessorDeclaration<Self>);
}

/// Handles one command type.
///
/// For singleton processors `process` may run concurrently on many threads.
/// Failures are expressed through `C::Output`; this layer never swallows them.
pub trait Process<C: Command>: Processor {
    fn process(&self, command: C) -> C::Output;
}

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

type InvokeFn = fn(&(dyn Any + Send + Sync), Box<dyn Any + Send>) -> Option<Box<dyn Any + Send>>;

type FactoryFn = fn(ContextRef) -> anyhow::Result<Instance>;

/// Type-erased entry point for one `(processor, command)` pair.
#[derive(Clone, Copy)]
pub(crate) struct CommandBinding {
    pub(crate) command_type: TypeId,
    pub(crate) command_name: &'static str,
    pub(crate) invoke: InvokeFn,
}

/// Collects the command bindings of processor `P`.
pub struct ProcessorDeclaration<P> {
    bindings: Vec<CommandBinding>,
    _processor: core::marker::PhantomData<fn() -> P>,
}

impl<P: Processor> ProcessorDeclaration<P> {
    fn new() -> Self {
        Self {
            bindings: Vec::new(),
            _processor: core::marker::PhantomData,
        }
    }

    /// Bind command type `C` to this processor. Repeated declarations are ignored.
    pub fn handles<C: Command>(&mut self) -> &mut Self
    where
        P: Process<C>,
    {
        let command_type = TypeId::of::<C>();
        if !self.bindings.iter().any(|b| b.command_type == command_type) {
            self.bindings.push(CommandBinding {
                command_type,
                command_name: command_name::<C>(),
                invoke: invoke::<P, C>,
            });
        }
        self
    }
}

fn invoke<P, C>(
    processor: &(dyn Any + Send + Sync),
    command: Box<dyn Any + Send>,
) -> Option<Box<dyn Any + Send>>
where
    P: Process<C>,
    C: Command,
{
    let processor = processor.downcast_ref::<P>()?;
    let command = command.downcast::<C>().ok()?;
    Some(Box::new(processor.process(*command)))
}

fn instantiate<P: Processor>(context: ContextRef) -> anyhow::Result<Instance> {
    let mut processor = P::create(context)?;
    processor.initialize()?;
    Ok(Arc::new(processor))
}

/// Registration metadata of one processor type, read by the context at `start()`.
pub(crate) struct ProcessorDescriptor {
    pub(crate) processor_type: TypeId,
    pub(crate) name: &'static str,
    pub(crate) scope: Scope,
    pub(crate) bindings: Vec<CommandBinding>,
    factory: FactoryFn,
}

impl ProcessorDescriptor {
    pub(crate) fn of<P: Processor>() -> Self {
        let mut declaration = ProcessorDeclaration::<P>::new();
        P::declare(&mut declaration);
        Self {
            processor_type: TypeId::of::<P>(),
            name: type_name::<P>(),
            scope: P::SCOPE,
            bindings: declaration.bindings,
            factory: instantiate::<P>,
        }
    }

    /// Construct, bind and initialize a new instance.
    pub(crate) fn instantiate(&self, context: ContextRef) -> Result<Instance, ContextError> {
        tracing::debug!(processor = self.name, scope = ?self.scope, "instantiating processor");
        (self.factory)(context).map_err(|source| ContextError::initialization(self.name, source))
    }
}

impl core::fmt::Debug for ProcessorDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProcessorDescriptor")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field(
                "commands",
                &self.bindings.iter().map(|b| b.command_name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A resolved processor instance.
///
/// Two handles to the same singleton are `ptr_eq`; per-call resolutions never are.
#[derive(Clone)]
pub struct ProcessorHandle {
    name: &'static str,
    scope: Scope,
    instance: Instance,
}

impl ProcessorHandle {
    pub(crate) fn new(name: &'static str, scope: Scope, instance: Instance) -> Self {
        Self {
            name,
            scope,
            instance,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn ptr_eq(&self, other: &ProcessorHandle) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }

    /// Typed access to the underlying processor.
    pub fn downcast<P: Processor>(&self) -> Option<Arc<P>> {
        self.instance.clone().downcast::<P>().ok()
    }
}

impl core::fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
