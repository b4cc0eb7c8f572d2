//! Application context: processor registry, lifecycle and command dispatch.
//!
//! ## Command Execution Flow
//!
//! ```text
//! Command
//!   ↓
//! 1. Look up the processor bound to the command's type (dispatch map)
//!   ↓
//! 2. Obtain an instance (cached singleton, or a fresh per-call instance)
//!   ↓
//! 3. Invoke `Process<C>::process` and return its output unchanged
//! ```
//!
//! ## Lifecycle
//!
//! The context moves between **stopped** and **running**. `start()` reads every
//! registered processor's declaration, instantiates singletons and builds the
//! dispatch map; `stop()` clears both. Registered processor types, properties,
//! view factories and data sources survive restarts.
//!
//! `start`/`stop` are serialized against each other but callers must not run
//! them concurrently with in-flight `process_command` calls. While running, the
//! dispatch state is only read.
//!
//! ## Binding conflicts
//!
//! When two processor types declare the same command type, the processor
//! registered **last** wins (registration order is preserved) and the conflict
//! is logged. With `set_strict_bindings(true)` the conflict fails `start()`.

use core::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use sparks_commands::{Command, command_name};
use sparks_core::Properties;
use sparks_core::properties::{DEFAULT_DATA_SOURCE_PROPERTY, DEFAULT_VIEW_FACTORY_PROPERTY};
use tracing::{debug, info, warn};

use crate::data_source::DataSource;
use crate::error::ContextError;
use crate::processor::{
    CommandBinding, Instance, Processor, ProcessorDescriptor, ProcessorHandle, Scope,
};
use crate::registry::NamedRegistry;
use crate::views::{View, ViewFactory};

/// Weak back-reference from a processor to its owning context.
///
/// Holding a weak reference keeps singleton processors (owned by the context)
/// from forming a reference cycle with it.
#[derive(Debug, Clone)]
pub struct ContextRef(Weak<ApplicationContext>);

impl ContextRef {
    /// A reference that is not attached to any context (for standalone use and tests).
    pub fn detached() -> Self {
        Self(Weak::new())
    }

    pub fn upgrade(&self) -> Result<Arc<ApplicationContext>, ContextError> {
        self.0.upgrade().ok_or(ContextError::ContextDropped)
    }
}

/// Hooks run after the context changes state.
pub trait ContextListener: Send + Sync {
    fn on_start(&self, _context: &ApplicationContext) {}

    fn on_stop(&self, _context: &ApplicationContext) {}
}

/// A tuple of processor types registered together, in tuple order.
pub trait ProcessorSet {
    fn register_all(context: &ApplicationContext) -> usize;
}

macro_rules! impl_processor_set {
    ($($processor:ident),+) => {
        impl<$($processor: Processor),+> ProcessorSet for ($($processor,)+) {
            fn register_all(context: &ApplicationContext) -> usize {
                0 $(+ usize::from(context.register_processor::<$processor>()))+
            }
        }
    };
}

impl_processor_set!(A);
impl_processor_set!(A, B);
impl_processor_set!(A, B, C);
impl_processor_set!(A, B, C, D);
impl_processor_set!(A, B, C, D, E);
impl_processor_set!(A, B, C, D, E, F);
impl_processor_set!(A, B, C, D, E, F, G);
impl_processor_set!(A, B, C, D, E, F, G, H);

#[derive(Clone)]
struct BoundProcessor {
    descriptor: Arc<ProcessorDescriptor>,
    binding: CommandBinding,
}

#[derive(Default)]
struct Runtime {
    running: bool,
    processors_by_command: HashMap<TypeId, BoundProcessor>,
    singletons: HashMap<TypeId, Instance>,
}

/// Process-scoped state owning processors, views and data sources.
///
/// Always handled through `Arc` (see [`ApplicationContext::new`]) so processors
/// can hold a [`ContextRef`] back to it.
pub struct ApplicationContext {
    this: Weak<ApplicationContext>,
    properties: RwLock<Properties>,
    registered: RwLock<Vec<Arc<ProcessorDescriptor>>>,
    runtime: RwLock<Runtime>,
    lifecycle: Mutex<()>,
    strict_bindings: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn ContextListener>>>,
    view_factories: NamedRegistry<dyn ViewFactory>,
    data_sources: NamedRegistry<dyn DataSource>,
}

impl ApplicationContext {
    pub fn new() -> Arc<Self> {
        Self::with_properties(Properties::new())
    }

    pub fn with_properties(properties: Properties) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            properties: RwLock::new(properties),
            registered: RwLock::new(Vec::new()),
            runtime: RwLock::new(Runtime::default()),
            lifecycle: Mutex::new(()),
            strict_bindings: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            view_factories: NamedRegistry::new(),
            data_sources: NamedRegistry::new(),
        })
    }

    pub fn context_ref(&self) -> ContextRef {
        ContextRef(self.this.clone())
    }

    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    pub fn properties(&self) -> Properties {
        read(&self.properties).clone()
    }

    pub fn property(&self, key: &str) -> Option<String> {
        read(&self.properties).get(key).map(str::to_string)
    }

    pub fn set_properties(&self, properties: Properties) {
        *write(&self.properties) = properties;
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        write(&self.properties).set(key, value);
    }

    // ---------------------------------------------------------------------
    // Processor registration & lifecycle
    // ---------------------------------------------------------------------

    /// Register processor type `P`. Returns `false` if it was already registered.
    ///
    /// Registrations take effect at the next `start()`.
    pub fn register_processor<P: Processor>(&self) -> bool {
        self.register(ProcessorDescriptor::of::<P>())
    }

    /// Register a tuple of processor types in order. Returns how many were new.
    ///
    /// ```ignore
    /// context.register_processors::<(Users, Orders, Reports)>();
    /// ```
    pub fn register_processors<S: ProcessorSet>(&self) -> usize {
        S::register_all(self)
    }

    fn register(&self, descriptor: ProcessorDescriptor) -> bool {
        let mut registered = write(&self.registered);
        if registered
            .iter()
            .any(|d| d.processor_type == descriptor.processor_type)
        {
            return false;
        }
        debug!(
            processor = descriptor.name,
            scope = ?descriptor.scope,
            commands = descriptor.bindings.len(),
            "registered processor"
        );
        registered.push(Arc::new(descriptor));
        true
    }

    /// Names of the registered processor types, in registration order.
    pub fn registered_processors(&self) -> Vec<&'static str> {
        read(&self.registered).iter().map(|d| d.name).collect()
    }

    /// Fail `start()` on duplicate command bindings instead of letting the last one win.
    pub fn set_strict_bindings(&self, strict: bool) {
        self.strict_bindings.store(strict, Ordering::Relaxed);
    }

    pub fn add_listener(&self, listener: impl ContextListener + 'static) {
        write(&self.listeners).push(Arc::new(listener));
    }

    pub fn is_running(&self) -> bool {
        read(&self.runtime).running
    }

    /// Start the context. Calling `start` while running is a no-op.
    ///
    /// Singleton instantiation failures leave the context stopped and are
    /// returned as `ContextError::ProcessorInitialization`.
    pub fn start(&self) -> Result<(), ContextError> {
        let lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_running() {
            debug!("application context already running");
            return Ok(());
        }

        let descriptors = read(&self.registered).clone();
        let strict = self.strict_bindings.load(Ordering::Relaxed);

        let mut processors_by_command: HashMap<TypeId, BoundProcessor> = HashMap::new();
        let mut singletons: HashMap<TypeId, Instance> = HashMap::new();

        for descriptor in &descriptors {
            if descriptor.scope == Scope::Singleton {
                let instance = descriptor.instantiate(self.context_ref())?;
                singletons.insert(descriptor.processor_type, instance);
            }

            for binding in &descriptor.bindings {
                if let Some(previous) = processors_by_command.get(&binding.command_type) {
                    if strict {
                        return Err(ContextError::ConfigConflict {
                            command: binding.command_name,
                            first: previous.descriptor.name,
                            second: descriptor.name,
                        });
                    }
                    warn!(
                        command = binding.command_name,
                        replaced = previous.descriptor.name,
                        processor = descriptor.name,
                        "command declared by several processors; last registration wins"
                    );
                }
                processors_by_command.insert(
                    binding.command_type,
                    BoundProcessor {
                        descriptor: Arc::clone(descriptor),
                        binding: *binding,
                    },
                );
            }
        }

        let commands = processors_by_command.len();
        let singleton_count = singletons.len();
        {
            let mut runtime = write(&self.runtime);
            runtime.processors_by_command = processors_by_command;
            runtime.singletons = singletons;
            runtime.running = true;
        }

        info!(
            processors = descriptors.len(),
            commands,
            singletons = singleton_count,
            "application context started"
        );

        // Listeners may start or stop the context themselves.
        drop(lifecycle);
        for listener in self.listeners_snapshot() {
            listener.on_start(self);
        }
        Ok(())
    }

    /// Stop the context, dropping singletons and the dispatch map.
    /// Calling `stop` while stopped is a no-op.
    pub fn stop(&self) {
        let lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let released = {
            let mut runtime = write(&self.runtime);
            if !runtime.running {
                debug!("application context already stopped");
                return;
            }
            runtime.running = false;
            runtime.processors_by_command.clear();
            core::mem::take(&mut runtime.singletons)
        };
        // Singletons drop outside the lock so their destructors may use the context.
        drop(released);

        info!("application context stopped");

        drop(lifecycle);
        for listener in self.listeners_snapshot() {
            listener.on_stop(self);
        }
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn ContextListener>> {
        read(&self.listeners).clone()
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    fn resolve<C: Command>(&self) -> Result<(BoundProcessor, Instance), ContextError> {
        let (bound, cached) = {
            let runtime = read(&self.runtime);
            let bound = runtime
                .processors_by_command
                .get(&TypeId::of::<C>())
                .cloned()
                .ok_or_else(|| ContextError::processor_not_found(command_name::<C>()))?;
            let cached = runtime
                .singletons
                .get(&bound.descriptor.processor_type)
                .cloned();
            (bound, cached)
        };

        let instance = match cached {
            Some(instance) => instance,
            None => bound.descriptor.instantiate(self.context_ref())?,
        };
        Ok((bound, instance))
    }

    /// Resolve the processor instance that would handle command type `C`.
    ///
    /// Singletons resolve to the cached instance; per-call processors resolve to
    /// a freshly constructed and initialized instance every time.
    pub fn resolve_processor<C: Command>(&self) -> Result<ProcessorHandle, ContextError> {
        let (bound, instance) = self.resolve::<C>()?;
        Ok(ProcessorHandle::new(
            bound.descriptor.name,
            bound.descriptor.scope,
            instance,
        ))
    }

    /// Dispatch `command` to its bound processor and return the processor's output.
    pub fn process_command<C: Command>(&self, command: C) -> Result<C::Output, ContextError> {
        let (bound, instance) = self.resolve::<C>()?;
        let processor = bound.descriptor.name;
        let command_name = bound.binding.command_name;

        let span = tracing::debug_span!("process_command", command = command_name, processor);
        let _entered = span.enter();
        debug!("dispatching command");

        let output = (bound.binding.invoke)(&*instance, Box::new(command))
            .ok_or_else(|| ContextError::command_mismatch(processor, command_name))?;
        output
            .downcast::<C::Output>()
            .map(|output| *output)
            .map_err(|_| ContextError::command_mismatch(processor, command_name))
    }

    // ---------------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------------

    pub fn add_view_factory(&self, name: impl Into<String>, factory: impl ViewFactory + 'static) {
        let name = name.into();
        debug!(factory = %name, "added view factory");
        self.view_factories.insert(name, Arc::new(factory));
    }

    pub fn remove_view_factory(&self, name: &str) -> Option<Arc<dyn ViewFactory>> {
        self.view_factories.remove(name)
    }

    pub fn view_factory_names(&self) -> Vec<String> {
        self.view_factories.names()
    }

    /// Create a view from the single registered factory, or the default one.
    pub fn create_view(&self, view_name: &str) -> Result<Box<dyn View>, ContextError> {
        let default_name = self.property(DEFAULT_VIEW_FACTORY_PROPERTY);
        self.view_factories
            .resolve(default_name.as_deref())
            .and_then(|factory| factory.create_view(view_name))
            .ok_or_else(|| ContextError::view_not_found(view_name))
    }

    /// Create a view from the factory registered under `factory_name`.
    pub fn create_view_from(
        &self,
        factory_name: &str,
        view_name: &str,
    ) -> Result<Box<dyn View>, ContextError> {
        self.view_factories
            .get(factory_name)
            .and_then(|factory| factory.create_view(view_name))
            .ok_or_else(|| ContextError::view_not_found(view_name))
    }

    // ---------------------------------------------------------------------
    // Data sources
    // ---------------------------------------------------------------------

    /// Register `source` under `name`. An `Arc<T>` may be passed to share a
    /// pool with other owners; `downcast_ref::<T>()` still finds it.
    pub fn add_data_source(&self, name: impl Into<String>, source: impl DataSource) {
        let name = name.into();
        debug!(data_source = %name, "added data source");
        self.data_sources.insert(name, Arc::new(source));
    }

    pub fn remove_data_source(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.data_sources.remove(name)
    }

    pub fn data_source_names(&self) -> Vec<String> {
        self.data_sources.names()
    }

    /// The single registered data source, or the default one; `None` otherwise.
    pub fn get_data_source(&self) -> Option<Arc<dyn DataSource>> {
        let default_name = self.property(DEFAULT_DATA_SOURCE_PROPERTY);
        self.data_sources.resolve(default_name.as_deref())
    }

    pub fn get_named_data_source(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.data_sources.get(name)
    }
}

impl core::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("running", &self.is_running())
            .field("processors", &self.registered_processors())
            .field("view_factories", &self.view_factories.names())
            .field("data_sources", &self.data_sources.names())
            .finish()
    }
}

// Writers replace whole maps, so state behind a poisoned lock is still consistent.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
