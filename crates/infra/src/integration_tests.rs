//! Integration tests for the full dispatch pipeline.
//!
//! Tests: Properties → ApplicationContext → Processor → InMemory store → Filter tree
//!
//! Verifies:
//! - CRUD commands round-trip through the context to a singleton store
//! - Per-call processors can dispatch further commands through their context reference
//! - Initialization failures surface at the right boundary
//! - Named resources resolve according to configured defaults

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Serialize;
    use sparks_commands::{
        Command, CreateEntitiesCommand, DeleteEntitiesCommand, RetrieveEntitiesCommand,
        UpdateEntitiesCommand,
    };
    use sparks_core::{
        Entity, EntityError, EntityFilter, EntityResult, EntitySorter, FilterGroup, FilterOperator,
        Properties,
    };

    use crate::context::{ApplicationContext, ContextRef};
    use crate::error::ContextError;
    use crate::processor::{Process, Processor, ProcessorDeclaration, Scope};
    use crate::query::InMemoryEntityProcessor;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct User {
        id: u64,
        name: String,
        age: u32,
        city: String,
    }

    impl Entity for User {
        type Id = u64;
        const RESOURCE: &'static str = "users";

        fn id(&self) -> &u64 {
            &self.id
        }
    }

    fn user(id: u64, name: &str, age: u32, city: &str) -> User {
        User {
            id,
            name: name.to_string(),
            age,
            city: city.to_string(),
        }
    }

    fn leaf(field: &str, op: FilterOperator, value: impl Into<sparks_core::FilterValue>) -> EntityFilter {
        EntityFilter::property(field, op, value).unwrap()
    }

    fn setup() -> Arc<ApplicationContext> {
        let properties = Properties::from_json_str(r#"{ "serverName": "integration" }"#).unwrap();
        let context = ApplicationContext::with_properties(properties);
        context.register_processor::<InMemoryEntityProcessor<User>>();
        context.register_processor::<Signup>();
        context.start().unwrap();

        context
            .process_command(CreateEntitiesCommand::many(vec![
                user(1, "Ada", 36, "London"),
                user(2, "Grace", 45, "New York"),
                user(3, "Alan", 41, "London"),
                user(4, "Edsger", 72, "Austin"),
            ]))
            .unwrap()
            .unwrap();
        context
    }

    /// Per-call processor composing other commands through the context.
    #[derive(Debug)]
    struct RegisterUser(User);

    impl Command for RegisterUser {
        type Output = EntityResult<usize>;
    }

    struct Signup {
        context: ContextRef,
    }

    impl Processor for Signup {
        fn create(context: ContextRef) -> anyhow::Result<Self> {
            Ok(Self { context })
        }

        fn declare(declaration: &mut ProcessorDeclaration<Self>) {
            declaration.handles::<RegisterUser>();
        }
    }

    impl Process<RegisterUser> for Signup {
        fn process(&self, command: RegisterUser) -> EntityResult<usize> {
            let context = self
                .context
                .upgrade()
                .map_err(|e| EntityError::storage(e.to_string()))?;
            context
                .process_command(CreateEntitiesCommand::new(command.0))
                .map_err(|e| EntityError::storage(e.to_string()))??;
            context
                .process_command(RetrieveEntitiesCommand::<User>::new())
                .map_err(|e| EntityError::storage(e.to_string()))?
                .map(|users| users.len())
        }
    }

    #[test]
    fn retrieve_applies_filters_sorters_and_window() {
        let context = setup();

        // city = "London" OR (age > 40 AND name contains "r")
        let filters = FilterGroup::any()
            .with(leaf("city", FilterOperator::Equals, "London"))
            .with(
                FilterGroup::all()
                    .with(leaf("age", FilterOperator::GreaterThan, 40))
                    .with(leaf("name", FilterOperator::Contains, "r")),
            );

        let found = context
            .process_command(
                RetrieveEntitiesCommand::<User>::new()
                    .with_filters(filters.clone())
                    .with_sorter(EntitySorter::desc("age")),
            )
            .unwrap()
            .unwrap();
        let names: Vec<_> = found.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Edsger", "Grace", "Alan", "Ada"]);

        let page = context
            .process_command(
                RetrieveEntitiesCommand::<User>::new()
                    .with_filters(filters)
                    .with_sorter(EntitySorter::asc("name"))
                    .with_offset(1)
                    .with_limit(2),
            )
            .unwrap()
            .unwrap();
        let names: Vec<_> = page.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Alan", "Edsger"]);
    }

    #[test]
    fn empty_or_group_retrieves_nothing() {
        let context = setup();
        let found = context
            .process_command(RetrieveEntitiesCommand::<User>::new().with_filters(FilterGroup::any()))
            .unwrap()
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn update_and_delete_report_affected_counts() {
        let context = setup();

        let updated = context
            .process_command(UpdateEntitiesCommand::many(vec![
                user(1, "Ada", 37, "London"),
                user(99, "Nobody", 0, "Nowhere"),
            ]))
            .unwrap()
            .unwrap();
        assert_eq!(updated, 1);

        let deleted = context
            .process_command(DeleteEntitiesCommand::many(vec![
                user(2, "", 0, ""),
                user(4, "", 0, ""),
            ]))
            .unwrap()
            .unwrap();
        assert_eq!(deleted, 2);

        let store = context
            .resolve_processor::<RetrieveEntitiesCommand<User>>()
            .unwrap()
            .downcast::<InMemoryEntityProcessor<User>>()
            .unwrap();
        assert_eq!(store.snapshot(), vec![user(1, "Ada", 37, "London"), user(3, "Alan", 41, "London")]);
    }

    #[test]
    fn duplicate_ids_are_rejected_atomically() {
        let context = setup();
        let result = context
            .process_command(CreateEntitiesCommand::many(vec![
                user(5, "Barbara", 50, "Boston"),
                user(1, "Ada again", 36, "London"),
            ]))
            .unwrap();
        assert!(matches!(result, Err(EntityError::Validation(_))));

        let all = context
            .process_command(RetrieveEntitiesCommand::<User>::new())
            .unwrap()
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn per_call_processor_dispatches_through_its_context() {
        let context = setup();
        let total = context
            .process_command(RegisterUser(user(5, "Barbara", 50, "Boston")))
            .unwrap()
            .unwrap();
        assert_eq!(total, 5);
    }

    #[test]
    fn restart_discards_singleton_state() {
        let context = setup();
        context.stop();
        assert!(matches!(
            context.process_command(RetrieveEntitiesCommand::<User>::new()),
            Err(ContextError::ProcessorNotFound { .. })
        ));

        context.start().unwrap();
        let all = context
            .process_command(RetrieveEntitiesCommand::<User>::new())
            .unwrap()
            .unwrap();
        assert!(all.is_empty());
        assert_eq!(context.property("serverName").as_deref(), Some("integration"));
    }

    // ---------------------------------------------------------------------
    // Initialization failures
    // ---------------------------------------------------------------------

    static FLAKY_ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Attempt;

    impl Command for Attempt {
        type Output = usize;
    }

    /// Per-call processor whose initialization fails on every odd attempt.
    struct Flaky {
        attempt: usize,
    }

    impl Processor for Flaky {
        const SCOPE: Scope = Scope::PerCall;

        fn create(_context: ContextRef) -> anyhow::Result<Self> {
            Ok(Self {
                attempt: FLAKY_ATTEMPTS.fetch_add(1, Ordering::SeqCst),
            })
        }

        fn initialize(&mut self) -> anyhow::Result<()> {
            if self.attempt % 2 == 1 {
                anyhow::bail!("attempt {} failed", self.attempt);
            }
            Ok(())
        }

        fn declare(declaration: &mut ProcessorDeclaration<Self>) {
            declaration.handles::<Attempt>();
        }
    }

    impl Process<Attempt> for Flaky {
        fn process(&self, _command: Attempt) -> usize {
            self.attempt
        }
    }

    #[test]
    fn per_call_initialization_failure_surfaces_from_dispatch() {
        let context = ApplicationContext::new();
        context.register_processor::<Flaky>();
        // Per-call processors are not instantiated at start.
        context.start().unwrap();

        let outcomes: Vec<_> = (0..4).map(|_| context.process_command(Attempt)).collect();
        let failures = outcomes
            .iter()
            .filter(|o| matches!(o, Err(ContextError::ProcessorInitialization { .. })))
            .count();
        assert_eq!(failures, 2);
        assert!(outcomes.iter().any(|o| matches!(o, Ok(n) if n % 2 == 0)));
    }

    #[test]
    fn concurrent_dispatch_to_singleton_store() {
        let context = setup();
        let threads: Vec<_> = (0..8u64)
            .map(|t| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || {
                    for i in 0..25u64 {
                        let id = 100 + t * 25 + i;
                        context
                            .process_command(CreateEntitiesCommand::new(user(id, "worker", 20, "Remote")))
                            .unwrap()
                            .unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let remote = context
            .process_command(
                RetrieveEntitiesCommand::<User>::new()
                    .with_filter(leaf("city", FilterOperator::Equals, "Remote")),
            )
            .unwrap()
            .unwrap();
        assert_eq!(remote.len(), 200);
    }
}
