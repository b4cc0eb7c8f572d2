//! In-memory CRUD processor for any serializable entity.
//!
//! Useful for tests and prototypes: the store lives inside a singleton
//! processor, so it is created at `start()` and discarded at `stop()`.

use core::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use sparks_commands::{
    CreateEntitiesCommand, DeleteEntitiesCommand, RetrieveEntitiesCommand, UpdateEntitiesCommand,
};
use sparks_core::{Entity, EntityError, EntityResult, EntitySorter, FilterValue, SortDirection};

use super::matcher::{FieldSource, matches_group, sort_order};
use crate::context::ContextRef;
use crate::processor::{Process, Processor, ProcessorDeclaration, Scope};

/// Singleton processor handling the four CRUD commands of entity `E`.
#[derive(Debug)]
pub struct InMemoryEntityProcessor<E> {
    entities: RwLock<Vec<E>>,
}

impl<E: Entity> InMemoryEntityProcessor<E> {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<E> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl<E: Entity> Default for InMemoryEntityProcessor<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity + Serialize> Processor for InMemoryEntityProcessor<E> {
    const SCOPE: Scope = Scope::Singleton;

    fn create(_context: ContextRef) -> anyhow::Result<Self> {
        Ok(Self::new())
    }

    fn declare(declaration: &mut ProcessorDeclaration<Self>) {
        declaration
            .handles::<CreateEntitiesCommand<E>>()
            .handles::<RetrieveEntitiesCommand<E>>()
            .handles::<UpdateEntitiesCommand<E>>()
            .handles::<DeleteEntitiesCommand<E>>();
    }
}

impl<E: Entity + Serialize> Process<CreateEntitiesCommand<E>> for InMemoryEntityProcessor<E> {
    fn process(&self, command: CreateEntitiesCommand<E>) -> EntityResult<Vec<E>> {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);

        let mut seen: HashSet<&E::Id> = entities.iter().map(|e| e.id()).collect();
        for entity in &command.entities {
            if !seen.insert(entity.id()) {
                return Err(EntityError::validation(format!(
                    "{} {:?} already exists",
                    E::RESOURCE,
                    entity.id()
                )));
            }
        }
        drop(seen);

        entities.extend(command.entities.iter().cloned());
        tracing::debug!(resource = E::RESOURCE, created = command.entities.len(), "created entities");
        Ok(command.entities)
    }
}

impl<E: Entity + Serialize> Process<RetrieveEntitiesCommand<E>> for InMemoryEntityProcessor<E> {
    fn process(&self, command: RetrieveEntitiesCommand<E>) -> EntityResult<Vec<E>> {
        let entities = self.entities.read().unwrap_or_else(PoisonError::into_inner);

        let mut selected = Vec::new();
        for entity in entities.iter() {
            let record = serde_json::to_value(entity)
                .map_err(|e| EntityError::serialization(e.to_string()))?;
            if matches_group(&command.filters, &record) {
                selected.push((entity, record));
            }
        }

        // Stable, so entities equal under every sorter keep insertion order.
        selected.sort_by(|(_, a), (_, b)| compare_records(&command.sorters, a, b));

        Ok(selected
            .into_iter()
            .skip(command.offset)
            .take(command.limit.unwrap_or(usize::MAX))
            .map(|(entity, _)| entity.clone())
            .collect())
    }
}

fn compare_records(sorters: &[EntitySorter], a: &Value, b: &Value) -> Ordering {
    for sorter in sorters {
        let left = a.field(&sorter.field).unwrap_or(FilterValue::Null);
        let right = b.field(&sorter.field).unwrap_or(FilterValue::Null);
        let ordering = match sorter.direction {
            SortDirection::Asc => sort_order(&left, &right),
            SortDirection::Desc => sort_order(&right, &left),
        };
        if ordering.is_ne() {
            return ordering;
        }
    }
    Ordering::Equal
}

impl<E: Entity + Serialize> Process<UpdateEntitiesCommand<E>> for InMemoryEntityProcessor<E> {
    fn process(&self, command: UpdateEntitiesCommand<E>) -> EntityResult<usize> {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = 0;
        for replacement in command.entities {
            if let Some(slot) = entities.iter_mut().find(|e| e.id() == replacement.id()) {
                *slot = replacement;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

impl<E: Entity + Serialize> Process<DeleteEntitiesCommand<E>> for InMemoryEntityProcessor<E> {
    fn process(&self, command: DeleteEntitiesCommand<E>) -> EntityResult<usize> {
        let ids: HashSet<&E::Id> = command.entities.iter().map(|e| e.id()).collect();
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        let before = entities.len();
        entities.retain(|e| !ids.contains(e.id()));
        Ok(before - entities.len())
    }
}
