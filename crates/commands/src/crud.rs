//! Storage-independent CRUD commands.
//!
//! Each command is parameterised by the entity type it targets, so
//! `RetrieveEntitiesCommand<User>` and `RetrieveEntitiesCommand<Order>` are
//! distinct dispatch keys and may be bound to different processors.

use sparks_core::{Entity, EntityFilter, EntityResult, EntitySorter, FilterGroup};

use crate::Command;

/// Persist new entities. Returns the stored entities.
#[derive(Debug, Clone)]
pub struct CreateEntitiesCommand<E: Entity> {
    pub entities: Vec<E>,
}

impl<E: Entity> CreateEntitiesCommand<E> {
    pub fn new(entity: E) -> Self {
        Self {
            entities: vec![entity],
        }
    }

    pub fn many(entities: Vec<E>) -> Self {
        Self { entities }
    }
}

impl<E: Entity> Command for CreateEntitiesCommand<E> {
    type Output = EntityResult<Vec<E>>;
}

/// Replace stored entities that share an identifier. Returns the number updated.
#[derive(Debug, Clone)]
pub struct UpdateEntitiesCommand<E: Entity> {
    pub entities: Vec<E>,
}

impl<E: Entity> UpdateEntitiesCommand<E> {
    pub fn new(entity: E) -> Self {
        Self {
            entities: vec![entity],
        }
    }

    pub fn many(entities: Vec<E>) -> Self {
        Self { entities }
    }
}

impl<E: Entity> Command for UpdateEntitiesCommand<E> {
    type Output = EntityResult<usize>;
}

/// Delete stored entities by identifier. Returns the number deleted.
#[derive(Debug, Clone)]
pub struct DeleteEntitiesCommand<E: Entity> {
    pub entities: Vec<E>,
}

impl<E: Entity> DeleteEntitiesCommand<E> {
    pub fn new(entity: E) -> Self {
        Self {
            entities: vec![entity],
        }
    }

    pub fn many(entities: Vec<E>) -> Self {
        Self { entities }
    }
}

impl<E: Entity> Command for DeleteEntitiesCommand<E> {
    type Output = EntityResult<usize>;
}

/// Query entities with a filter tree, sort order and paging window.
///
/// The default filter is an empty `AND` group, i.e. every entity matches.
#[derive(Debug, Clone)]
pub struct RetrieveEntitiesCommand<E: Entity> {
    pub filters: FilterGroup,
    pub sorters: Vec<EntitySorter>,
    pub limit: Option<usize>,
    pub offset: usize,
    _entity: core::marker::PhantomData<fn() -> E>,
}

impl<E: Entity> Default for RetrieveEntitiesCommand<E> {
    fn default() -> Self {
        Self {
            filters: FilterGroup::all(),
            sorters: Vec::new(),
            limit: None,
            offset: 0,
            _entity: core::marker::PhantomData,
        }
    }
}

impl<E: Entity> RetrieveEntitiesCommand<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(mut self, filters: FilterGroup) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<EntityFilter>) -> Self {
        self.filters.add_filter(filter);
        self
    }

    pub fn with_sorter(mut self, sorter: EntitySorter) -> Self {
        self.sorters.push(sorter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl<E: Entity> Command for RetrieveEntitiesCommand<E> {
    type Output = EntityResult<Vec<E>>;
}
