//! Commands: typed units of work dispatched to processors.

pub mod command;
pub mod crud;

pub use command::{Command, command_name};
pub use crud::{
    CreateEntitiesCommand, DeleteEntitiesCommand, RetrieveEntitiesCommand, UpdateEntitiesCommand,
};
