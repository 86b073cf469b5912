//! Sea-ORM entities for the numbering tables

pub mod assignments;
pub mod counters;

pub use assignments::Entity as Assignments;
pub use counters::Entity as Counters;
