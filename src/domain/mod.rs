//! Domain layer: aggregates, value objects, events and the pure pricing,
//! shipping and payment rules. Nothing in here touches the database.

pub mod aggregates;
pub mod events;
pub mod payment;
pub mod shipping;
pub mod value_objects;
