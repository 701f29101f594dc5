//! Event mechanics: trait, envelope, dead-letter namespace, in-process bus.
//!
//! This crate is framework only — no campaign business rules live here.

pub mod bus;
pub mod dead_letter;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use dead_letter::{
    DEAD_LETTER_PREFIX, DeadLetterPayload, dead_letter_type, is_dead_letter, original_type,
};
pub use envelope::EventEnvelope;
pub use event::DomainEvent;
pub use in_memory_bus::InMemoryEventBus;
