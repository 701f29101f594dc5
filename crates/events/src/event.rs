use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **append-only** (the outbox never rewrites them)
/// - identified by a stable, routable type name
pub trait DomainEvent: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "campaign.publish.first_content").
    ///
    /// Doubles as the routing key for bus subscribers, scheduler handlers,
    /// and the dead-letter namespace.
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
