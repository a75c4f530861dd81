/// A domain-agnostic event.
///
/// Events are immutable facts, versioned for schema evolution and appended
/// to a stream in order.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "token.ledger.transferred").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;
}
