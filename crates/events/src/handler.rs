/// Execute an aggregate command deterministically (no IO).
///
/// 1. **Decide**: `aggregate.handle(command)` validates and returns events without mutating.
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// If `handle` rejects the command the aggregate is untouched, so every
/// command is all-or-nothing. For the persisted pipeline (store + bus), use
/// the infrastructure `CommandDispatcher`.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: tokenledger_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
