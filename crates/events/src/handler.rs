/// Execute an aggregate command in place: decide, then apply (no IO).
///
/// Handy in domain tests and for previewing a command against a rehydrated
/// aggregate. The persistent path is `CommandDispatcher::dispatch` in infra.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: procureflow_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
