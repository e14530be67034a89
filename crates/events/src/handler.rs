use flagplane_core::Aggregate;

/// Apply one command to an aggregate in place (no IO, no async).
///
/// 1. **Decide**: `aggregate.handle(command)` checks the command against the
///    current state and yields its event (pure, no mutation)
/// 2. **Evolve**: the event is applied via `aggregate.apply(event)`
///
/// On error the aggregate is left untouched.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<A::Event, A::Error>
where
    A: Aggregate,
{
    let event = A::handle(aggregate, command)?;
    A::apply(aggregate, &event);
    Ok(event)
}

/// Apply an ordered batch of commands, stopping at the first failure.
///
/// Events come back in command order. When a command fails, the earlier
/// commands have already mutated `aggregate`; callers treat the whole batch as
/// failed and discard the aggregate (the surrounding transaction rolls back).
pub fn execute_all<A>(aggregate: &mut A, commands: &[A::Command]) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    commands
        .iter()
        .map(|command| execute(aggregate, command))
        .collect()
}
