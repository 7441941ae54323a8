use crate::commands::{execute, CommandResult, Reply};

/// Migrations are applied by [`execute`] before any command body runs, so the
/// body only reports the outcome.
pub fn run() -> CommandResult {
    execute("migrate", |_config, _pool| async { Ok(Reply::message("applied pending migrations")) })
}
