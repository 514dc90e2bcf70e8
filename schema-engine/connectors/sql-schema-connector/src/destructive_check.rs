use crate::migration::MigrationStep;

/// One-line descriptions of every destructive step, in execution order.
/// Empty when the migration is safe.
pub fn destructive_descriptions(steps: &[MigrationStep]) -> Vec<String> {
    steps
        .iter()
        .filter(|step| step.is_destructive())
        .map(ToString::to_string)
        .collect()
}
