//! Reconciliation between applied and available migrations
//!
//! Pure set arithmetic on migration names. The tracking table is the only
//! authority on what has been applied; file presence never implies it.

use std::collections::{BTreeSet, HashSet};

use super::definitions::{MigrationName, MigrationState, MigrationStatus};

/// Available migrations that have not been applied, ascending
///
/// Names applied but no longer on disk are ignored.
pub fn pending(applied: &HashSet<MigrationName>, available: &[MigrationName]) -> Vec<MigrationName> {
    available
        .iter()
        .filter(|name| !applied.contains(*name))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Applied migrations whose file is no longer available, ascending
pub fn missing_local(applied: &[MigrationName], available: &[MigrationName]) -> Vec<MigrationName> {
    let available: HashSet<&MigrationName> = available.iter().collect();
    applied
        .iter()
        .filter(|name| !available.contains(name))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// State of every known migration, ascending by name
pub fn status(applied: &[MigrationName], available: &[MigrationName]) -> Vec<MigrationStatus> {
    let applied_set: HashSet<&MigrationName> = applied.iter().collect();
    let available_set: HashSet<&MigrationName> = available.iter().collect();

    applied_set
        .union(&available_set)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|name| {
            let state = match (applied_set.contains(name), available_set.contains(name)) {
                (true, true) => MigrationState::Applied,
                (true, false) => MigrationState::MissingLocal,
                _ => MigrationState::Pending,
            };
            MigrationStatus {
                name: name.clone(),
                state,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<MigrationName> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> HashSet<MigrationName> {
        names(items).into_iter().collect()
    }

    #[test]
    fn test_pending_disjoint_sets_returns_sorted_available() {
        let available = names(&["20230103-c.sql", "20230101-a.sql", "20230102-b.sql"]);
        let result = pending(&set(&["20220101-x.sql"]), &available);
        assert_eq!(result, names(&["20230101-a.sql", "20230102-b.sql", "20230103-c.sql"]));
    }

    #[test]
    fn test_pending_is_idempotent() {
        let available = names(&["b.sql", "a.sql", "c.sql"]);
        let applied: HashSet<MigrationName> = available.iter().cloned().collect();
        assert!(pending(&applied, &available).is_empty());
    }

    #[test]
    fn test_pending_skips_applied() {
        let result = pending(&set(&["a.sql", "b.sql"]), &names(&["c.sql", "b.sql", "a.sql"]));
        assert_eq!(result, names(&["c.sql"]));
    }

    #[test]
    fn test_pending_empty_available() {
        assert!(pending(&set(&["a.sql"]), &[]).is_empty());
        assert!(pending(&HashSet::new(), &[]).is_empty());
    }

    #[test]
    fn test_pending_ignores_applied_missing_locally() {
        let result = pending(&set(&["gone.sql", "a.sql"]), &names(&["a.sql", "b.sql"]));
        assert_eq!(result, names(&["b.sql"]));
    }

    #[test]
    fn test_pending_orders_bytewise() {
        let result = pending(&HashSet::new(), &names(&["b.sql", "B.sql", "a.sql", "_.sql"]));
        assert_eq!(result, names(&["B.sql", "_.sql", "a.sql", "b.sql"]));
    }

    #[test]
    fn test_missing_local() {
        let result = missing_local(&names(&["c.sql", "a.sql", "gone.sql"]), &names(&["a.sql", "c.sql"]));
        assert_eq!(result, names(&["gone.sql"]));
    }

    #[test]
    fn test_status_classifies_every_name() {
        let result = status(&names(&["a.sql", "gone.sql"]), &names(&["b.sql", "a.sql"]));
        assert_eq!(
            result,
            vec![
                MigrationStatus { name: "a.sql".to_string(), state: MigrationState::Applied },
                MigrationStatus { name: "b.sql".to_string(), state: MigrationState::Pending },
                MigrationStatus { name: "gone.sql".to_string(), state: MigrationState::MissingLocal },
            ]
        );
    }
}
