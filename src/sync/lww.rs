//! Last-writer-wins conflict resolution
//!
//! Pure and stateless. A record version with the greater `last_modified_at`
//! wins; at a tie the `local` side wins, which during push merging is the
//! server's current state, so a clock-skewed client cannot clobber server
//! state it merely tied with. Tombstones get no special treatment: a delete
//! is just a newer write.

use std::collections::HashMap;
use uuid::Uuid;

use crate::records::Replicated;

/// Resolve a conflict between two versions of the same record.
///
/// An absent side loses outright. Equal timestamps prefer `local`.
pub fn resolve<'a, T: Replicated>(local: Option<&'a T>, remote: Option<&'a T>) -> Option<&'a T> {
    match (local, remote) {
        (None, None) => None,
        (Some(l), None) => Some(l),
        (None, Some(r)) => Some(r),
        (Some(l), Some(r)) => {
            if r.last_modified_at() > l.last_modified_at() {
                Some(r)
            } else {
                Some(l)
            }
        }
    }
}

/// Merge two lists of records keyed by id, picking the winner per id.
///
/// Output order is unspecified (set semantics).
pub fn merge_lists<T: Replicated>(local: Vec<T>, remote: Vec<T>) -> Vec<T> {
    let mut by_id: HashMap<Uuid, T> = HashMap::with_capacity(local.len() + remote.len());

    for record in local {
        by_id.insert(record.id(), record);
    }

    for record in remote {
        match by_id.get(&record.id()) {
            // Existing entry is the local side and keeps ties.
            Some(existing) if existing.last_modified_at() >= record.last_modified_at() => {}
            _ => {
                by_id.insert(record.id(), record);
            }
        }
    }

    by_id.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Account, AccountType};
    use chrono::{DateTime, Duration, Utc};

    fn account(id: Uuid, name: &str, modified: DateTime<Utc>) -> Account {
        let mut a = Account::new(
            Uuid::new_v4(),
            name.into(),
            AccountType::Cash,
            "CNY".into(),
            0.0,
        );
        a.id = id;
        a.created_at = modified;
        a.updated_at = modified;
        a.last_modified_at = modified;
        a
    }

    #[test]
    fn test_resolve_absent_side_loses() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let a = account(id, "Only", now);

        assert_eq!(resolve::<Account>(None, None).map(|_| ()), None);
        assert_eq!(resolve(Some(&a), None).unwrap().name, "Only");
        assert_eq!(resolve(None, Some(&a)).unwrap().name, "Only");
    }

    #[test]
    fn test_resolve_later_timestamp_wins() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let older = account(id, "Older", now - Duration::hours(2));
        let newer = account(id, "Newer", now - Duration::hours(1));

        assert_eq!(resolve(Some(&older), Some(&newer)).unwrap().name, "Newer");
        assert_eq!(resolve(Some(&newer), Some(&older)).unwrap().name, "Newer");
    }

    #[test]
    fn test_resolve_tie_is_position_biased() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let local = account(id, "Local", now);
        let remote = account(id, "Remote", now);

        // At a tie the first argument wins, from either direction.
        assert_eq!(resolve(Some(&local), Some(&remote)).unwrap().name, "Local");
        assert_eq!(resolve(Some(&remote), Some(&local)).unwrap().name, "Remote");
    }

    #[test]
    fn test_resolve_deterministic_when_timestamps_differ() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let a = account(id, "A", now - Duration::minutes(5));
        let b = account(id, "B", now);

        let ab = resolve(Some(&a), Some(&b)).unwrap();
        let ba = resolve(Some(&b), Some(&a)).unwrap();
        assert_eq!(ab.name, ba.name);
    }

    #[test]
    fn test_merge_lists_remote_wins_on_newer() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let local = vec![account(id, "Cash", now - Duration::hours(1))];
        let remote = vec![account(id, "Wallet", now)];

        let merged = merge_lists(local, remote);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Wallet");
    }

    #[test]
    fn test_merge_lists_stale_remote_loses() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let local = vec![account(id, "Cash", now)];
        let remote = vec![account(id, "Wallet", now - Duration::hours(1))];

        let merged = merge_lists(local, remote);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Cash");
    }

    #[test]
    fn test_merge_lists_disjoint_ids_union() {
        let now = Utc::now();
        let phone = account(Uuid::new_v4(), "Phone Cash", now);
        let laptop = account(Uuid::new_v4(), "Laptop Bank", now);
        let tablet = account(Uuid::new_v4(), "Tablet Alipay", now);

        let merged = merge_lists(vec![phone.clone()], vec![laptop.clone(), tablet.clone()]);
        assert_eq!(merged.len(), 3);

        let names: Vec<&str> = merged.iter().map(|a| a.name.as_str()).collect();
        assert!(names.contains(&"Phone Cash"));
        assert!(names.contains(&"Laptop Bank"));
        assert!(names.contains(&"Tablet Alipay"));
    }

    #[test]
    fn test_merge_lists_idempotent() {
        let now = Utc::now();
        let records = vec![
            account(Uuid::new_v4(), "A", now),
            account(Uuid::new_v4(), "B", now - Duration::hours(1)),
        ];

        let merged = merge_lists(records.clone(), records.clone());
        assert_eq!(merged.len(), records.len());
        for original in &records {
            let found = merged.iter().find(|m| m.id == original.id).unwrap();
            assert_eq!(found.name, original.name);
            assert_eq!(found.last_modified_at, original.last_modified_at);
        }
    }

    #[test]
    fn test_merge_lists_delete_beats_older_edit() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let edit = account(id, "Edited", now - Duration::minutes(10));
        let mut delete = account(id, "Edited", now);
        delete.is_deleted = true;

        let merged = merge_lists(vec![edit], vec![delete]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_deleted);
    }

    #[test]
    fn test_merge_lists_edit_beats_older_delete() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut delete = account(id, "Gone", now - Duration::minutes(10));
        delete.is_deleted = true;
        let edit = account(id, "Back", now);

        let merged = merge_lists(vec![delete], vec![edit]);
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].is_deleted);
        assert_eq!(merged[0].name, "Back");
    }
}
