//! Page merging for comment and reply threads.

use std::collections::HashMap;

use murmur_types::{Identified, Reply};
use uuid::Uuid;

/// Merge `incoming` into `existing` without duplicating ids.
///
/// An id keeps the position of its first occurrence and takes the value of
/// its last one, so a refetched comment is updated in place.
pub fn merge_by_id<T: Identified>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    let mut slots: Vec<Option<T>> = Vec::with_capacity(existing.len() + incoming.len());
    let mut positions: HashMap<Uuid, usize> = HashMap::with_capacity(slots.capacity());

    for item in existing.into_iter().chain(incoming) {
        match positions.get(&item.id()) {
            Some(&index) => slots[index] = Some(item),
            None => {
                positions.insert(item.id(), slots.len());
                slots.push(Some(item));
            }
        }
    }

    slots.into_iter().flatten().collect()
}

/// Merge a reply page, then order the thread oldest first
pub fn merge_replies(existing: Vec<Reply>, incoming: Vec<Reply>) -> Vec<Reply> {
    let mut merged = merge_by_id(existing, incoming);
    merged.sort_by_key(|reply| reply.created_at);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: Uuid,
        content: &'static str,
    }

    impl Identified for Item {
        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn item(id: u128, content: &'static str) -> Item {
        Item { id: Uuid::from_u128(id), content }
    }

    fn reply(id: u128, minutes: i64) -> Reply {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Reply {
            id: Uuid::from_u128(id),
            comment_id: Uuid::nil(),
            author_id: Uuid::nil(),
            author_username: "ana".to_string(),
            content: format!("reply {}", id),
            tagged_users: Vec::new(),
            created_at: base + Duration::minutes(minutes),
            react_counts: Default::default(),
            my_reaction: None,
            is_edited: false,
        }
    }

    #[test]
    fn test_overlapping_page_keeps_first_position_and_latest_value() {
        let merged = merge_by_id(
            vec![item(1, ""), item(2, "")],
            vec![item(2, "x"), item(3, "")],
        );
        assert_eq!(merged, vec![item(1, ""), item(2, "x"), item(3, "")]);
    }

    #[test]
    fn test_empty_incoming_is_identity() {
        let existing = vec![item(4, "a"), item(9, "b")];
        assert_eq!(merge_by_id(existing.clone(), Vec::new()), existing);
    }

    #[test]
    fn test_duplicates_inside_one_page_collapse() {
        let merged = merge_by_id(Vec::new(), vec![item(1, "old"), item(2, ""), item(1, "new")]);
        assert_eq!(merged, vec![item(1, "new"), item(2, "")]);
    }

    #[test]
    fn test_replies_sorted_oldest_first() {
        let merged = merge_replies(vec![reply(1, 10), reply(2, 30)], vec![reply(3, 20), reply(1, 10)]);
        let ids: Vec<_> = merged.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![Uuid::from_u128(1), Uuid::from_u128(3), Uuid::from_u128(2)]
        );
    }

    proptest! {
        #[test]
        fn prop_merge_never_duplicates(
            existing in prop::collection::vec(0u128..20, 0..20),
            incoming in prop::collection::vec(0u128..20, 0..20),
        ) {
            let to_items = |ids: &[u128]| ids.iter().map(|&id| item(id, "")).collect::<Vec<_>>();
            let merged = merge_by_id(to_items(&existing), to_items(&incoming));

            let ids: Vec<_> = merged.iter().map(|i| i.id).collect();
            let unique: HashSet<_> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len());

            let expected: HashSet<_> = existing.iter().chain(&incoming).map(|&id| Uuid::from_u128(id)).collect();
            prop_assert_eq!(unique.len(), expected.len());

            // First-seen order
            let mut seen = HashSet::new();
            let first_order: Vec<_> = existing
                .iter()
                .chain(&incoming)
                .map(|&id| Uuid::from_u128(id))
                .filter(|id| seen.insert(*id))
                .collect();
            prop_assert_eq!(ids, first_order);
        }
    }
}
