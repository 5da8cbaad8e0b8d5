//! Owner-field handling for import (spec §4.7): apply the caller's user
//! mapping first, then strip whatever remains unmapped when requested.

use model::{Record, Value};
use std::collections::HashMap;
use uuid::Uuid;

const OWNER_FIELDS: &[&str] = &[
    "ownerid",
    "createdby",
    "modifiedby",
    "createdonbehalfby",
    "modifiedonbehalfby",
];

/// Rewrites any owner/audit lookup whose GUID appears in `user_mapping`,
/// then removes the field entirely if `strip_owner_fields` is set and it
/// still refers to a source-side user or team absent in the target.
pub fn apply_owner_policy(record: &mut Record, user_mapping: &HashMap<Uuid, Uuid>, strip_owner_fields: bool) {
    for field in OWNER_FIELDS {
        let Some(value) = record.get(*field).cloned() else {
            continue;
        };
        let Value::Reference(reference) = value else {
            continue;
        };

        if let Some(&mapped) = user_mapping.get(&reference.id) {
            let mut mapped_ref = reference.clone();
            mapped_ref.id = mapped;
            record.set(*field, Value::Reference(mapped_ref));
        } else if strip_owner_fields {
            record.remove(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::EntityReference;
    use uuid::Uuid;

    fn record_with_owner(owner: Uuid) -> Record {
        Record::new("account", Uuid::new_v4()).with_field(
            "ownerid",
            Value::Reference(EntityReference::new("systemuser", owner)),
        )
    }

    #[test]
    fn maps_owner_when_present_in_mapping() {
        let source_owner = Uuid::from_u128(1);
        let target_owner = Uuid::from_u128(2);
        let mut record = record_with_owner(source_owner);
        let mut mapping = HashMap::new();
        mapping.insert(source_owner, target_owner);

        apply_owner_policy(&mut record, &mapping, false);

        let Some(Value::Reference(reference)) = record.get("ownerid") else {
            panic!("expected reference");
        };
        assert_eq!(reference.id, target_owner);
    }

    #[test]
    fn strips_unmapped_owner_when_requested() {
        let mut record = record_with_owner(Uuid::from_u128(1));
        apply_owner_policy(&mut record, &HashMap::new(), true);
        assert!(!record.contains("ownerid"));
    }

    #[test]
    fn leaves_unmapped_owner_when_not_stripping() {
        let mut record = record_with_owner(Uuid::from_u128(1));
        apply_owner_policy(&mut record, &HashMap::new(), false);
        assert!(record.contains("ownerid"));
    }
}
