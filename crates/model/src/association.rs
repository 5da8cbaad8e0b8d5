use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// `(relationshipName, sourceEntity, sourceId, targetEntity,
/// targetIdField, targetIds[])`. Set-valued per `(relationshipName,
/// sourceId)` — constructing with duplicate target ids silently dedupes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManyToManyAssociation {
    pub relationship_name: String,
    pub source_entity: String,
    pub source_id: Uuid,
    pub target_entity: String,
    pub target_id_field: String,
    target_ids: BTreeSet<Uuid>,
}

impl ManyToManyAssociation {
    pub fn new(
        relationship_name: impl Into<String>,
        source_entity: impl Into<String>,
        source_id: Uuid,
        target_entity: impl Into<String>,
        target_id_field: impl Into<String>,
    ) -> Self {
        Self {
            relationship_name: relationship_name.into(),
            source_entity: source_entity.into(),
            source_id,
            target_entity: target_entity.into(),
            target_id_field: target_id_field.into(),
            target_ids: BTreeSet::new(),
        }
    }

    pub fn add_target(&mut self, id: Uuid) {
        self.target_ids.insert(id);
    }

    pub fn target_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.target_ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.target_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_a_set() {
        let mut a = ManyToManyAssociation::new(
            "account_contacts",
            "account",
            Uuid::nil(),
            "contact",
            "contactid",
        );
        let id = Uuid::from_u128(1);
        a.add_target(id);
        a.add_target(id);
        assert_eq!(a.len(), 1);
    }
}
