use crate::{
    BiometricTemplate, EmergencyId, Embedding, Error, FingerprintHash, Result, SetOutcome,
    SubjectId, SubjectStore, TemplateStore, TemplateUpdate,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// In-memory implementation of both store traits.
///
/// Data is lost on restart. Suitable for tests, benchmarks and ephemeral
/// deployments. All identifier writes go through one write lock, which is
/// what makes the uniqueness constraint atomic.
pub struct MemoryStore {
    templates: RwLock<BTreeMap<SubjectId, BiometricTemplate>>,
    emergency: RwLock<EmergencyIndex>,
}

#[derive(Default)]
struct EmergencyIndex {
    by_subject: HashMap<SubjectId, EmergencyId>,
    by_id: HashMap<EmergencyId, SubjectId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(BTreeMap::new()),
            emergency: RwLock::new(EmergencyIndex::default()),
        }
    }

    pub fn count(&self) -> usize {
        self.templates.read().len()
    }

    /// Number of committed emergency identifiers
    pub fn emergency_id_count(&self) -> usize {
        self.emergency.read().by_id.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore for MemoryStore {
    fn all_embeddings(&self) -> Result<Vec<(SubjectId, Embedding)>> {
        let templates = self.templates.read();
        Ok(templates
            .values()
            .filter_map(|t| t.embedding.clone().map(|e| (t.subject_id.clone(), e)))
            .collect())
    }

    fn subject_by_hash(&self, hash: &FingerprintHash) -> Result<Option<SubjectId>> {
        let templates = self.templates.read();
        let owners: Vec<&SubjectId> = templates
            .values()
            .filter(|t| t.fingerprint_hash.as_ref() == Some(hash))
            .map(|t| &t.subject_id)
            .collect();

        match owners.as_slice() {
            [] => Ok(None),
            [owner] => Ok(Some((*owner).clone())),
            _ => Err(Error::StoreIntegrityViolation { owners: owners.len() }),
        }
    }

    fn upsert(&self, subject: &SubjectId, update: TemplateUpdate) -> Result<()> {
        let mut templates = self.templates.write();
        templates
            .entry(subject.clone())
            .or_insert_with(|| BiometricTemplate::new(subject.clone()))
            .apply(update);
        Ok(())
    }

    fn template(&self, subject: &SubjectId) -> Result<Option<BiometricTemplate>> {
        Ok(self.templates.read().get(subject).cloned())
    }
}

impl SubjectStore for MemoryStore {
    fn emergency_id(&self, subject: &SubjectId) -> Result<Option<EmergencyId>> {
        Ok(self.emergency.read().by_subject.get(subject).cloned())
    }

    fn try_set_emergency_id(&self, subject: &SubjectId, candidate: &EmergencyId) -> Result<SetOutcome> {
        let mut index = self.emergency.write();
        if index.by_id.contains_key(candidate) || index.by_subject.contains_key(subject) {
            return Ok(SetOutcome::UniquenessViolation);
        }
        index.by_subject.insert(subject.clone(), candidate.clone());
        index.by_id.insert(candidate.clone(), subject.clone());
        Ok(SetOutcome::Committed)
    }

    fn subject_by_emergency_id(&self, id: &EmergencyId) -> Result<Option<SubjectId>> {
        Ok(self.emergency.read().by_id.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeddings_are_ordered_by_subject() {
        let store = MemoryStore::new();
        for id in ["c", "a", "b"] {
            store
                .upsert(
                    &SubjectId::from(id),
                    TemplateUpdate::default().with_embedding(Embedding::new(vec![1.0])),
                )
                .unwrap();
        }
        store
            .upsert(
                &SubjectId::from("0-no-face"),
                TemplateUpdate::default().with_fingerprint_hash(FingerprintHash::new("ff")),
            )
            .unwrap();

        let ids: Vec<String> = store
            .all_embeddings()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.count(), 4);
    }

    #[test]
    fn test_duplicate_hash_is_integrity_violation() {
        let store = MemoryStore::new();
        let hash = FingerprintHash::new("abc123");
        for id in ["s1", "s2"] {
            store
                .upsert(&SubjectId::from(id), TemplateUpdate::default().with_fingerprint_hash(hash.clone()))
                .unwrap();
        }
        assert!(matches!(
            store.subject_by_hash(&hash),
            Err(Error::StoreIntegrityViolation { owners: 2 })
        ));
    }

    #[test]
    fn test_try_set_enforces_uniqueness_both_ways() {
        let store = MemoryStore::new();
        let s1 = SubjectId::from("s1");
        let s2 = SubjectId::from("s2");
        let id = EmergencyId::new("e-1");

        assert_eq!(store.try_set_emergency_id(&s1, &id).unwrap(), SetOutcome::Committed);
        assert_eq!(store.try_set_emergency_id(&s2, &id).unwrap(), SetOutcome::UniquenessViolation);
        assert_eq!(
            store.try_set_emergency_id(&s1, &EmergencyId::new("e-2")).unwrap(),
            SetOutcome::UniquenessViolation
        );
        assert_eq!(store.subject_by_emergency_id(&id).unwrap(), Some(s1.clone()));
        assert_eq!(store.emergency_id(&s1).unwrap(), Some(id));
        assert_eq!(store.emergency_id(&s2).unwrap(), None);
        assert_eq!(store.emergency_id_count(), 1);
    }
}
