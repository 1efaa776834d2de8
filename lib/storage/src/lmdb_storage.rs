// LMDB-backed persistence of biometric templates and emergency identifiers
use anyhow::{Context, Result};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use vitalid_core::{
    BiometricTemplate, EmergencyId, Embedding, Error, FingerprintHash, SetOutcome, SubjectId,
    SubjectStore, TemplateStore, TemplateUpdate,
};

const DB_TEMPLATES: &str = "templates";
const DB_HASH_OWNERS: &str = "hash_owners";
const DB_EMERGENCY_BY_SUBJECT: &str = "emergency_by_subject";
const DB_SUBJECT_BY_EMERGENCY: &str = "subject_by_emergency";

const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024; // 1GB

// hash owner keys are `{hash}\0{subject}` so one hash maps to a key prefix;
// hashes containing the separator are refused on write
const KEY_SEPARATOR: char = '\0';

#[derive(Debug, Serialize, Deserialize)]
struct StoredTemplate {
    embedding: Option<Vec<f32>>,
    fingerprint_hash: Option<String>,
}

impl StoredTemplate {
    fn into_template(self, subject: SubjectId) -> BiometricTemplate {
        BiometricTemplate {
            subject_id: subject,
            embedding: self.embedding.map(Embedding::new),
            fingerprint_hash: self.fingerprint_hash.map(FingerprintHash::new),
        }
    }
}

/// Persistent [`TemplateStore`] and [`SubjectStore`].
///
/// LMDB allows a single writer at a time, so the uniqueness check and the
/// write of an emergency identifier share one write transaction and are
/// atomic with respect to every other writer, in this process or another.
pub struct LmdbStore {
    env: Arc<Env>,
    templates_db: Database<Str, Bytes>,
    hash_owners_db: Database<Str, Bytes>,
    emergency_by_subject_db: Database<Str, Str>,
    subject_by_emergency_db: Database<Str, Str>,
}

impl LmdbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size<P: AsRef<Path>>(path: P, map_size: usize) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(4)
                .open(path.as_ref())
                .with_context(|| format!("opening LMDB environment at {:?}", path.as_ref()))?
        });

        let mut wtxn = env.write_txn()?;
        let templates_db = env.create_database(&mut wtxn, Some(DB_TEMPLATES))?;
        let hash_owners_db = env.create_database(&mut wtxn, Some(DB_HASH_OWNERS))?;
        let emergency_by_subject_db = env.create_database(&mut wtxn, Some(DB_EMERGENCY_BY_SUBJECT))?;
        let subject_by_emergency_db = env.create_database(&mut wtxn, Some(DB_SUBJECT_BY_EMERGENCY))?;
        wtxn.commit()?;

        tracing::info!(path = ?path.as_ref(), "LMDB store opened");

        Ok(Self {
            env,
            templates_db,
            hash_owners_db,
            emergency_by_subject_db,
            subject_by_emergency_db,
        })
    }

    fn hash_owner_key(hash: &str, subject: &str) -> String {
        format!("{}{}{}", hash, KEY_SEPARATOR, subject)
    }

    fn load_embeddings(&self) -> Result<Vec<(SubjectId, Embedding)>> {
        let rtxn = self.env.read_txn()?;
        let mut embeddings = Vec::new();
        for result in self.templates_db.iter(&rtxn)? {
            let (subject, data) = result?;
            let stored: StoredTemplate = bincode::deserialize(data)
                .with_context(|| format!("decoding template of subject {}", subject))?;
            if let Some(values) = stored.embedding {
                embeddings.push((SubjectId::from(subject), Embedding::new(values)));
            }
        }
        Ok(embeddings)
    }

    fn load_hash_owners(&self, hash: &str) -> Result<Vec<SubjectId>> {
        let rtxn = self.env.read_txn()?;
        let prefix = format!("{}{}", hash, KEY_SEPARATOR);
        let mut owners = Vec::new();
        for result in self.hash_owners_db.prefix_iter(&rtxn, prefix.as_str())? {
            let (key, _) = result?;
            owners.push(SubjectId::from(&key[prefix.len()..]));
        }
        Ok(owners)
    }

    fn write_template(&self, subject: &SubjectId, update: TemplateUpdate) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;

        let existing: Option<StoredTemplate> = match self.templates_db.get(&wtxn, subject.as_str())? {
            Some(data) => Some(bincode::deserialize(data)?),
            None => None,
        };
        let mut stored = existing.unwrap_or(StoredTemplate {
            embedding: None,
            fingerprint_hash: None,
        });

        if let Some(embedding) = update.embedding {
            stored.embedding = Some(embedding.into_inner());
        }
        if let Some(hash) = update.fingerprint_hash {
            if let Some(old) = stored.fingerprint_hash.as_deref() {
                let old_key = Self::hash_owner_key(old, subject.as_str());
                self.hash_owners_db.delete(&mut wtxn, &old_key)?;
            }
            let new_key = Self::hash_owner_key(hash.as_str(), subject.as_str());
            self.hash_owners_db.put(&mut wtxn, &new_key, &[])?;
            stored.fingerprint_hash = Some(hash.as_str().to_string());
        }

        let data = bincode::serialize(&stored)?;
        self.templates_db.put(&mut wtxn, subject.as_str(), &data)?;
        wtxn.commit()?;
        Ok(())
    }

    fn read_template(&self, subject: &SubjectId) -> Result<Option<BiometricTemplate>> {
        let rtxn = self.env.read_txn()?;
        match self.templates_db.get(&rtxn, subject.as_str())? {
            Some(data) => {
                let stored: StoredTemplate = bincode::deserialize(data)?;
                Ok(Some(stored.into_template(subject.clone())))
            }
            None => Ok(None),
        }
    }

    fn read_emergency_id(&self, subject: &SubjectId) -> Result<Option<EmergencyId>> {
        let rtxn = self.env.read_txn()?;
        Ok(self
            .emergency_by_subject_db
            .get(&rtxn, subject.as_str())?
            .map(EmergencyId::new))
    }

    fn read_subject(&self, id: &EmergencyId) -> Result<Option<SubjectId>> {
        let rtxn = self.env.read_txn()?;
        Ok(self
            .subject_by_emergency_db
            .get(&rtxn, id.as_str())?
            .map(SubjectId::from))
    }

    fn write_emergency_id(&self, subject: &SubjectId, candidate: &EmergencyId) -> Result<SetOutcome> {
        let mut wtxn = self.env.write_txn()?;

        let taken = self.subject_by_emergency_db.get(&wtxn, candidate.as_str())?.is_some();
        let assigned = self.emergency_by_subject_db.get(&wtxn, subject.as_str())?.is_some();
        if taken || assigned {
            wtxn.abort();
            return Ok(SetOutcome::UniquenessViolation);
        }

        self.emergency_by_subject_db
            .put(&mut wtxn, subject.as_str(), candidate.as_str())?;
        self.subject_by_emergency_db
            .put(&mut wtxn, candidate.as_str(), subject.as_str())?;
        wtxn.commit()?;
        Ok(SetOutcome::Committed)
    }
}

impl TemplateStore for LmdbStore {
    fn all_embeddings(&self) -> vitalid_core::Result<Vec<(SubjectId, Embedding)>> {
        self.load_embeddings()
            .map_err(|e| Error::storage("all_embeddings", e))
    }

    fn subject_by_hash(&self, hash: &FingerprintHash) -> vitalid_core::Result<Option<SubjectId>> {
        if hash.as_str().contains(KEY_SEPARATOR) {
            return Ok(None);
        }
        let mut owners = self
            .load_hash_owners(hash.as_str())
            .map_err(|e| Error::storage("subject_by_hash", e))?;
        match owners.len() {
            0 => Ok(None),
            1 => Ok(owners.pop()),
            n => Err(Error::StoreIntegrityViolation { owners: n }),
        }
    }

    fn upsert(&self, subject: &SubjectId, update: TemplateUpdate) -> vitalid_core::Result<()> {
        if let Some(hash) = &update.fingerprint_hash {
            if hash.as_str().contains(KEY_SEPARATOR) {
                return Err(Error::InvalidInput(
                    "fingerprint hash contains a NUL character".to_string(),
                ));
            }
        }
        self.write_template(subject, update)
            .map_err(|e| Error::storage("upsert", e).with_context(subject, None))
    }

    fn template(&self, subject: &SubjectId) -> vitalid_core::Result<Option<BiometricTemplate>> {
        self.read_template(subject)
            .map_err(|e| Error::storage("template", e).with_context(subject, None))
    }
}

impl SubjectStore for LmdbStore {
    fn emergency_id(&self, subject: &SubjectId) -> vitalid_core::Result<Option<EmergencyId>> {
        self.read_emergency_id(subject)
            .map_err(|e| Error::storage("emergency_id", e).with_context(subject, None))
    }

    fn try_set_emergency_id(
        &self,
        subject: &SubjectId,
        candidate: &EmergencyId,
    ) -> vitalid_core::Result<SetOutcome> {
        self.write_emergency_id(subject, candidate)
            .map_err(|e| Error::storage("try_set_emergency_id", e).with_context(subject, None))
    }

    fn subject_by_emergency_id(&self, id: &EmergencyId) -> vitalid_core::Result<Option<SubjectId>> {
        self.read_subject(id)
            .map_err(|e| Error::storage("subject_by_emergency_id", e))
    }
}
