// Integration tests for VitalID
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use vitalid_core::{
    BiometricSample, Embedding, EmergencyId, Enroller, EnrollmentRequest, FingerprintHash,
    IdentifierAllocator, IdentityResolver, LinearScanMatcher, MemoryStore, Modality,
    ResolverConfig, Result, RetryPolicy, SetOutcome, SubjectId, SubjectStore,
};
use vitalid_storage::LmdbStore;

/// Holds the first two "does this subject have an id yet?" reads at a
/// barrier so both racers observe an empty slot before either allocates.
struct RacingStore<S> {
    inner: Arc<S>,
    barrier: Barrier,
    initial_reads: AtomicUsize,
}

impl<S: SubjectStore> RacingStore<S> {
    fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
            initial_reads: AtomicUsize::new(0),
        }
    }
}

impl<S: SubjectStore> SubjectStore for RacingStore<S> {
    fn emergency_id(&self, subject: &SubjectId) -> Result<Option<EmergencyId>> {
        let current = self.inner.emergency_id(subject)?;
        if self.initial_reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait();
        }
        Ok(current)
    }

    fn try_set_emergency_id(&self, subject: &SubjectId, candidate: &EmergencyId) -> Result<SetOutcome> {
        self.inner.try_set_emergency_id(subject, candidate)
    }

    fn subject_by_emergency_id(&self, id: &EmergencyId) -> Result<Option<SubjectId>> {
        self.inner.subject_by_emergency_id(id)
    }
}

fn race_allocation<S: SubjectStore + 'static>(inner: Arc<S>) -> (EmergencyId, EmergencyId) {
    let store = Arc::new(RacingStore::new(inner.clone()));
    let allocator = Arc::new(IdentifierAllocator::new(store, RetryPolicy::default()).unwrap());
    let subject = SubjectId::from("racer");

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let allocator = allocator.clone();
            let subject = subject.clone();
            thread::spawn(move || allocator.ensure_identifier(&subject).unwrap())
        })
        .collect();

    let ids: Vec<EmergencyId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    (ids[0].clone(), ids[1].clone())
}

#[test]
fn test_concurrent_allocation_converges_in_memory() {
    let store = Arc::new(MemoryStore::new());
    let (a, b) = race_allocation(store.clone());

    assert_eq!(a, b);
    assert_eq!(store.emergency_id_count(), 1);
    assert_eq!(store.emergency_id(&SubjectId::from("racer")).unwrap(), Some(a.clone()));
    assert_eq!(store.subject_by_emergency_id(&a).unwrap(), Some(SubjectId::from("racer")));
}

#[test]
fn test_concurrent_allocation_converges_on_lmdb() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LmdbStore::open_with_map_size(temp_dir.path(), 16 * 1024 * 1024).unwrap());
    let (a, b) = race_allocation(store.clone());

    assert_eq!(a, b);
    assert_eq!(store.emergency_id(&SubjectId::from("racer")).unwrap(), Some(a));
}

#[test]
fn test_many_subjects_get_distinct_identifiers() {
    let store = Arc::new(MemoryStore::new());
    let allocator = Arc::new(IdentifierAllocator::new(store.clone(), RetryPolicy::default()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let allocator = allocator.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        let subject = SubjectId::new(format!("subject-{}-{}", t, i));
                        allocator.ensure_identifier(&subject).unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<EmergencyId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
    assert_eq!(store.emergency_id_count(), 200);
}

#[test]
fn test_end_to_end_on_lmdb() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LmdbStore::open_with_map_size(temp_dir.path(), 16 * 1024 * 1024).unwrap());

    let enroller = Enroller::new(store.clone());
    enroller
        .enroll(
            &SubjectId::from("alice"),
            EnrollmentRequest {
                embedding: Some(vec![0.9, 0.1, 0.0, 0.0]),
                fingerprint_hash: Some("A1B2C3".to_string()),
            },
        )
        .unwrap();
    enroller
        .enroll(
            &SubjectId::from("bob"),
            EnrollmentRequest {
                embedding: Some(vec![0.0, 0.0, 1.0, 0.2]),
                fingerprint_hash: None,
            },
        )
        .unwrap();
    // a template from a different embedding model
    enroller
        .enroll(
            &SubjectId::from("carol"),
            EnrollmentRequest {
                embedding: Some(vec![0.9, 0.1]),
                fingerprint_hash: None,
            },
        )
        .unwrap();

    let resolver =
        IdentityResolver::new(store.clone(), Arc::new(LinearScanMatcher), ResolverConfig::default())
            .unwrap();

    let by_finger = resolver
        .resolve_by_fingerprint(&FingerprintHash::new("a1b2c3"))
        .unwrap();
    assert_eq!(by_finger.subject_id(), Some(&SubjectId::from("alice")));
    assert_eq!(by_finger.modality(), Modality::Exact);

    let by_face = resolver
        .resolve(&BiometricSample::face(Embedding::new(vec![0.0, 0.05, 0.98, 0.2])))
        .unwrap();
    assert_eq!(by_face.subject_id(), Some(&SubjectId::from("bob")));
    assert!(by_face.similarity().unwrap() >= 0.9);

    let miss = resolver
        .resolve(&BiometricSample {
            fingerprint_hash: Some(FingerprintHash::new("deadbeef")),
            embedding: Some(Embedding::new(vec![0.9, 0.1, 0.0, 0.0])),
        })
        .unwrap();
    assert!(!miss.is_match());

    let allocator = IdentifierAllocator::new(store.clone(), RetryPolicy::default()).unwrap();
    let alice = by_finger.subject_id().unwrap();
    let emergency_id = allocator.ensure_identifier(alice).unwrap();
    assert_eq!(allocator.ensure_identifier(alice).unwrap(), emergency_id);
    assert_eq!(allocator.lookup(&emergency_id).unwrap(), Some(alice.clone()));
}

#[test]
fn test_large_population_scan() {
    use rand::Rng;

    let store = Arc::new(MemoryStore::new());
    let enroller = Enroller::new(store.clone());
    let mut rng = rand::rng();
    let dim = 128;

    let mut target = Vec::new();
    for i in 0..2000 {
        let values: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect();
        if i == 1234 {
            target = values.clone();
        }
        enroller
            .enroll(
                &SubjectId::new(format!("subject-{:05}", i)),
                EnrollmentRequest {
                    embedding: Some(values),
                    fingerprint_hash: None,
                },
            )
            .unwrap();
    }

    let resolver =
        IdentityResolver::new(store, Arc::new(LinearScanMatcher), ResolverConfig::default()).unwrap();
    let result = resolver.resolve_by_face(&Embedding::new(target)).unwrap();
    assert_eq!(result.subject_id(), Some(&SubjectId::from("subject-01234")));
    assert!((result.similarity().unwrap() - 1.0).abs() < 1e-5);
}
