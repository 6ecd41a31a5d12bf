use std::sync::{Arc, Barrier};
use std::thread;

use cvr_artifacts::FsArtifactStore;
use cvr_core::{Decision, EvidenceRef, IncidentId, Location, ReportSource, Status, WorkerId};
use cvr_detect::Detection;
use cvr_engine::{AutoReportBridge, Dispatcher, Engine, NewReport, ReporterContext, VerificationGate};
use cvr_storage::MemoryStore;
use tempfile::TempDir;

fn test_engine() -> (Engine, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(
        Box::new(MemoryStore::new()),
        Box::new(FsArtifactStore::new(dir.path().to_path_buf())),
    );
    (engine, dir)
}

fn location() -> Location {
    Location {
        lat: 12.9716,
        lng: 77.5946,
        address: "MG Road, Bengaluru".into(),
    }
}

fn citizen_report(category: &str) -> NewReport {
    NewReport {
        category: category.into(),
        location: location(),
        image: b"jpeg-bytes".to_vec(),
        ext: "jpg".into(),
        source: ReportSource::Citizen {
            reporter: "citizen_01".into(),
        },
    }
}

fn det(class: &str, confidence: f64) -> Detection {
    Detection {
        class: class.into(),
        confidence,
    }
}

#[test]
fn created_incident_is_pending_unassigned_without_resolved_evidence() {
    let (engine, _dir) = test_engine();
    let incident = engine.submit_report(citizen_report("Pothole")).unwrap();
    assert_eq!(incident.status(), Status::Pending);
    assert!(incident.assignee().is_none());
    assert!(incident.state.resolved().is_none());
    assert!(engine.artifacts.exists(&incident.original));
}

#[test]
fn submit_report_validates_inputs() {
    let (engine, _dir) = test_engine();

    let mut no_category = citizen_report("");
    no_category.category = "   ".into();
    assert!(engine
        .submit_report(no_category)
        .unwrap_err()
        .is_invalid_input());

    let mut no_address = citizen_report("Pothole");
    no_address.location.address = "".into();
    assert!(engine
        .submit_report(no_address)
        .unwrap_err()
        .is_invalid_input());

    let mut no_image = citizen_report("Pothole");
    no_image.image.clear();
    assert!(engine
        .submit_report(no_image)
        .unwrap_err()
        .is_invalid_input());
}

#[test]
fn create_from_ref_requires_resolvable_evidence() {
    let (engine, _dir) = test_engine();
    let err = engine
        .create_from_ref(
            "Pothole".into(),
            location(),
            EvidenceRef::from_str("missing.jpg"),
            ReportSource::Citizen {
                reporter: "citizen_01".into(),
            },
        )
        .unwrap_err();
    assert!(err.is_invalid_input());

    let stored = engine
        .artifacts
        .store_original("Pothole", "jpg", b"bytes")
        .unwrap();
    let incident = engine
        .create_from_ref(
            "Pothole".into(),
            location(),
            stored,
            ReportSource::Citizen {
                reporter: "citizen_01".into(),
            },
        )
        .unwrap();
    assert_eq!(incident.status(), Status::Pending);
}

#[test]
fn assign_unknown_incident_is_not_found() {
    let (engine, _dir) = test_engine();
    let err = engine
        .assign(IncidentId(404), WorkerId::from_str("worker_07"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn second_assign_conflicts_and_keeps_first_assignee() {
    let (engine, _dir) = test_engine();
    let incident = engine.submit_report(citizen_report("Pothole")).unwrap();
    engine
        .assign(incident.id, WorkerId::from_str("worker_07"))
        .unwrap();

    let err = engine
        .assign(incident.id, WorkerId::from_str("worker_08"))
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(
        engine.get(incident.id).unwrap().assignee().unwrap().as_str(),
        "worker_07"
    );
}

#[test]
fn complete_by_non_assignee_conflicts() {
    let (engine, _dir) = test_engine();
    let incident = engine.submit_report(citizen_report("Pothole")).unwrap();
    engine
        .assign(incident.id, WorkerId::from_str("worker_07"))
        .unwrap();

    let err = engine
        .complete(incident.id, WorkerId::from_str("worker_08"), b"proof", "jpg")
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(engine.get(incident.id).unwrap().status(), Status::Pending);
}

#[test]
fn approve_is_terminal() {
    let (engine, _dir) = test_engine();
    let worker = WorkerId::from_str("worker_07");
    let incident = engine.submit_report(citizen_report("Pothole")).unwrap();
    engine.assign(incident.id, worker.clone()).unwrap();
    engine
        .complete(incident.id, worker.clone(), b"proof", "jpg")
        .unwrap();
    let verified = engine
        .verify(incident.id, Decision::Approve, Some("clean fix".into()))
        .unwrap();
    assert_eq!(verified.status(), Status::Verified);
    assert_eq!(verified.state.verification_note(), Some("clean fix"));

    assert!(engine
        .assign(incident.id, WorkerId::from_str("worker_08"))
        .unwrap_err()
        .is_conflict());
    assert!(engine
        .complete(incident.id, worker, b"proof2", "jpg")
        .unwrap_err()
        .is_conflict());
    assert!(engine
        .verify(incident.id, Decision::Approve, None)
        .unwrap_err()
        .is_conflict());
}

#[test]
fn end_to_end_reject_reopens_for_redispatch() {
    let (engine, _dir) = test_engine();
    let worker = WorkerId::from_str("worker_07");

    let incident = engine.submit_report(citizen_report("Pothole")).unwrap();
    assert_eq!(incident.id.value(), 1);

    engine.assign(incident.id, worker.clone()).unwrap();
    let completed = engine
        .complete(incident.id, worker, b"resolved-bytes", "jpg")
        .unwrap();
    assert_eq!(completed.status(), Status::Completed);
    let resolved = completed.state.resolved().unwrap().clone();
    assert!(resolved.as_str().starts_with("resolved_1_"));
    assert!(engine.artifacts.exists(&resolved));

    let reopened = engine.verify(incident.id, Decision::Reject, None).unwrap();
    assert_eq!(reopened.status(), Status::Pending);
    assert!(reopened.assignee().is_none());
    assert!(reopened.state.resolved().is_none());

    // back in the pool: a fresh assign succeeds
    engine
        .assign(incident.id, WorkerId::from_str("worker_09"))
        .unwrap();
}

#[test]
fn concurrent_assigns_admit_exactly_one_winner() {
    let (engine, _dir) = test_engine();
    let engine = Arc::new(engine);
    let incident = engine.submit_report(citizen_report("Pothole")).unwrap();

    const N: usize = 16;
    let barrier = Arc::new(Barrier::new(N));
    let mut handles = vec![];
    for n in 0..N {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        let id = incident.id;
        handles.push(thread::spawn(move || {
            barrier.wait();
            engine.assign(id, WorkerId::from_str(format!("worker_{n:02}")))
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => wins += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(conflicts, N - 1);
    assert!(engine.get(incident.id).unwrap().assignee().is_some());
}

#[test]
fn dispatcher_only_offers_unassigned_pending() {
    let (engine, _dir) = test_engine();
    let dispatcher = Dispatcher::new(&engine);
    let worker = WorkerId::from_str("worker_07");

    let a = engine.submit_report(citizen_report("Pothole")).unwrap();
    let b = engine
        .submit_report(citizen_report("Garbage Accumulation"))
        .unwrap();

    dispatcher.dispatch(a.id, worker.clone()).unwrap();

    // a is assigned now, so the pool contains only b
    let pool = dispatcher.unassigned_pool().unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].id, b.id);

    // redispatching a conflicts
    assert!(dispatcher
        .dispatch(a.id, WorkerId::from_str("worker_08"))
        .unwrap_err()
        .is_conflict());

    // completed incidents are not dispatchable either
    engine.complete(a.id, worker, b"proof", "jpg").unwrap();
    assert!(dispatcher
        .dispatch(a.id, WorkerId::from_str("worker_08"))
        .unwrap_err()
        .is_conflict());
}

#[test]
fn gate_reviews_only_completed_incidents() {
    let (engine, _dir) = test_engine();
    let gate = VerificationGate::new(&engine);
    let worker = WorkerId::from_str("worker_07");

    let incident = engine.submit_report(citizen_report("Pothole")).unwrap();
    assert!(gate
        .review(incident.id, Decision::Approve, None)
        .unwrap_err()
        .is_conflict());
    assert!(gate.queue().unwrap().is_empty());

    engine.assign(incident.id, worker.clone()).unwrap();
    engine.complete(incident.id, worker, b"proof", "jpg").unwrap();

    let queue = gate.queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, incident.id);

    let verified = gate
        .review(incident.id, Decision::Approve, Some("ok".into()))
        .unwrap();
    assert_eq!(verified.status(), Status::Verified);
    assert!(gate
        .review(incident.id, Decision::Reject, None)
        .unwrap_err()
        .is_conflict());
}

#[test]
fn worker_tasks_lists_only_pending_assignments_for_that_worker() {
    let (engine, _dir) = test_engine();
    let w7 = WorkerId::from_str("worker_07");
    let w8 = WorkerId::from_str("worker_08");

    let a = engine.submit_report(citizen_report("Pothole")).unwrap();
    let b = engine
        .submit_report(citizen_report("Garbage Accumulation"))
        .unwrap();
    let c = engine.submit_report(citizen_report("Broken Streetlight")).unwrap();

    engine.assign(a.id, w7.clone()).unwrap();
    engine.assign(b.id, w8).unwrap();
    engine.assign(c.id, w7.clone()).unwrap();
    engine.complete(c.id, w7.clone(), b"proof", "jpg").unwrap();

    let tasks = engine.worker_tasks(&w7).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, a.id);
}

#[test]
fn bridge_reports_top_confidence_class() {
    let (engine, _dir) = test_engine();
    let bridge = AutoReportBridge::new(&engine);
    let ctx = ReporterContext {
        node: "cam_north_01".into(),
        location: location(),
    };

    let detections = [det("pothole", 0.62), det("garbage", 0.91)];
    let incident = bridge
        .ingest(b"frame-bytes", "jpg", &detections, &ctx)
        .unwrap()
        .expect("incident created");
    assert_eq!(incident.category, "garbage");
    assert_eq!(incident.status(), Status::Pending);
    assert_eq!(
        incident.source,
        ReportSource::Camera {
            node: "cam_north_01".into()
        }
    );
}

#[test]
fn bridge_empty_detections_create_nothing() {
    let (engine, _dir) = test_engine();
    let bridge = AutoReportBridge::new(&engine);
    let ctx = ReporterContext {
        node: "cam_north_01".into(),
        location: location(),
    };
    let outcome = bridge.ingest(b"frame-bytes", "jpg", &[], &ctx).unwrap();
    assert!(outcome.is_none());
    assert!(engine.list(None).unwrap().is_empty());
}

#[test]
fn bridge_honors_configured_confidence_floor() {
    let (engine, _dir) = test_engine();
    let bridge = AutoReportBridge::with_min_confidence(&engine, Some(0.7));
    let ctx = ReporterContext {
        node: "cam_north_01".into(),
        location: location(),
    };

    let low = [det("pothole", 0.62)];
    assert!(bridge.ingest(b"frame", "jpg", &low, &ctx).unwrap().is_none());

    let high = [det("pothole", 0.85)];
    let incident = bridge.ingest(b"frame", "jpg", &high, &ctx).unwrap().unwrap();
    assert_eq!(incident.category, "pothole");
}

#[test]
fn stats_count_by_category_and_status() {
    let (engine, _dir) = test_engine();
    let worker = WorkerId::from_str("worker_07");

    let a = engine.submit_report(citizen_report("Pothole")).unwrap();
    engine.submit_report(citizen_report("Pothole")).unwrap();
    engine
        .submit_report(citizen_report("Garbage Accumulation"))
        .unwrap();
    engine.assign(a.id, worker.clone()).unwrap();
    engine.complete(a.id, worker, b"proof", "jpg").unwrap();

    let stats = engine.stats().unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_category["Pothole"], 2);
    assert_eq!(stats.by_category["Garbage Accumulation"], 1);
    assert_eq!(stats.by_status["pending"], 2);
    assert_eq!(stats.by_status["completed"], 1);
}

#[test]
fn resolved_evidence_invariant_holds_after_every_transition() {
    let (engine, _dir) = test_engine();
    let worker = WorkerId::from_str("worker_07");
    let incident = engine.submit_report(citizen_report("Pothole")).unwrap();

    let check = |engine: &Engine| {
        let current = engine.get(incident.id).unwrap();
        let has_resolved = current.state.resolved().is_some();
        let expect = matches!(current.status(), Status::Completed | Status::Verified);
        assert_eq!(has_resolved, expect, "at status {:?}", current.status());
    };

    check(&engine);
    engine.assign(incident.id, worker.clone()).unwrap();
    check(&engine);
    engine
        .complete(incident.id, worker.clone(), b"proof", "jpg")
        .unwrap();
    check(&engine);
    engine.verify(incident.id, Decision::Reject, None).unwrap();
    check(&engine);
    engine.assign(incident.id, worker.clone()).unwrap();
    check(&engine);
    engine.complete(incident.id, worker, b"proof2", "jpg").unwrap();
    check(&engine);
    engine.verify(incident.id, Decision::Approve, None).unwrap();
    check(&engine);
}
