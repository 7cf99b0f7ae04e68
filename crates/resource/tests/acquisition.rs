//! The acquisition protocol: pre-acquire veto, failures, owners.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use warden_eventbus::testing::Recorder;
use warden_eventbus::{FnHandler, Matcher, Source, TypedHandler};
use warden_resource::events;
use warden_resource::prelude::*;

use common::{Journal, Probe, ProbeArgs, TrackedFile, record_events, register_probes};

#[test]
fn pre_acquire_veto_acquires_nothing() {
    let registry = common::registry();
    let (probe, journal) = register_probes(&registry);
    let recorder = record_events(&registry);
    registry.bus().subscribe(
        Matcher::Any,
        events::PRE_ACQUIRE,
        recorder.sibling("veto").answering(false),
    );
    let job = Arc::new(Context::new("job"));

    let acquired = probe.acquire(&job, ProbeArgs::named("p")).unwrap();

    assert!(acquired.is_none());
    assert!(job.resources().is_empty());
    assert_eq!(recorder.labels(), vec![events::PRE_ACQUIRE, "veto"]);
    registry.cleanup_resources(job.as_ref()).unwrap();
    assert!(journal.lock().is_empty());
}

#[test]
fn veto_can_be_scoped_to_one_owner() {
    let registry = common::registry();
    let (probe, _journal) = register_probes(&registry);
    let quarantined = Arc::new(Context::new("quarantined"));
    let healthy = Arc::new(Context::new("healthy"));
    registry.bus().subscribe(
        Matcher::source(quarantined.as_ref()),
        events::PRE_ACQUIRE,
        Recorder::new("veto").answering(false),
    );

    assert!(probe.acquire(&quarantined, ProbeArgs::named("q")).unwrap().is_none());
    assert!(probe.acquire(&healthy, ProbeArgs::named("h")).unwrap().is_some());
}

#[test]
fn pre_acquire_sees_kind_and_args() {
    let registry = common::registry();
    let (probe, _journal) = register_probes(&registry);
    let seen = Journal::default();
    let sink = Arc::clone(&seen);
    registry.bus().subscribe(
        Matcher::Any,
        events::PRE_ACQUIRE,
        TypedHandler::new("inspect", move |_, event: &ResourceEvent| {
            assert!(event.kind().is::<Probe>());
            if let Some(args) = event.args::<ProbeArgs>() {
                sink.lock().push(args.name.clone());
            }
            Ok(true)
        }),
    );
    let job = Arc::new(Context::new("job"));

    probe.acquire(&job, ProbeArgs::named("primary")).unwrap();

    assert_eq!(*seen.lock(), vec!["primary"]);
}

#[test]
fn acquired_event_carries_the_tracked_instance() {
    let registry = common::registry();
    let (probe, _journal) = register_probes(&registry);
    let names = common::record_probes(&registry, events::ACQUIRED);
    let job = Arc::new(Context::new("job"));

    let handle = probe.acquire(&job, ProbeArgs::named("db")).unwrap().unwrap();

    assert_eq!(*names.lock(), vec!["db"]);
    assert!(job.resources().contains(handle.id()));
    assert!(Arc::ptr_eq(handle.owner(), &(Arc::clone(&job) as Arc<dyn Owner>)));
}

#[test]
fn body_failure_publishes_and_returns_the_error() {
    let registry = common::registry();
    let helper = registry
        .register_with::<Probe, _>("flaky", KindOptions::default(), |_, args| {
            Err(format!("{} unreachable", args.name).into())
        })
        .unwrap();
    let errors = Journal::default();
    let sink = Arc::clone(&errors);
    registry.bus().subscribe(
        Matcher::Any,
        events::ACQUISITION_FAILED,
        TypedHandler::new("errors", move |_, event: &ResourceEvent| {
            sink.lock().extend(event.error().map(str::to_owned));
            Ok(true)
        }),
    );
    let recorder = record_events(&registry);
    let job = Arc::new(Context::new("job"));

    let err = helper.acquire(&job, ProbeArgs::named("db")).unwrap_err();

    match &err {
        Error::Acquisition { kind, source } => {
            assert!(kind.is::<Probe>());
            assert_eq!(source.to_string(), "db unreachable");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(*errors.lock(), vec![err.to_string()]);
    assert_eq!(
        recorder.labels(),
        vec![events::PRE_ACQUIRE, events::ACQUISITION_FAILED]
    );
    assert!(job.resources().is_empty());
}

#[test]
fn body_reads_owner_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::registry();
    let open_in_workdir = registry
        .register_with::<TrackedFile, _>(
            "open_in_workdir",
            KindOptions::default(),
            |owner: &dyn Owner, name: std::path::PathBuf| {
                let workdir = owner.metadata("workdir").ok_or("no workdir configured")?;
                TrackedFile::create(std::path::Path::new(workdir).join(name), Journal::default())
            },
        )
        .unwrap();
    let configured = Arc::new(
        Context::new("configured").with_metadata("workdir", dir.path().to_string_lossy()),
    );
    let bare = Arc::new(Context::new("bare"));

    let file = open_in_workdir
        .acquire(&configured, "out.txt".into())
        .unwrap()
        .unwrap();
    assert_eq!(file.lock().path, dir.path().join("out.txt"));

    let err = open_in_workdir.acquire(&bare, "out.txt".into()).unwrap_err();
    assert!(err.to_string().contains("no workdir configured"));
}

#[test]
fn type_mismatch_is_reported_after_pre_acquire() {
    let registry = common::registry();
    register_probes(&registry);
    let recorder = record_events(&registry);
    let job = Arc::new(Context::new("job"));

    let err = registry
        .acquire::<TrackedFile, _>(&job, "probe", "x".into())
        .unwrap_err();

    assert!(matches!(
        err,
        Error::TypeMismatch { ref helper, expected, found }
            if helper == "probe" && expected.is::<TrackedFile>() && found.is::<Probe>()
    ));
    assert_eq!(
        recorder.labels(),
        vec![events::PRE_ACQUIRE, events::ACQUISITION_FAILED]
    );
}

#[test]
fn unknown_helper_publishes_nothing() {
    let registry = common::registry();
    let recorder = record_events(&registry);
    let job = Arc::new(Context::new("job"));

    let err = registry
        .acquire::<Probe, _>(&job, "missing", ProbeArgs::default())
        .unwrap_err();

    assert!(matches!(err, Error::UnknownHelper { .. }));
    assert!(recorder.is_empty());
}

#[test]
fn task_events_reach_subscriptions_on_the_job() {
    let registry = common::registry();
    let (probe, _journal) = register_probes(&registry);
    let job = Arc::new(Context::new("job").with_category("nightly"));
    let task = Arc::new(Context::new("task").with_parent(Arc::clone(&job)));
    let on_job = Recorder::new("job");
    registry
        .bus()
        .subscribe(Matcher::source(job.as_ref()), events::ACQUIRED, on_job.clone());
    registry.bus().subscribe(
        Matcher::category("nightly"),
        events::ACQUIRED,
        on_job.sibling("nightly"),
    );

    probe.acquire(&task, ProbeArgs::named("t")).unwrap().unwrap();

    assert_eq!(on_job.labels(), vec!["job", "nightly"]);
    assert!(on_job.deliveries().iter().all(|d| d.source == task.id()));
    assert_eq!(task.resources().len(), 1);
    assert!(job.resources().is_empty());
}

#[test]
fn adopt_tracks_an_outside_instance() {
    let registry = common::registry();
    register_probes(&registry);
    let journal = Journal::default();
    let recorder = record_events(&registry);
    let job = Arc::new(Context::new("job"));

    let handle = registry
        .adopt(&job, Probe::new(ProbeArgs::named("outside"), Arc::clone(&journal)))
        .unwrap();

    assert!(job.resources().contains(handle.id()));
    assert_eq!(recorder.labels(), vec![events::ACQUIRED]);
    registry.cleanup_resources(job.as_ref()).unwrap();
    assert_eq!(*journal.lock(), vec!["outside"]);
}

#[test]
fn type_erased_owners_can_acquire_and_adopt() {
    let registry = common::registry();
    let (probe, journal) = register_probes(&registry);
    let job = Arc::new(Context::new("job"));
    let first = probe.acquire(&job, ProbeArgs::named("first")).unwrap().unwrap();
    let owner: Arc<dyn Owner> = Arc::clone(first.owner());

    let second = probe
        .acquire_dyn(Arc::clone(&owner), ProbeArgs::named("second"))
        .unwrap()
        .unwrap();
    let third = registry
        .acquire_dyn::<Probe>(Arc::clone(&owner), probe.name(), ProbeArgs::named("third"))
        .unwrap()
        .unwrap();
    let adopted = registry
        .adopt_dyn(owner, Probe::new(ProbeArgs::named("adopted"), Arc::clone(&journal)))
        .unwrap();

    assert_eq!(
        job.resources().ids(),
        vec![first.id(), second.id(), third.id(), adopted.id()]
    );
    registry.cleanup_resources(job.as_ref()).unwrap();
    assert_eq!(*journal.lock(), vec!["adopted", "third", "second", "first"]);
}

#[test]
fn adopting_an_unregistered_kind_fails() {
    let registry = common::registry();
    let job = Arc::new(Context::new("job"));

    let err = registry
        .adopt(&job, Probe::new(ProbeArgs::named("stray"), Journal::default()))
        .unwrap_err();

    assert!(matches!(err, Error::UnregisteredResource { kind } if kind.is::<Probe>()));
    assert!(job.resources().is_empty());
}

#[test]
fn failing_pre_acquire_subscriber_does_not_block_acquisition() {
    let registry = common::registry();
    let (probe, _journal) = register_probes(&registry);
    registry.bus().subscribe(
        Matcher::Any,
        events::PRE_ACQUIRE,
        FnHandler::new("broken", |_: &dyn Source, _: &dyn std::any::Any| {
            Err("subscriber crashed".into())
        }),
    );
    let job = Arc::new(Context::new("job"));

    assert!(probe.acquire(&job, ProbeArgs::named("p")).unwrap().is_some());
}
