//! Resource kinds and helpers shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use warden_eventbus::testing::Recorder;
use warden_eventbus::{BoxError, EventBus, Matcher, TypedHandler};
use warden_resource::events;
use warden_resource::prelude::*;
use std::result::Result;

/// Shared record of teardown calls, in the order they happened.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn registry() -> Arc<Registry> {
    Registry::new(Arc::new(EventBus::new()))
}

/// Subscribe one recorder per resource event, labelled with the event name.
pub fn record_events(registry: &Registry) -> Recorder {
    let recorder = Recorder::new("unused");
    for event in events::ALL {
        registry
            .bus()
            .subscribe(Matcher::Any, event, recorder.sibling(event));
    }
    recorder
}

/// Names of the probes carried by `event`'s payloads, in delivery order.
pub fn record_probes(registry: &Registry, event: &str) -> Journal {
    let seen = Journal::default();
    let sink = Arc::clone(&seen);
    registry.bus().subscribe(
        Matcher::Any,
        event,
        TypedHandler::new("probe-names", move |_, payload: &ResourceEvent| {
            if let Some(name) = payload
                .resource()
                .and_then(|r| r.with(|probe: &mut Probe| probe.name.clone()))
            {
                sink.lock().push(name);
            }
            Ok(true)
        }),
    );
    seen
}

// ---------------------------------------------------------------------------
// TrackedFile
// ---------------------------------------------------------------------------

/// A real file on disk.
#[derive(Debug)]
pub struct TrackedFile {
    pub path: PathBuf,
    file: Option<fs::File>,
    journal: Journal,
}

impl TrackedFile {
    pub fn create(path: PathBuf, journal: Journal) -> Result<Self, BoxError> {
        let file = fs::File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            journal,
        })
    }

    fn open(path: PathBuf) -> Result<Self, BoxError> {
        Self::create(path, Journal::default())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        let file = self.file.take().ok_or("file already closed")?;
        file.sync_all()?;
        drop(file);
        self.journal.lock().push(self.label());
        Ok(())
    }

    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => writeln!(file, "{line}"),
            None => Err(io::Error::other("file closed")),
        }
    }
}

impl Resource for TrackedFile {
    type Args = PathBuf;

    fn kind_name() -> &'static str {
        "file"
    }

    fn constructor(name: &str) -> Option<Constructor<Self>> {
        (name == "open").then_some(Self::open as Constructor<Self>)
    }

    fn teardown(name: &str) -> Option<Teardown<Self>> {
        (name == "close").then_some(Self::close as Teardown<Self>)
    }
}

/// Register [`TrackedFile`] under `open_file`, journaling closes.
pub fn register_files(registry: &Arc<Registry>) -> (Helper<TrackedFile>, Journal) {
    let journal = Journal::default();
    let sink = Arc::clone(&journal);
    let helper = registry
        .register_with::<TrackedFile, _>("open_file", KindOptions::default(), move |_, path| {
            TrackedFile::create(path, Arc::clone(&sink))
        })
        .unwrap();
    (helper, journal)
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ProbeArgs {
    pub name: String,
    pub fail_close: bool,
    pub panic_on_close: bool,
}

impl ProbeArgs {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fail_close: true,
            ..Self::default()
        }
    }

    pub fn panicking(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            panic_on_close: true,
            ..Self::default()
        }
    }
}

/// In-memory resource that journals its teardown.
#[derive(Debug)]
pub struct Probe {
    pub name: String,
    pub closes: u32,
    fail_close: bool,
    panic_on_close: bool,
    journal: Journal,
}

impl Probe {
    pub fn new(args: ProbeArgs, journal: Journal) -> Self {
        Self {
            name: args.name,
            closes: 0,
            fail_close: args.fail_close,
            panic_on_close: args.panic_on_close,
            journal,
        }
    }

    fn close(&mut self) -> Result<(), BoxError> {
        assert!(!self.panic_on_close, "{} panicked while closing", self.name);
        if self.fail_close {
            return Err(format!("{} refused to close", self.name).into());
        }
        self.closes += 1;
        self.journal.lock().push(self.name.clone());
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), BoxError> {
        self.close()
    }
}

impl Resource for Probe {
    type Args = ProbeArgs;

    fn kind_name() -> &'static str {
        "probe"
    }

    fn teardown(name: &str) -> Option<Teardown<Self>> {
        match name {
            "close" => Some(Self::close as Teardown<Self>),
            "shutdown" => Some(Self::shutdown as Teardown<Self>),
            _ => None,
        }
    }
}

/// Register [`Probe`] under `probe`, journaling closes.
pub fn register_probes(registry: &Arc<Registry>) -> (Helper<Probe>, Journal) {
    let journal = Journal::default();
    let sink = Arc::clone(&journal);
    let helper = registry
        .register_with::<Probe, _>("probe", KindOptions::default(), move |_, args| {
            Ok(Probe::new(args, Arc::clone(&sink)))
        })
        .unwrap();
    (helper, journal)
}

/// Acquire one probe per name, in order.
pub fn acquire_all(helper: &Helper<Probe>, owner: &Arc<Context>, names: &[&str]) -> Vec<Handle<Probe>> {
    names
        .iter()
        .map(|name| helper.acquire(owner, ProbeArgs::named(name)).unwrap().unwrap())
        .collect()
}
