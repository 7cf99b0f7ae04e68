//! Open a few files under a job, dispose one explicitly, and let the
//! `post-execute` hook release the rest.
//!
//! Run with `RUST_LOG=debug cargo run -p warden-resource --example file_cleanup`.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use warden_eventbus::{BoxError, EventBus, EventBusConfig, Matcher, TypedHandler};
use warden_resource::events;
use warden_resource::hooks::POST_EXECUTE;
use warden_resource::prelude::*;
use std::result::Result;

struct LogFile {
    path: PathBuf,
    file: Option<File>,
}

impl LogFile {
    fn open(path: PathBuf) -> Result<Self, BoxError> {
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    fn close(&mut self) -> Result<(), BoxError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

impl Resource for LogFile {
    type Args = PathBuf;

    fn kind_name() -> &'static str {
        "log-file"
    }

    fn constructor(name: &str) -> Option<Constructor<Self>> {
        (name == "open").then_some(Self::open as Constructor<Self>)
    }

    fn teardown(name: &str) -> Option<Teardown<Self>> {
        (name == "close").then_some(Self::close as Teardown<Self>)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let bus = Arc::new(EventBus::with_config(EventBusConfig { debug: true }));
    let registry = Registry::new(Arc::clone(&bus));
    registry.install_audit();
    registry.install_cleanup_hook::<Context>();

    bus.subscribe(
        Matcher::Any,
        events::DISPOSED,
        TypedHandler::new("report", |_, event: &ResourceEvent| {
            if let Some(path) = event
                .resource()
                .and_then(|r| r.with(|log: &mut LogFile| log.path.display().to_string()))
            {
                println!("closed {path}");
            }
            Ok(true)
        }),
    );

    let open = registry.register::<LogFile>("open_log", KindOptions::default())?;
    let dir = std::env::temp_dir().join("warden-file-cleanup");
    std::fs::create_dir_all(&dir)?;

    let job = Arc::new(Context::new("nightly-export").with_category("job"));
    let mut handles = Vec::new();
    for name in ["extract.log", "transform.log", "load.log"] {
        if let Some(handle) = open.acquire(&job, dir.join(name))? {
            if let Some(file) = handle.lock().file.as_mut() {
                writeln!(file, "{name} started")?;
            }
            handles.push(handle);
        }
    }

    handles[0].dispose()?;
    println!("{} resources still held", job.resources().len());

    bus.publish(job.as_ref(), POST_EXECUTE, &());
    println!("{} resources still held", job.resources().len());
    Ok(())
}
