mod util;
use util::*;

use halo_stencil::prelude::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use serial_test::serial;
use std::sync::Once;

/// Keeps the crate's `error!` messages.
struct Capture {
    errors: Mutex<Vec<String>>,
}

impl Log for Capture {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.target().starts_with("halo_stencil")
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) && record.level() == Level::Error {
            self.errors.lock().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture {
    errors: Mutex::new(Vec::new()),
};
static INSTALL: Once = Once::new();

fn captured_errors<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    INSTALL.call_once(|| {
        log::set_logger(&CAPTURE).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURE.errors.lock().clear();
    let out = f();
    let errors = std::mem::take(&mut *CAPTURE.errors.lock());
    (out, errors)
}

struct BrokenSink;

impl SnapshotSink for BrokenSink {
    fn record(&mut self, iteration: usize, _view: GridView<'_>) -> Result<(), StencilError> {
        if iteration < 2 {
            return Ok(());
        }
        Err(StencilError::Configuration("no space left".into()))
    }
}

#[test]
#[serial]
fn thread_failure_is_returned_not_logged() {
    let grid = random_grid(10, 5, 3);
    let (result, errors) = captured_errors(|| {
        let mut sink = BrokenSink;
        shared_memory::run(grid, 6, 4, DebugLevel::Silent, Some(&mut sink))
    });
    assert!(
        matches!(result, Err(StencilError::Configuration(ref m)) if m == "no space left"),
        "{result:?}"
    );
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
#[serial]
fn rank_failure_is_logged_once_across_the_group() {
    let grid = random_grid(9, 5, 4);
    let (results, errors) =
        captured_errors(|| run_local_with(&grid, 4, 6, |_| Some(BrokenSink)));
    assert!(results.iter().all(|(r, _)| r.is_err()));
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("no space left"), "{errors:?}");
}

#[test]
#[serial]
fn single_rank_failure_is_logged_once() {
    let grid = random_grid(6, 4, 5);
    let comms = LocalComm::universe(1);
    let (result, errors) = captured_errors(|| {
        let mut sink = BrokenSink;
        let coordinator = Coordinator {
            grid,
            iterations: 4,
            debug_level: DebugLevel::Silent,
            sink: Some(&mut sink as &mut (dyn SnapshotSink + Send)),
        };
        message_passing::run(&comms[0], Some(coordinator))
    });
    assert!(result.is_err());
    assert_eq!(errors.len(), 1, "{errors:?}");
}
