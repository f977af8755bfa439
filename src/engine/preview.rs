// src/engine/preview.rs
//
// Live preview scheduler. Knob changes arrive faster than the pipeline
// runs, so triggers are debounced on a worker thread and stamped with a
// generation counter; only the run matching the latest trigger may update
// the sink. A stale run that finishes after a newer trigger is discarded,
// whether it succeeded or failed.

use crate::engine::pipeline::{run_pipeline, PipelineOutput};
use crate::error::PipelineError;
use crate::request::TransformRequest;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One delivery to the preview sink. Errors are delivered too, so the UI
/// can show a decode failure instead of a stuck spinner.
#[derive(Debug)]
pub struct PreviewFrame {
    pub generation: u64,
    pub result: Result<PipelineOutput, PipelineError>,
}

struct Job {
    bytes: Arc<Vec<u8>>,
    mime: String,
    request: TransformRequest,
    generation: u64,
}

#[derive(Default)]
struct State {
    pending: Option<Job>,
    deadline: Option<Instant>,
    generation: u64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    cvar: Condvar,
}

pub struct PreviewScheduler {
    shared: Arc<Shared>,
    debounce: Duration,
    worker: Option<JoinHandle<()>>,
}

impl PreviewScheduler {
    /// Spawn the worker. `debounce` is how long a trigger must stay the
    /// newest before its run starts; the UI uses 200-300 ms.
    pub fn new(
        debounce: Duration,
        sink: impl FnMut(PreviewFrame) + Send + 'static,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            cvar: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || worker_loop(worker_shared, sink));
        Self {
            shared,
            debounce,
            worker: Some(worker),
        }
    }

    pub fn with_default_debounce(sink: impl FnMut(PreviewFrame) + Send + 'static) -> Self {
        Self::new(Duration::from_millis(250), sink)
    }

    /// Schedule a preview run, superseding any pending or in-flight one.
    /// Returns the new generation.
    pub fn trigger(
        &self,
        bytes: Arc<Vec<u8>>,
        mime: impl Into<String>,
        request: TransformRequest,
    ) -> u64 {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        let generation = state.generation;
        state.pending = Some(Job {
            bytes,
            mime: mime.into(),
            request,
            generation,
        });
        state.deadline = Some(Instant::now() + self.debounce);
        drop(state);
        self.shared.cvar.notify_one();
        generation
    }

    pub fn latest_generation(&self) -> u64 {
        self.shared.state.lock().generation
    }
}

impl Drop for PreviewScheduler {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.cvar.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>, mut sink: impl FnMut(PreviewFrame)) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                match state.deadline {
                    Some(deadline) if Instant::now() >= deadline => {
                        state.deadline = None;
                        if let Some(job) = state.pending.take() {
                            break job;
                        }
                    }
                    Some(deadline) => {
                        shared.cvar.wait_until(&mut state, deadline);
                    }
                    None => {
                        shared.cvar.wait(&mut state);
                    }
                }
            }
        };

        let result = run_pipeline(&job.bytes, &job.mime, &job.request);

        // A newer trigger arrived while this run was in flight.
        let stale = shared.state.lock().generation != job.generation;
        if stale {
            debug!("dropping stale preview generation {}", job.generation);
            continue;
        }
        sink(PreviewFrame {
            generation: job.generation,
            result,
        });
    }
}
