use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, warn};

use super::{execute, ApiError, ApiRequest, ApiResponse, GameApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: Ticket,
    pub result: Result<ApiResponse, ApiError>,
}

/// Where the synchronizer sends requests and collects their results.
/// `drain` never blocks.
pub trait RequestSink {
    fn submit(&mut self, ticket: Ticket, request: ApiRequest);
    fn drain(&mut self, out: &mut Vec<Completion>);
}

type Job = (Ticket, ApiRequest);

/// Fixed pool of I/O threads running blocking `GameApi` calls.
///
/// Workers never touch application state; they only send completions back.
/// Dropping the dispatcher closes the job queue, lets in-flight calls finish
/// and discards their results.
pub struct ThreadedDispatcher {
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
}

impl ThreadedDispatcher {
    pub fn spawn(api: Arc<dyn GameApi>, worker_threads: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel::<Completion>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        for index in 0..worker_threads.max(1) {
            let api = Arc::clone(&api);
            let job_rx = Arc::clone(&job_rx);
            let done_tx = done_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("idle-io-{index}"))
                .spawn(move || worker_loop(api.as_ref(), &job_rx, &done_tx));
            if let Err(error) = spawned {
                warn!(error = %error, worker = index, "dispatcher_worker_spawn_failed");
            }
        }

        Self {
            jobs: Some(job_tx),
            completions: done_rx,
        }
    }
}

fn worker_loop(api: &dyn GameApi, jobs: &Mutex<Receiver<Job>>, done: &Sender<Completion>) {
    loop {
        let next = match jobs.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => return,
        };
        let Ok((ticket, request)) = next else {
            return;
        };
        debug!(ticket = ticket.0, request = request.name(), "api_request_started");
        let result = execute(api, &request);
        if done.send(Completion { ticket, result }).is_err() {
            return;
        }
    }
}

impl RequestSink for ThreadedDispatcher {
    fn submit(&mut self, ticket: Ticket, request: ApiRequest) {
        let Some(jobs) = self.jobs.as_ref() else {
            return;
        };
        if jobs.send((ticket, request)).is_err() {
            warn!(ticket = ticket.0, "dispatcher_queue_closed");
        }
    }

    fn drain(&mut self, out: &mut Vec<Completion>) {
        while let Ok(completion) = self.completions.try_recv() {
            out.push(completion);
        }
    }
}

impl Drop for ThreadedDispatcher {
    fn drop(&mut self) {
        self.jobs.take();
    }
}
