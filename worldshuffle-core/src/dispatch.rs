use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::document::{DocumentKind, FileReport, Shuffler};
use crate::{Result, ShuffleError};

/// Lifecycle of one file. A path is claimed by exactly one task from
/// `Dispatched` until it lands in `Succeeded` or `Failed`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileState {
    Discovered,
    Dispatched,
    Succeeded,
    Failed,
}

struct Job {
    path: PathBuf,
    kind: DocumentKind,
    index: usize,
}

type Process =
    dyn Fn(&Shuffler, &Path, DocumentKind, usize) -> Result<FileReport> + Send + Sync;

struct FileOutcome {
    path: PathBuf,
    result: Result<FileReport>,
}

/// What a completed batch produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: Vec<FileReport>,
    pub failed: Vec<(PathBuf, ShuffleError)>,
    pub reset_count: u64,
}

impl RunSummary {
    pub fn modified_total(&self) -> usize {
        self.succeeded.iter().map(|r| r.modified).sum()
    }

    pub fn to_log(&self) -> String {
        let mut log = format!(
            "files succeeded: {}, failed: {}, names replaced: {}, pool resets: {}\n",
            self.succeeded.len(),
            self.failed.len(),
            self.modified_total(),
            self.reset_count
        );
        for r in &self.succeeded {
            log.push_str(&format!(
                "  ok   {} ({}/{} replaced",
                r.path.display(),
                r.modified,
                r.total
            ));
            if let Some(p) = &r.palette_path {
                log.push_str(&format!(", palette at {p}"));
            }
            if r.exhaustions > 0 {
                log.push_str(&format!(", {} exhaustion(s)", r.exhaustions));
            }
            log.push_str(")\n");
        }
        for (path, err) in &self.failed {
            log.push_str(&format!("  FAIL {}: {}\n", path.display(), err));
        }
        log
    }
}

/// Fans documents out to a fixed set of worker threads.
pub struct Dispatcher {
    shuffler: Arc<Shuffler>,
    jobs: mpsc::Sender<Job>,
    outcomes: mpsc::Receiver<FileOutcome>,
    workers: Vec<thread::JoinHandle<()>>,
    states: Arc<Mutex<HashMap<PathBuf, FileState>>>,
    undelivered: Vec<FileOutcome>,
    next_index: usize,
}

impl Dispatcher {
    pub fn new(shuffler: Arc<Shuffler>, workers: usize) -> Self {
        Self::with_process(shuffler, workers, Arc::new(Shuffler::process_document))
    }

    fn with_process(shuffler: Arc<Shuffler>, workers: usize, process: Arc<Process>) -> Self {
        let workers = workers.max(1);
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (out_tx, out_rx) = mpsc::channel::<FileOutcome>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let states = Arc::new(Mutex::new(HashMap::new()));

        let handles = (0..workers)
            .map(|worker_id| {
                let job_rx = Arc::clone(&job_rx);
                let out_tx = out_tx.clone();
                let shuffler = Arc::clone(&shuffler);
                let states = Arc::clone(&states);
                let process = Arc::clone(&process);
                thread::Builder::new()
                    .name(format!("shuffle-worker-{worker_id}"))
                    .spawn(move || {
                        worker_loop(&shuffler, &*process, &job_rx, &out_tx, &states)
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("could not start worker thread: {e}");
                    None
                }
            })
            .collect();

        Dispatcher {
            shuffler,
            jobs: job_tx,
            outcomes: out_rx,
            workers: handles,
            states,
            undelivered: Vec::new(),
            next_index: 0,
        }
    }

    /// Queues a file. Returns `false` if the path was already dispatched.
    pub fn dispatch(&mut self, path: PathBuf, kind: DocumentKind) -> bool {
        {
            let mut states = self.states.lock();
            match states.get(&path) {
                Some(FileState::Discovered) | None => {}
                Some(state) => {
                    log::warn!("{} is already {:?}, not dispatching twice", path.display(), state);
                    return false;
                }
            }
            states.insert(path.clone(), FileState::Dispatched);
        }

        let index = self.next_index;
        self.next_index += 1;

        if let Err(mpsc::SendError(job)) = self.jobs.send(Job { path, kind, index }) {
            self.states.lock().insert(job.path.clone(), FileState::Failed);
            self.undelivered.push(FileOutcome {
                path: job.path,
                result: Err(ShuffleError::Worker("no worker threads running".to_string())),
            });
        }
        true
    }

    /// Records a path seen by the walker before it is dispatched.
    pub fn discover(&mut self, path: &Path) {
        self.states
            .lock()
            .entry(path.to_path_buf())
            .or_insert(FileState::Discovered);
    }

    pub fn state(&self, path: &Path) -> Option<FileState> {
        self.states.lock().get(path).copied()
    }

    pub fn dispatched(&self) -> usize {
        self.next_index
    }

    /// Blocks until every dispatched file has succeeded or failed.
    pub fn wait_for_completion(self) -> RunSummary {
        let Dispatcher {
            shuffler,
            jobs,
            outcomes,
            workers,
            states,
            undelivered,
            ..
        } = self;

        // Closing the queue lets idle workers exit once it drains.
        drop(jobs);
        for handle in workers {
            if handle.join().is_err() {
                log::error!("a worker thread exited abnormally");
            }
        }

        let mut summary = RunSummary::default();
        for outcome in undelivered.into_iter().chain(outcomes.try_iter()) {
            match outcome.result {
                Ok(report) => summary.succeeded.push(report),
                Err(err) => summary.failed.push((outcome.path, err)),
            }
        }

        let mut states = states.lock();
        for (path, state) in states.iter_mut() {
            if *state == FileState::Dispatched {
                *state = FileState::Failed;
                summary.failed.push((
                    path.clone(),
                    ShuffleError::Worker("worker stopped before finishing".to_string()),
                ));
            }
        }

        summary.reset_count = shuffler.pool().reset_count();
        summary
    }
}

fn worker_loop(
    shuffler: &Shuffler,
    process: &Process,
    jobs: &Mutex<mpsc::Receiver<Job>>,
    outcomes: &mpsc::Sender<FileOutcome>,
    states: &Mutex<HashMap<PathBuf, FileState>>,
) {
    loop {
        let job = jobs.lock().recv();
        let Ok(Job { path, kind, index }) = job else {
            break;
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            process(shuffler, &path, kind, index)
        }))
        .unwrap_or_else(|_| {
            Err(ShuffleError::Worker(format!(
                "panicked while processing {}",
                path.display()
            )))
        });

        let state = match &result {
            Ok(_) => FileState::Succeeded,
            Err(err) => {
                log::error!("failed to process {}: {}", path.display(), err);
                FileState::Failed
            }
        };
        states.lock().insert(path.clone(), state);

        if outcomes.send(FileOutcome { path, result }).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShuffleConfig;
    use crate::nbt::tests::structure_doc;
    use crate::pool::IdentifierPool;
    use std::collections::{BTreeMap, HashSet};
    use std::fs;

    fn shuffler(ids: &[&str]) -> Arc<Shuffler> {
        let pool = IdentifierPool::build(
            ids.iter().copied(),
            &HashSet::new(),
            &BTreeMap::new(),
            "minecraft",
            1,
        )
        .unwrap();
        Arc::new(Shuffler::new(pool, &ShuffleConfig::default(), 1))
    }

    #[test]
    fn every_file_reaches_a_final_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..12 {
            let p = dir.path().join(format!("f{i}.json"));
            fs::write(&p, format!(r#"{{"name": "old_{i}", "extra": {{"Name": "x"}}}}"#)).unwrap();
            paths.push(p);
        }
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "not json").unwrap();
        let structure = dir.path().join("s.nbt");
        structure_doc(&["oak_log", "dirt"]).save(&structure).unwrap();

        let mut dispatcher = Dispatcher::new(shuffler(&["stone", "dirt", "sand"]), 4);
        for p in &paths {
            assert!(dispatcher.dispatch(p.clone(), DocumentKind::Text));
        }
        dispatcher.dispatch(bad.clone(), DocumentKind::Text);
        dispatcher.dispatch(structure.clone(), DocumentKind::Binary);
        assert_eq!(dispatcher.dispatched(), 14);

        let summary = dispatcher.wait_for_completion();
        assert_eq!(summary.succeeded.len(), 13);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, bad);
        assert_eq!(summary.modified_total(), 12 * 2 + 2);

        for p in &paths {
            let v: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap();
            assert_ne!(v["name"], v["extra"]["Name"]);
        }
    }

    #[test]
    fn same_path_is_never_dispatched_twice() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("one.json");
        fs::write(&p, r#"{"name": "a"}"#).unwrap();

        let mut dispatcher = Dispatcher::new(shuffler(&["stone"]), 2);
        dispatcher.discover(&p);
        assert_eq!(dispatcher.state(&p), Some(FileState::Discovered));
        assert!(dispatcher.dispatch(p.clone(), DocumentKind::Text));
        assert!(!dispatcher.dispatch(p.clone(), DocumentKind::Text));

        let summary = dispatcher.wait_for_completion();
        assert_eq!(summary.succeeded.len(), 1);
        assert!(summary.failed.is_empty());
    }

    #[test]
    fn exhaustion_across_workers_is_counted_once_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = Dispatcher::new(shuffler(&["stone", "dirt"]), 4);
        for i in 0..8 {
            let p = dir.path().join(format!("f{i}.json"));
            // Five names against a two-entry catalog: two exhaustions each.
            fs::write(
                &p,
                r#"[{"name":"a"},{"name":"b"},{"name":"c"},{"name":"d"},{"name":"e"}]"#,
            )
            .unwrap();
            dispatcher.dispatch(p, DocumentKind::Text);
        }

        let summary = dispatcher.wait_for_completion();
        assert_eq!(summary.succeeded.len(), 8);
        let per_file: u64 = summary.succeeded.iter().map(|r| r.exhaustions).sum();
        assert_eq!(per_file, 16);
        assert_eq!(summary.reset_count, 16);
    }

    #[test]
    fn panicking_worker_fails_only_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        let boom = dir.path().join("boom.json");
        fs::write(&good, r#"{"name": "a"}"#).unwrap();
        fs::write(&boom, r#"{"name": "b"}"#).unwrap();

        let process: Arc<Process> = Arc::new(
            |s: &Shuffler, path: &Path, kind: DocumentKind, index: usize| {
                if path.ends_with("boom.json") {
                    panic!("worker state corrupted");
                }
                s.process_document(path, kind, index)
            },
        );
        let mut dispatcher = Dispatcher::with_process(shuffler(&["stone"]), 1, process);
        dispatcher.dispatch(boom.clone(), DocumentKind::Text);
        dispatcher.dispatch(good.clone(), DocumentKind::Text);

        let summary = dispatcher.wait_for_completion();
        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.succeeded[0].path, good);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, boom);
        assert!(matches!(summary.failed[0].1, ShuffleError::Worker(_)));
        assert_eq!(fs::read_to_string(&boom).unwrap(), r#"{"name": "b"}"#);
    }

    #[test]
    fn empty_batch_completes_immediately() {
        let dispatcher = Dispatcher::new(shuffler(&["stone"]), 4);
        let summary = dispatcher.wait_for_completion();
        assert!(summary.succeeded.is_empty());
        assert!(summary.failed.is_empty());
        assert_eq!(summary.reset_count, 0);
    }
}
