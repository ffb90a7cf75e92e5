//! In-memory + JSONL run history: one [`RunRecord`] per association
//! execution, kept for operability (CLI inspection, audit cross-reference
//! via `document_id`). Not part of the quantified invariants in `spec.md`
//! §8 — purely an aid, mirroring the teacher's `RunStore` shape without
//! its SSE broadcast machinery (nothing in this subsystem streams run
//! progress to a client).

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sa_domain::model::{AssociationStatus, RunRecord};

const MAX_RUNS_IN_MEMORY: usize = 2000;

struct Inner {
    runs: VecDeque<RunRecord>,
    index: HashMap<String, usize>,
    base_seq: usize,
}

impl Inner {
    fn new(runs: VecDeque<RunRecord>) -> Self {
        let mut index = HashMap::with_capacity(runs.len());
        for (i, run) in runs.iter().enumerate() {
            index.insert(run.run_id.clone(), i);
        }
        Self {
            runs,
            index,
            base_seq: 0,
        }
    }

    fn deque_idx(&self, seq: usize) -> usize {
        seq - self.base_seq
    }

    fn get_mut(&mut self, run_id: &str) -> Option<&mut RunRecord> {
        let seq = *self.index.get(run_id)?;
        self.runs.get_mut(self.deque_idx(seq))
    }

    fn push_back(&mut self, run: RunRecord) {
        let seq = self.base_seq + self.runs.len();
        self.index.insert(run.run_id.clone(), seq);
        self.runs.push_back(run);
    }

    fn pop_front(&mut self) {
        if let Some(run) = self.runs.pop_front() {
            self.index.remove(&run.run_id);
            self.base_seq += 1;
        }
    }
}

pub struct RunStore {
    inner: RwLock<Inner>,
    log_path: PathBuf,
}

impl RunStore {
    pub fn new(data_root: &Path) -> Self {
        let dir = data_root.join("runs");
        std::fs::create_dir_all(&dir).ok();
        let log_path = dir.join("runs.jsonl");
        let runs = Self::load_recent(&log_path);
        Self {
            inner: RwLock::new(Inner::new(runs)),
            log_path,
        }
    }

    fn load_recent(path: &Path) -> VecDeque<RunRecord> {
        let mut runs = VecDeque::new();
        if let Ok(content) = std::fs::read_to_string(path) {
            for line in content.lines().rev().take(MAX_RUNS_IN_MEMORY) {
                if let Ok(run) = serde_json::from_str::<RunRecord>(line) {
                    runs.push_front(run);
                }
            }
        }
        runs
    }

    /// Record the start of a new run and append it to the JSONL log.
    pub fn start(&self, run: RunRecord) {
        if let Ok(json) = serde_json::to_string(&run) {
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)
            {
                let _ = writeln!(file, "{json}");
            }
        }
        let mut inner = self.inner.write();
        inner.push_back(run);
        if inner.runs.len() > MAX_RUNS_IN_MEMORY {
            inner.pop_front();
        }
    }

    /// Mark a run terminal, both in memory and appended to the JSONL log
    /// as a fresh record (the log is append-only; readers take the last
    /// entry per `run_id` as authoritative).
    pub fn finish(&self, run_id: &str, status: AssociationStatus, error: Option<String>) {
        let updated = {
            let mut inner = self.inner.write();
            let Some(run) = inner.get_mut(run_id) else {
                return;
            };
            run.finished_at = Some(chrono::Utc::now());
            run.status = status;
            run.error = error;
            run.clone()
        };
        if let Ok(json) = serde_json::to_string(&updated) {
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)
            {
                let _ = writeln!(file, "{json}");
            }
        }
    }

    pub fn for_association(&self, association_id: &str) -> Vec<RunRecord> {
        self.inner
            .read()
            .runs
            .iter()
            .rev()
            .filter(|r| r.association_id == association_id)
            .cloned()
            .collect()
    }

    pub fn recent(&self, limit: usize) -> Vec<RunRecord> {
        self.inner
            .read()
            .runs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
