//! Scripted engine fakes shared by the pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use antivirus_engine::{Scanner, Updater};
use antivirus_shared::{AntivirusError, Result, Verdict};

/// What a scan saw: the scratch path and its content at scan time.
#[derive(Debug, Clone)]
pub struct SeenFile {
    pub path: PathBuf,
    pub content: Vec<u8>,
}

#[derive(Debug)]
pub struct ScriptedScanner {
    outcome: std::result::Result<Verdict, String>,
    daemon_error: Option<String>,
    pub daemon_starts: AtomicUsize,
    pub seen: Mutex<Vec<SeenFile>>,
}

impl ScriptedScanner {
    pub fn returning(verdict: Verdict) -> Self {
        Self {
            outcome: Ok(verdict),
            daemon_error: None,
            daemon_starts: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            ..Self::returning(Verdict::Clean)
        }
    }

    pub fn with_daemon_error(mut self, message: &str) -> Self {
        self.daemon_error = Some(message.to_string());
        self
    }

    pub fn scans(&self) -> Vec<SeenFile> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scanner for ScriptedScanner {
    async fn start_daemon(&self) -> Result<()> {
        self.daemon_starts.fetch_add(1, Ordering::SeqCst);
        match &self.daemon_error {
            Some(msg) => Err(AntivirusError::engine(msg.clone())),
            None => Ok(()),
        }
    }

    async fn scan_file(&self, path: &Path) -> Result<Verdict> {
        let content = std::fs::read(path).unwrap_or_default();
        self.seen.lock().unwrap().push(SeenFile {
            path: path.to_path_buf(),
            content,
        });
        self.outcome.clone().map_err(AntivirusError::engine)
    }
}

/// Writes fixed files into the definitions directory when run.
#[derive(Debug)]
pub struct ScriptedUpdater {
    dir: PathBuf,
    writes: Vec<(String, Vec<u8>)>,
    error: Option<String>,
    pub runs: AtomicUsize,
}

impl ScriptedUpdater {
    pub fn writing(dir: &Path, files: &[(&str, &str)]) -> Self {
        Self {
            dir: dir.to_path_buf(),
            writes: files
                .iter()
                .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
                .collect(),
            error: None,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn failing(dir: &Path, message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::writing(dir, &[])
        }
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Updater for ScriptedUpdater {
    async fn run_update(&self) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.error {
            return Err(AntivirusError::engine(msg.clone()));
        }
        for (name, body) in &self.writes {
            std::fs::write(self.dir.join(name), body).unwrap();
        }
        Ok(())
    }
}
