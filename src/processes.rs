use crate::error::{Error, OpenRegistrySnafu};
use nix::unistd::Pid;
use snafu::ResultExt;
use std::fs::{self, read_dir, DirEntry, File, ReadDir};
use std::io::{self, Read};
use std::path::PathBuf;
use users::uid_t;

pub type PidIter = Box<dyn Iterator<Item = Pid>>;

/// A listing of live processes, together with the per-process attributes used to identify them.
///
/// Only `pids` is allowed to fail the whole scan. Everything else is per-entry and is expected to
/// fail now and then, as processes exit between being listed and being inspected.
pub trait Registry {
    fn pids(&self) -> Result<PidIter, Error>;

    fn executable(&self, pid: Pid) -> io::Result<PathBuf>;

    /// Reads the NUL-separated argument vector of the process, but never more than `limit + 1`
    /// bytes of it. The extra byte lets callers tell a record that fits from one that doesn't.
    fn cmdline(&self, pid: Pid, limit: usize) -> io::Result<Vec<u8>>;

    fn owner(&self, pid: Pid) -> io::Result<uid_t>;
}

impl<R: Registry + ?Sized> Registry for &R {
    fn pids(&self) -> Result<PidIter, Error> {
        (**self).pids()
    }

    fn executable(&self, pid: Pid) -> io::Result<PathBuf> {
        (**self).executable(pid)
    }

    fn cmdline(&self, pid: Pid, limit: usize) -> io::Result<Vec<u8>> {
        (**self).cmdline(pid, limit)
    }

    fn owner(&self, pid: Pid) -> io::Result<uid_t> {
        (**self).owner(pid)
    }
}

/// The process information pseudo-filesystem, usually mounted at `/proc`.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

pub struct PidIterator {
    read_dir: ReadDir,
}

fn is_dir(entry: &DirEntry) -> bool {
    entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
}

fn numeric_pid(entry: &DirEntry) -> Option<Pid> {
    let name = entry.file_name();
    let name = name.to_str()?;

    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    name.parse().ok().map(Pid::from_raw)
}

impl Iterator for PidIterator {
    type Item = Pid;

    fn next(&mut self) -> Option<Self::Item> {
        // Kernel pseudo-entries, plain files and entries that failed to load are all skipped.
        loop {
            match self.read_dir.next() {
                Some(Ok(entry)) => {
                    if !is_dir(&entry) {
                        continue;
                    }
                    if let Some(pid) = numeric_pid(&entry) {
                        return Some(pid);
                    }
                }
                Some(Err(_)) => continue,
                None => return None,
            }
        }
    }
}

impl ProcFs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        ProcFs { root: root.into() }
    }

    fn entry_path(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.to_string())
    }
}

impl Registry for ProcFs {
    fn pids(&self) -> Result<PidIter, Error> {
        let read_dir = read_dir(&self.root).context(OpenRegistrySnafu { path: &self.root })?;
        Ok(Box::new(PidIterator { read_dir }))
    }

    fn executable(&self, pid: Pid) -> io::Result<PathBuf> {
        fs::read_link(self.entry_path(pid).join("exe"))
    }

    fn cmdline(&self, pid: Pid, limit: usize) -> io::Result<Vec<u8>> {
        let file = File::open(self.entry_path(pid).join("cmdline"))?;
        let mut record = Vec::new();
        file.take((limit as u64).saturating_add(1)).read_to_end(&mut record)?;
        Ok(record)
    }

    fn owner(&self, pid: Pid) -> io::Result<uid_t> {
        use std::os::linux::fs::MetadataExt;
        fs::metadata(self.entry_path(pid)).map(|metadata| metadata.st_uid())
    }
}
