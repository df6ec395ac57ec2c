use crate::error::Error;
use crate::processes::{PidIter, Registry};
use nix::unistd::Pid;
use std::cell::Cell;
use std::io;
use std::path::PathBuf;
use users::uid_t;

#[derive(Debug, Clone, Default)]
pub struct FakeProcess {
    exe: Option<PathBuf>,
    cmdline: Option<Vec<u8>>,
    owner: uid_t,
}

impl FakeProcess {
    pub fn new() -> Self {
        FakeProcess::default()
    }

    pub fn exe(mut self, path: &str) -> Self {
        self.exe = Some(PathBuf::from(path));
        self
    }

    pub fn cmdline(mut self, record: &[u8]) -> Self {
        self.cmdline = Some(record.to_vec());
        self
    }

    pub fn owner(mut self, uid: uid_t) -> Self {
        self.owner = uid;
        self
    }
}

/// In-memory registry. Processes without an `exe` or `cmdline` behave like processes that exited
/// after being listed.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    processes: Vec<(Pid, FakeProcess)>,
    unopenable: bool,
    opened: Cell<usize>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        FakeRegistry::default()
    }

    pub fn unopenable() -> Self {
        FakeRegistry {
            unopenable: true,
            ..FakeRegistry::default()
        }
    }

    pub fn with(mut self, pid: i32, process: FakeProcess) -> Self {
        self.processes.push((Pid::from_raw(pid), process));
        self
    }

    pub fn times_opened(&self) -> usize {
        self.opened.get()
    }

    fn find(&self, pid: Pid) -> io::Result<&FakeProcess> {
        self.processes
            .iter()
            .find(|(candidate, _)| *candidate == pid)
            .map(|(_, process)| process)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

impl Registry for FakeRegistry {
    fn pids(&self) -> Result<PidIter, Error> {
        self.opened.set(self.opened.get() + 1);

        if self.unopenable {
            return Err(Error::OpenRegistry {
                path: PathBuf::from("/fake/proc"),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }

        let pids: Vec<Pid> = self.processes.iter().map(|(pid, _)| *pid).collect();
        Ok(Box::new(pids.into_iter()))
    }

    fn executable(&self, pid: Pid) -> io::Result<PathBuf> {
        self.find(pid)?
            .exe
            .clone()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn cmdline(&self, pid: Pid, limit: usize) -> io::Result<Vec<u8>> {
        let record = self
            .find(pid)?
            .cmdline
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

        Ok(record.iter().take(limit.saturating_add(1)).copied().collect())
    }

    fn owner(&self, pid: Pid) -> io::Result<uid_t> {
        self.find(pid).map(|process| process.owner)
    }
}
