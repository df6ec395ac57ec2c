use crate::error::Error;
use crate::processes::{PidIter, Registry};
use nix::unistd::Pid;
use std::borrow::Cow;
use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use users::uid_t;

/// Longest resolved executable path that will be compared. Longer paths are skipped.
pub const MAX_PATH_LEN: usize = 4095;

/// Longest first command-line argument that will be compared. Longer arguments are skipped.
pub const MAX_CMDLINE_LEN: usize = 4095;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Compare the resolved executable path of the process.
    Path,
    /// Compare the basename of the first command-line argument of the process.
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    bytes: Vec<u8>,
}

impl Target {
    pub fn new(target: OsString) -> Self {
        Target {
            bytes: target.into_vec(),
        }
    }

    pub fn is_path(&self) -> bool {
        self.bytes.contains(&b'/')
    }

    pub fn mode(&self) -> MatchMode {
        if self.is_path() {
            MatchMode::Path
        } else {
            MatchMode::Name
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_path_len: usize,
    pub max_cmdline_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_path_len: MAX_PATH_LEN,
            max_cmdline_len: MAX_CMDLINE_LEN,
        }
    }
}

#[derive(Debug)]
pub struct Matcher {
    target: Target,
    mode: MatchMode,
    limits: Limits,
    owner: Option<uid_t>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub pid: Pid,
    pub identity: Vec<u8>,
}

/// Lazily scans a registry, yielding each matching process as soon as it is found.
///
/// The scan cannot be restarted; stop pulling from it to stop scanning.
pub struct Matches<'a, R> {
    matcher: &'a Matcher,
    registry: &'a R,
    pids: PidIter,
    scanned: usize,
}

impl Matcher {
    pub fn new(target: Target, limits: Limits) -> Self {
        Matcher {
            mode: target.mode(),
            target,
            limits,
            owner: None,
        }
    }

    /// Only consider processes owned by the given user, if any.
    pub fn owned_by(mut self, owner: Option<uid_t>) -> Self {
        self.owner = owner;
        self
    }

    /// Opens the registry and starts a scan. Failing to open the registry is the only error; every
    /// failure after that only skips the affected process.
    pub fn scan<'a, R: Registry>(&'a self, registry: &'a R) -> Result<Matches<'a, R>, Error> {
        Ok(Matches {
            matcher: self,
            registry,
            pids: registry.pids()?,
            scanned: 0,
        })
    }

    /// Derives the string that is compared against the target, or `None` if the process could not
    /// be inspected or its identity does not fit within the limits.
    pub fn identity<R: Registry>(&self, registry: &R, pid: Pid) -> Option<Vec<u8>> {
        match self.mode {
            MatchMode::Path => {
                let exe = registry.executable(pid).ok()?.into_os_string().into_vec();
                (exe.len() <= self.limits.max_path_len).then_some(exe)
            }
            MatchMode::Name => {
                let record = registry.cmdline(pid, self.limits.max_cmdline_len).ok()?;
                let argument = first_argument(&record, self.limits.max_cmdline_len)?;
                Some(basename(argument).to_vec())
            }
        }
    }

    pub fn is_match(&self, identity: &[u8]) -> bool {
        identity == self.target.as_bytes()
    }

    fn is_owner<R: Registry>(&self, registry: &R, pid: Pid) -> bool {
        match self.owner {
            Some(uid) => registry.owner(pid).map(|owner| owner == uid).unwrap_or(false),
            None => true,
        }
    }
}

impl<R> Matches<'_, R> {
    /// Number of processes examined so far.
    pub fn scanned(&self) -> usize {
        self.scanned
    }
}

impl<R: Registry> Iterator for Matches<'_, R> {
    type Item = Match;

    fn next(&mut self) -> Option<Self::Item> {
        for pid in self.pids.by_ref() {
            self.scanned += 1;

            if !self.matcher.is_owner(self.registry, pid) {
                continue;
            }

            match self.matcher.identity(self.registry, pid) {
                Some(identity) if self.matcher.is_match(&identity) => {
                    return Some(Match { pid, identity });
                }
                _ => continue,
            }
        }

        None
    }
}

impl Match {
    pub fn identity_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.identity)
    }
}

/// Extracts the first argument of a NUL-separated argument record.
///
/// Returns `None` for empty records and for first arguments longer than `limit`.
pub fn first_argument(record: &[u8], limit: usize) -> Option<&[u8]> {
    if record.is_empty() {
        return None;
    }

    match record.iter().position(|&b| b == 0) {
        Some(end) if end <= limit => Some(&record[..end]),
        Some(_) => None,
        // Some processes rewrite their argument vector without a terminator.
        None if record.len() <= limit => Some(record),
        None => None,
    }
}

pub fn basename(argument: &[u8]) -> &[u8] {
    argument
        .rsplit(|&b| b == b'/')
        .next()
        .unwrap_or(argument)
}
