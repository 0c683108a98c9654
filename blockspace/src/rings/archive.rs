//! Persistent record of which chains were found closable.
//!
//! The archive is an append-only index file with one line per chain,
//! `<chain id> <record id> <T|F>`, plus one conformation blob per closable record kept by a
//! [`ConformationStore`]. Several processes may share the same files: writers serialize on an
//! exclusive lock of the index file, readers pick up flushed lines without locking.

use super::{ClosableChain, PathSubGraph};
use crate::library::BlockRef;
use crate::settings::RingClosureSettings;
use crate::util::log;
use error_stack::{Report, ResultExt, bail};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Debug, derive_more::Display)]
#[debug("R({_0})")]
#[display("{_0}")]
pub struct RecordId(pub u64);

/// Opaque geometry data for a closable chain, produced and consumed outside this crate.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ClosingConformations(pub Vec<u8>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Closability {
    /// The chain was never evaluated.
    Unknown,
    NotClosable,
    Closable(RecordId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("the archive files could not be accessed")]
    Io,
    #[error("could not lock the archive index after {attempts} attempts")]
    LockUnavailable { attempts: u32 },
    #[error("chain {0} is already archived")]
    DuplicateRecord(String),
    #[error("an empty path has no chain to archive")]
    EmptyChain,
    #[error("archive index is corrupt at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
    #[error("no conformations are archived for record {0:?}")]
    UnknownRecord(RecordId),
}

impl ArchiveError {
    /// Whether trying again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ArchiveError::LockUnavailable { .. })
    }
}

/// Where conformation blobs live.
pub trait ConformationStore: Debug + Send + Sync {
    fn store(&self, record: RecordId, conformations: &ClosingConformations) -> std::io::Result<()>;

    fn load(&self, record: RecordId) -> std::io::Result<ClosingConformations>;
}

/// Keeps each blob in `<dir>/<record id>.ser`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryStore { dir: dir.into() }
    }

    fn path(&self, record: RecordId) -> PathBuf {
        self.dir.join(format!("{record}.ser"))
    }
}

impl ConformationStore for DirectoryStore {
    fn store(&self, record: RecordId, conformations: &ClosingConformations) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = File::create(self.path(record))?;
        file.write_all(&conformations.0)?;
        file.sync_all()
    }

    fn load(&self, record: RecordId) -> std::io::Result<ClosingConformations> {
        std::fs::read(self.path(record)).map(ClosingConformations)
    }
}

#[derive(Debug, Default)]
struct ArchiveState {
    by_chain: HashMap<String, (RecordId, bool)>,
    closable_by_turning_point: HashMap<BlockRef, Vec<ClosableChain>>,
    next_record: u64,
    read_offset: u64,
    lines_read: usize,
}

impl ArchiveState {
    /// Records one index line. Leaves the state untouched on error.
    fn ingest(&mut self, line: &str) -> Result<(), ArchiveError> {
        let line_number = self.lines_read + 1;
        let corrupt = |reason: String| ArchiveError::Corrupt {
            line: line_number,
            reason,
        };
        let mut fields = line.split_whitespace();
        let (Some(chain_id), Some(record), Some(flag), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(corrupt(format!("expected three fields in {line:?}")));
        };
        let record: u64 = record
            .parse()
            .map_err(|_| corrupt(format!("bad record id {record:?}")))?;
        if record != self.next_record {
            return Err(corrupt(format!(
                "record id {record} out of sequence, expected {}",
                self.next_record
            )));
        }
        let closable = match flag {
            "T" => true,
            "F" => false,
            other => return Err(corrupt(format!("bad closability flag {other:?}"))),
        };
        if self.by_chain.contains_key(chain_id) {
            return Err(corrupt(format!("duplicate chain {chain_id}")));
        }
        let chain = ClosableChain::parse(chain_id).map_err(|e| corrupt(e.to_string()))?;
        if closable {
            if let Some(block) = chain.turning_point_link().and_then(|l| l.block()) {
                self.closable_by_turning_point
                    .entry(block)
                    .or_default()
                    .push(chain);
            }
        }
        self.by_chain
            .insert(chain_id.to_string(), (RecordId(record), closable));
        self.next_record += 1;
        Ok(())
    }

    fn lookup(&self, ids: &[String]) -> Option<(RecordId, bool)> {
        ids.iter().find_map(|id| self.by_chain.get(id).copied())
    }
}

#[derive(Debug)]
pub struct RingClosuresArchive {
    index_path: PathBuf,
    store: Box<dyn ConformationStore>,
    lock_attempts: u32,
    lock_retry_delay: Duration,
    state: RwLock<ArchiveState>,
}

impl RingClosuresArchive {
    /// Opens (creating if needed) the index at `index_path` and loads every record in it.
    pub fn open(
        index_path: impl Into<PathBuf>,
        store: impl ConformationStore + 'static,
        settings: &RingClosureSettings,
    ) -> Result<Self, Report<ArchiveError>> {
        let index_path = index_path.into();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&index_path)
            .change_context(ArchiveError::Io)
            .attach_printable_lazy(|| format!("index file {}", index_path.display()))?;
        let archive = RingClosuresArchive {
            index_path,
            store: Box::new(store),
            lock_attempts: settings.lock_attempts.max(1),
            lock_retry_delay: settings.lock_retry_delay,
            state: RwLock::new(ArchiveState::default()),
        };
        let loaded = archive.refresh()?;
        log::debug!(
            "Opened ring-closure archive {} with {loaded} records",
            archive.index_path.display()
        );
        Ok(archive)
    }

    /// An archive keeping its index as `index.txt` and its blobs next to it in `dir`.
    pub fn open_in_dir(
        dir: impl AsRef<Path>,
        settings: &RingClosureSettings,
    ) -> Result<Self, Report<ArchiveError>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).change_context(ArchiveError::Io)?;
        Self::open(dir.join("index.txt"), DirectoryStore::new(dir), settings)
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn len(&self) -> usize {
        self.state.read().by_chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads lines appended since the last refresh. Partially written trailing lines are left
    /// for a later call. Returns the number of new records.
    pub fn refresh(&self) -> Result<usize, Report<ArchiveError>> {
        let mut state = self.state.write();
        let mut file = File::open(&self.index_path).change_context(ArchiveError::Io)?;
        file.seek(SeekFrom::Start(state.read_offset))
            .change_context(ArchiveError::Io)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).change_context(ArchiveError::Io)?;
        let Some(complete) = buf.iter().rposition(|b| *b == b'\n') else {
            return Ok(0);
        };
        let mut added = 0;
        for raw in buf[..=complete].split_inclusive(|b| *b == b'\n') {
            let line = String::from_utf8_lossy(raw);
            if !line.trim().is_empty() {
                state.ingest(line.trim_end()).map_err(|e| {
                    Report::new(e)
                        .attach_printable(format!("index file {}", self.index_path.display()))
                })?;
                added += 1;
            }
            state.lines_read += 1;
            state.read_offset += raw.len() as u64;
        }
        Ok(added)
    }

    pub fn closability(&self, path: &PathSubGraph) -> Closability {
        match self.state.read().lookup(path.alternative_ids()) {
            Some((record, true)) => Closability::Closable(record),
            Some((_, false)) => Closability::NotClosable,
            None => Closability::Unknown,
        }
    }

    pub fn contains_chain(&self, path: &PathSubGraph) -> bool {
        self.closability(path) != Closability::Unknown
    }

    /// Conformations archived for a closable record.
    pub fn conformations(&self, record: RecordId) -> Result<ClosingConformations, Report<ArchiveError>> {
        let known = self
            .state
            .read()
            .by_chain
            .values()
            .any(|(r, closable)| *r == record && *closable);
        if !known {
            bail!(ArchiveError::UnknownRecord(record));
        }
        self.store
            .load(record)
            .change_context(ArchiveError::Io)
            .attach_printable_lazy(|| format!("loading conformations of {record:?}"))
    }

    /// Closable chains whose turning point is an instance of `block`.
    pub fn closable_chains_with_turning_point(&self, block: BlockRef) -> Vec<ClosableChain> {
        self.state
            .read()
            .closable_by_turning_point
            .get(&block)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self, file: &File) -> Result<(), Report<ArchiveError>> {
        for attempt in 1..=self.lock_attempts {
            match file.try_lock() {
                Ok(()) => return Ok(()),
                Err(TryLockError::WouldBlock) => {
                    log::warn!(
                        "Archive index {} is locked (attempt {attempt}/{})",
                        self.index_path.display(),
                        self.lock_attempts
                    );
                    std::thread::sleep(self.lock_retry_delay);
                }
                Err(TryLockError::Error(e)) => {
                    return Err(Report::new(e).change_context(ArchiveError::Io));
                }
            }
        }
        bail!(ArchiveError::LockUnavailable {
            attempts: self.lock_attempts
        })
    }

    /// Appends the verdict for `path`, storing `conformations` first when the chain is closable.
    ///
    /// Fails with [`ArchiveError::DuplicateRecord`] if any alternative id of the chain is already
    /// archived, including records appended by other processes.
    pub fn store_entry(
        &self,
        path: &PathSubGraph,
        closable: bool,
        conformations: Option<&ClosingConformations>,
    ) -> Result<RecordId, Report<ArchiveError>> {
        if path.chain_id().is_empty() {
            bail!(ArchiveError::EmptyChain);
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.index_path)
            .change_context(ArchiveError::Io)?;
        self.lock(&file)?;
        let result = self.append_locked(&mut file, path, closable, conformations);
        if let Err(e) = file.unlock() {
            log::error!("Could not unlock archive index: {e}");
        }
        result
    }

    fn append_locked(
        &self,
        file: &mut File,
        path: &PathSubGraph,
        closable: bool,
        conformations: Option<&ClosingConformations>,
    ) -> Result<RecordId, Report<ArchiveError>> {
        self.refresh()?;
        let record = {
            let state = self.state.read();
            if let Some((existing, _)) = state.lookup(path.alternative_ids()) {
                return Err(Report::new(ArchiveError::DuplicateRecord(path.chain_id().to_string()))
                    .attach_printable(format!("archived as {existing:?}")));
            }
            RecordId(state.next_record)
        };
        if closable {
            let blob = conformations.cloned().unwrap_or_default();
            self.store
                .store(record, &blob)
                .change_context(ArchiveError::Io)?;
        }
        let flag = if closable { "T" } else { "F" };
        writeln!(file, "{} {record} {flag}", path.chain_id()).change_context(ArchiveError::Io)?;
        file.flush().change_context(ArchiveError::Io)?;
        file.sync_data().change_context(ArchiveError::Io)?;
        self.refresh()?;
        log::debug!("Archived chain {} as {record:?} ({flag})", path.chain_id());
        Ok(record)
    }
}
