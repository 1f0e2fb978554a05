//! The table log engine.
//!
//! Each table is one root container kept in its own operation log file.
//! The file is the table's only durable form: loading replays it, mutation
//! appends to it, and compaction rewrites it to a minimal snapshot of the
//! current state.

use crate::config::TableOptions;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventFeed, TableEvent};
use crate::handle::NodeHandle;
use chrono::{TimeZone, Utc};
use oplogdb_codec::{apply, encode_line, parse_line, serialize_root, KeyPath, Operation, Value};
use oplogdb_storage::{FileBackend, StorageBackend, StorageError};
use parking_lot::{Mutex, RwLock};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tempfile::NamedTempFile;

/// File size (bytes) at which loads switch to the streaming strategy.
///
/// Below this, the whole file is read and replayed in one pass, which is
/// faster for small and medium tables. At or above it, operations are read
/// and executed one line at a time, and compaction-on-load is disabled.
pub const STREAMING_LOAD_THRESHOLD: u64 = 500_000_000;

/// Lifecycle state of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Being created or loaded; appends are synchronous.
    Initializing,
    /// Open for mutation; appends are queued to the writer thread.
    Live,
    /// Close in progress; the append queue is draining.
    Closing,
    /// Closed; mutation fails with [`CoreError::TableClosed`].
    Closed,
}

/// Work items for the background writer thread.
enum Job {
    /// Append this log text.
    Write(String),
    /// Acknowledge once every prior job has been processed.
    Barrier(Sender<()>),
}

/// State shared between a [`Table`], its node handles, and its queries.
pub(crate) struct TableShared {
    name: String,
    path: PathBuf,
    pub(crate) root: RwLock<Value>,
    state: RwLock<TableState>,
    backend: Arc<Mutex<Box<dyn StorageBackend>>>,
    queue: Mutex<Option<Sender<Job>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<Mutex<Option<StorageError>>>,
    events: Arc<EventFeed>,
    options: TableOptions,
}

impl TableShared {
    /// Hands a batch of already-serialized operations to the durable log.
    ///
    /// During initialization the append happens synchronously; once live,
    /// the batch is queued to the writer thread and drains in FIFO order.
    /// A failure recorded by an earlier queued append surfaces here, on
    /// the next mutation: the mutation that triggered the failed append
    /// was applied in memory but is not guaranteed durable.
    pub(crate) fn persist(&self, ops: &[Operation]) -> CoreResult<()> {
        if let Some(error) = self.pending.lock().take() {
            return Err(error.into());
        }

        let change: String = ops.iter().map(encode_line).collect();
        match *self.state.read() {
            TableState::Initializing => {
                let mut backend = self.backend.lock();
                backend.append(change.as_bytes())?;
                backend.flush()?;
                Ok(())
            }
            TableState::Live => {
                let queue = self.queue.lock();
                let sender = queue.as_ref().ok_or(CoreError::TableClosed)?;
                sender
                    .send(Job::Write(change))
                    .map_err(|_| CoreError::TableClosed)
            }
            TableState::Closing | TableState::Closed => Err(CoreError::TableClosed),
        }
    }

    pub(crate) fn state(&self) -> TableState {
        *self.state.read()
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Blocks until every queued append has been processed.
    fn drain(&self) {
        let sender = self.queue.lock().clone();
        if let Some(sender) = sender {
            let (ack_tx, ack_rx) = mpsc::channel();
            if sender.send(Job::Barrier(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
    }
}

impl std::fmt::Debug for TableShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableShared")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

/// One persisted table: a root container bound to an append-only log file.
///
/// A table is either created fresh from a root value or loaded from an
/// existing file. Mutation happens through [`Table::root`] and the node
/// handles it hands out; every mutation is applied to memory synchronously
/// and appended to the log in submission order.
///
/// ```no_run
/// use oplogdb_core::Table;
/// use oplogdb_codec::Value;
///
/// let table = Table::create(
///     "data/settings.olf".as_ref(),
///     Value::object(vec![("darkMode".into(), Value::from(true))]),
/// )?;
/// table.root().set("fontSize", 16)?;
/// table.close()?;
/// # Ok::<(), oplogdb_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct Table {
    shared: Arc<TableShared>,
}

impl Table {
    /// Creates a new table at `path`, populated with `root`.
    ///
    /// The header and the serialized root are written and flushed before
    /// this returns; a process crash immediately afterwards loses nothing.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnsupportedType`] if `root` is not an object or array
    /// - [`CoreError::TableConflict`] if a non-empty table file already
    ///   exists at `path` (delete the table first)
    /// - I/O errors from creating or writing the file
    pub fn create(path: &Path, root: Value) -> CoreResult<Self> {
        Self::create_with_options(path, root, TableOptions::default())
    }

    /// Creates a new table with explicit options.
    ///
    /// # Errors
    ///
    /// See [`Table::create`].
    pub fn create_with_options(
        path: &Path,
        root: Value,
        options: TableOptions,
    ) -> CoreResult<Self> {
        let started = Instant::now();

        if !root.is_container() || matches!(root, Value::Instance { .. }) {
            return Err(CoreError::UnsupportedType { kind: root.kind() });
        }
        if path.exists() && std::fs::metadata(path)?.len() > 0 {
            return Err(CoreError::TableConflict {
                path: path.to_path_buf(),
            });
        }

        let root = normalize_value(root);
        let ops = serialize_root(&root)?;

        let backend = FileBackend::open(path)?;
        let shared = Arc::new(TableShared {
            name: table_name(path),
            path: path.to_path_buf(),
            root: RwLock::new(root),
            state: RwLock::new(TableState::Initializing),
            backend: Arc::new(Mutex::new(Box::new(backend) as Box<dyn StorageBackend>)),
            queue: Mutex::new(None),
            writer: Mutex::new(None),
            pending: Arc::new(Mutex::new(None)),
            events: Arc::new(EventFeed::new()),
            options,
        });

        shared.persist(&ops)?;
        shared.backend.lock().sync()?;
        go_live(&shared);

        tracing::debug!(
            table = %shared.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "table created and persisted"
        );
        Ok(Self { shared })
    }

    /// Loads the table at `path`, replaying its operation log.
    ///
    /// # Errors
    ///
    /// A missing file is fatal and propagates as an I/O error. Corrupt log
    /// content fails the load with a codec or [`CoreError::Corrupt`] error.
    pub fn load(path: &Path) -> CoreResult<Self> {
        Self::load_with_options(path, TableOptions::default())
    }

    /// Loads the table at `path` with explicit options.
    ///
    /// The load strategy is chosen by file size against
    /// [`STREAMING_LOAD_THRESHOLD`], or forced with
    /// [`TableOptions::always_stream`]. Both strategies produce identical
    /// values for the same file; streaming loads never compact on load.
    ///
    /// # Errors
    ///
    /// See [`Table::load`].
    pub fn load_with_options(path: &Path, options: TableOptions) -> CoreResult<Self> {
        let started = Instant::now();

        let backend = FileBackend::open_existing(path)?;
        let size = backend.size()?;
        let streaming = options.always_stream || size >= STREAMING_LOAD_THRESHOLD;

        let mut slot: Option<Value> = None;
        if streaming {
            tracing::debug!(table = %table_name(path), size, "streaming table load");
            let reader = BufReader::new(backend.reader()?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                apply(&mut slot, &parse_line(&line)?)?;
            }
        } else {
            let bytes = backend.read_at(0, size as usize)?;
            let text = String::from_utf8(bytes)
                .map_err(|_| CoreError::corrupt("table file is not valid UTF-8"))?;
            for line in text.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                apply(&mut slot, &parse_line(line)?)?;
            }
        }

        let replayed = slot.ok_or_else(|| {
            CoreError::corrupt("table file contains no create-root operation")
        })?;
        let root = options.type_registry.resolve_tree(replayed);

        // Streaming loads skip compaction unconditionally; rewriting a file
        // that was too big to hold in memory defeats the point.
        let compact_after_load = options.compact_on_load && !streaming;

        let shared = Arc::new(TableShared {
            name: table_name(path),
            path: path.to_path_buf(),
            root: RwLock::new(root),
            state: RwLock::new(TableState::Initializing),
            backend: Arc::new(Mutex::new(Box::new(backend) as Box<dyn StorageBackend>)),
            queue: Mutex::new(None),
            writer: Mutex::new(None),
            pending: Arc::new(Mutex::new(None)),
            events: Arc::new(EventFeed::new()),
            options,
        });
        go_live(&shared);

        let table = Self { shared };
        if compact_after_load {
            table.compact()?;
        } else if !streaming {
            tracing::debug!(
                table = %table.shared.name,
                "compaction on load disabled; updated and deleted data remains on disk"
            );
        }

        tracing::debug!(
            table = %table.shared.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            streaming,
            "table loaded"
        );
        Ok(table)
    }

    /// A handle on the table's root container.
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        NodeHandle::new(Arc::clone(&self.shared), KeyPath::root())
    }

    /// The table's name (the file stem of its path).
    #[must_use]
    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// The table's file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TableState {
        self.shared.state()
    }

    /// A deep copy of the table's current value.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.shared.root.read().clone()
    }

    /// Subscribes to this table's events.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<TableEvent> {
        self.shared.events.subscribe()
    }

    /// Rewrites the table file as a minimal snapshot of the current value.
    ///
    /// All intermediate update and delete history is discarded, which is
    /// the point: compaction both shrinks the file and removes old data
    /// from disk (a privacy consideration — disable `compact_on_load` if
    /// the history itself is the data). The snapshot is written to a
    /// temporary file and atomically renamed over the table file, so a
    /// concurrent loader never observes a partially-written table.
    ///
    /// # Errors
    ///
    /// I/O failures propagate; the in-memory value is unaffected.
    pub fn compact(&self) -> CoreResult<()> {
        if self.shared.state() != TableState::Live {
            return Err(CoreError::TableClosed);
        }
        let started = Instant::now();

        // Holding the root lock for the whole rewrite keeps mutators out;
        // the queue drain below cannot deadlock because the writer thread
        // never touches the root.
        let root = self.shared.root.read();
        self.shared.drain();

        let text: String = serialize_root(&root)?.iter().map(encode_line).collect();

        let directory = self.shared.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(directory)?;
        temp.write_all(text.as_bytes())?;
        temp.as_file_mut().sync_all()?;
        temp.persist(&self.shared.path)
            .map_err(|error| CoreError::Io(error.error))?;

        // The old append handle points at the replaced inode; reopen.
        *self.shared.backend.lock() =
            Box::new(FileBackend::open_existing(&self.shared.path)?) as Box<dyn StorageBackend>;
        drop(root);

        tracing::debug!(
            table = %self.shared.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = text.len(),
            "table compacted"
        );
        Ok(())
    }

    /// Closes the table: drains the append queue, flushes, and syncs.
    ///
    /// After close, a fresh [`Table::load`] re-reads the file from disk;
    /// no process-level cache can serve a stale copy. Closing an already
    /// closed table is a no-op.
    ///
    /// # Errors
    ///
    /// Surfaces any append failure recorded by the writer thread, and I/O
    /// errors from the final flush.
    pub fn close(&self) -> CoreResult<()> {
        {
            let mut state = self.shared.state.write();
            if *state == TableState::Closed {
                return Ok(());
            }
            *state = TableState::Closing;
        }

        // Dropping the sender ends the writer loop once the queue is empty.
        drop(self.shared.queue.lock().take());
        if let Some(writer) = self.shared.writer.lock().take() {
            let _ = writer.join();
        }

        {
            let mut backend = self.shared.backend.lock();
            backend.flush()?;
            backend.sync()?;
        }
        *self.shared.state.write() = TableState::Closed;

        tracing::debug!(table = %self.shared.name, "table closed");
        if let Some(error) = self.shared.pending.lock().take() {
            return Err(error.into());
        }
        Ok(())
    }

    /// Closes the table, removes its file, and notifies subscribers with
    /// [`TableEvent::Deleted`].
    ///
    /// # Errors
    ///
    /// Propagates close and file-removal failures.
    pub fn delete(self) -> CoreResult<()> {
        self.close()?;
        std::fs::remove_file(&self.shared.path)?;
        self.shared.events.emit(TableEvent::Deleted {
            name: self.shared.name.clone(),
        });
        tracing::debug!(table = %self.shared.name, "table deleted");
        Ok(())
    }
}

fn go_live(shared: &Arc<TableShared>) {
    let (sender, handle) = spawn_writer(
        Arc::clone(&shared.backend),
        Arc::clone(&shared.pending),
        Arc::clone(&shared.events),
        shared.options.sync_on_write,
    );
    *shared.queue.lock() = Some(sender);
    *shared.writer.lock() = Some(handle);
    *shared.state.write() = TableState::Live;
}

/// The writer thread: one per table, appending queued changes in FIFO
/// order. The first append failure is recorded and surfaced on the next
/// table operation; the in-memory graph already reflects the change.
fn spawn_writer(
    backend: Arc<Mutex<Box<dyn StorageBackend>>>,
    pending: Arc<Mutex<Option<StorageError>>>,
    events: Arc<EventFeed>,
    sync_on_write: bool,
) -> (Sender<Job>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel::<Job>();
    let handle = std::thread::spawn(move || {
        while let Ok(job) = receiver.recv() {
            match job {
                Job::Write(change) => {
                    let result = {
                        let mut backend = backend.lock();
                        backend.append(change.as_bytes()).and_then(|_| {
                            backend.flush()?;
                            if sync_on_write {
                                backend.sync()?;
                            }
                            Ok(())
                        })
                    };
                    match result {
                        Ok(()) => events.emit(TableEvent::Persisted { change }),
                        Err(error) => {
                            tracing::warn!(
                                error = %error,
                                "append failed; change applied in memory but not durable"
                            );
                            let mut pending = pending.lock();
                            if pending.is_none() {
                                *pending = Some(error);
                            }
                        }
                    }
                }
                Job::Barrier(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    });
    (sender, handle)
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Normalizes a value entering the store.
///
/// Dates are truncated to millisecond precision, the precision of the log
/// format, so the in-memory graph always equals its own replay.
pub(crate) fn normalize_value(value: Value) -> Value {
    match value {
        Value::Date(d) => {
            let truncated = Utc.timestamp_millis_opt(d.timestamp_millis()).single();
            Value::Date(truncated.unwrap_or(d))
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, normalize_value(v)))
                .collect(),
        ),
        Value::Instance { tag, fields } => Value::Instance {
            tag,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k, normalize_value(v)))
                .collect(),
        },
        scalar => scalar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings_root() -> Value {
        Value::object(vec![
            ("darkMode".into(), Value::from("auto")),
            (
                "colours".into(),
                Value::object(vec![
                    ("red".into(), Value::from("#FF5E00")),
                    ("green".into(), Value::from("#00FF5E")),
                ]),
            ),
        ])
    }

    #[test]
    fn create_writes_header_and_children() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.olf");

        let table = Table::create(&path, settings_root()).unwrap();
        assert_eq!(table.name(), "settings");
        assert_eq!(table.state(), TableState::Live);
        table.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("_ = {};\n"));
        assert!(text.contains("_['darkMode'] = `auto`;\n"));
        assert!(text.contains("_['colours']['red'] = `#FF5E00`;\n"));
    }

    #[test]
    fn create_rejects_scalar_roots() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.olf");

        let result = Table::create(&path, Value::from(42));
        assert!(matches!(
            result,
            Err(CoreError::UnsupportedType { kind: "number" })
        ));
        // Nothing was created.
        assert!(!path.exists());
    }

    #[test]
    fn create_over_existing_table_conflicts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.olf");

        let table = Table::create(&path, settings_root()).unwrap();
        table.close().unwrap();

        let result = Table::create(&path, Value::Object(vec![]));
        assert!(matches!(result, Err(CoreError::TableConflict { .. })));
    }

    #[test]
    fn load_of_missing_path_is_fatal() {
        let dir = tempdir().unwrap();
        let result = Table::load(&dir.path().join("absent.olf"));
        assert!(matches!(result, Err(CoreError::Storage(_))));
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.olf");
        let table = Table::create(&path, Value::Object(vec![])).unwrap();
        table.close().unwrap();
        table.close().unwrap();
        assert_eq!(table.state(), TableState::Closed);
    }

    #[test]
    fn mutation_after_close_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.olf");
        let table = Table::create(&path, Value::Object(vec![])).unwrap();
        table.close().unwrap();

        let result = table.root().set("a", 1);
        assert!(matches!(result, Err(CoreError::TableClosed)));
    }

    #[test]
    fn delete_removes_file_and_notifies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doomed.olf");
        let table = Table::create(&path, Value::Object(vec![])).unwrap();
        let events = table.subscribe();

        table.delete().unwrap();
        assert!(!path.exists());
        assert_eq!(
            events.recv().unwrap(),
            TableEvent::Deleted {
                name: "doomed".into()
            }
        );
    }

    #[test]
    fn dates_normalize_to_millis() {
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let normalized = normalize_value(Value::Date(precise));
        match normalized {
            Value::Date(d) => assert_eq!(d.timestamp_subsec_nanos(), 123_000_000),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
