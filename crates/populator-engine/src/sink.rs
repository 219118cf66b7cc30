//! Record sinks: where a job's records land.
//!
//! One sink per output mode. A sink splits keyed records itself, so the
//! tokenizer only deals in raw records.

use std::sync::Arc;

use memchr::memmem;
use populator_arena::{Arena, Block};
use populator_core::OutputMode;
use populator_store::{lock_unpoisoned, SharedList, SharedStore, StoreRegistry, Target};

use crate::diag::Diagnostics;
use crate::error::JobError;

/// Destination for the records of one job.
pub trait RecordSink: Send {
    /// The output mode this sink implements.
    fn mode(&self) -> OutputMode;

    /// Store one non-empty record.
    fn accept(&mut self, record: &[u8], diag: &mut Diagnostics) -> Result<(), JobError>;
}

/// Split `record` at the first occurrence of `sub`.
///
/// Without a sub-delimiter the whole record is the key and the value is
/// empty.
pub fn split_pair<'r>(record: &'r [u8], sub: &[u8]) -> (&'r [u8], &'r [u8]) {
    match memmem::find(record, sub) {
        Some(pos) => (&record[..pos], &record[pos + sub.len()..]),
        None => (record, &record[record.len()..]),
    }
}

/// Build the sink for `mode`.
///
/// `target` is ignored in [`OutputMode::Vars`], which writes scalars found
/// through `registry`.
pub(crate) fn for_mode(
    mode: OutputMode,
    target: Option<Target>,
    sub_delimiter: Block,
    registry: &Arc<StoreRegistry>,
) -> Option<Box<dyn RecordSink>> {
    let sink: Box<dyn RecordSink> = match (mode, target) {
        (OutputMode::Hash, Some(Target::Map(store))) => Box::new(MapSink::new(store, sub_delimiter)),
        (OutputMode::Array, Some(Target::Array(list))) => Box::new(ListSink::new(list)),
        (OutputMode::Vars, _) => Box::new(ScalarSink::new(Arc::clone(registry), sub_delimiter)),
        _ => return None,
    };
    Some(sink)
}

// ── Hash ──────────────────────────────────────────────────────────

/// Writes key/value pairs into a store, one lock per record.
pub struct MapSink {
    store: SharedStore,
    sub: Block,
}

impl MapSink {
    /// Write into `store`, splitting records at `sub`.
    pub fn new(store: SharedStore, sub: Block) -> Self {
        Self { store, sub }
    }
}

impl RecordSink for MapSink {
    fn mode(&self) -> OutputMode {
        OutputMode::Hash
    }

    fn accept(&mut self, record: &[u8], diag: &mut Diagnostics) -> Result<(), JobError> {
        let (key, value) = split_pair(record, &self.sub);
        if key.is_empty() {
            diag.trace(format_args!(
                "skipping record with empty key: {}",
                String::from_utf8_lossy(record)
            ));
            return Ok(());
        }
        lock_unpoisoned(&self.store)
            .insert_or_update(key, value)
            .map_err(JobError::Allocation)
    }
}

// ── Array ─────────────────────────────────────────────────────────

/// Appends every record to a record list.
pub struct ListSink {
    list: SharedList,
}

impl ListSink {
    /// Append into `list`.
    pub fn new(list: SharedList) -> Self {
        Self { list }
    }
}

impl RecordSink for ListSink {
    fn mode(&self) -> OutputMode {
        OutputMode::Array
    }

    fn accept(&mut self, record: &[u8], _diag: &mut Diagnostics) -> Result<(), JobError> {
        lock_unpoisoned(&self.list)
            .push(record)
            .map_err(JobError::Allocation)
    }
}

// ── Vars ──────────────────────────────────────────────────────────

/// Assigns values to pre-existing scalar bindings named by the keys.
pub struct ScalarSink {
    registry: Arc<StoreRegistry>,
    sub: Block,
}

impl ScalarSink {
    /// Look scalars up through `registry`, splitting records at `sub`.
    pub fn new(registry: Arc<StoreRegistry>, sub: Block) -> Self {
        Self { registry, sub }
    }

    fn arena(&self) -> &Arena {
        self.registry.arena()
    }
}

impl RecordSink for ScalarSink {
    fn mode(&self) -> OutputMode {
        OutputMode::Vars
    }

    fn accept(&mut self, record: &[u8], diag: &mut Diagnostics) -> Result<(), JobError> {
        let (key, value) = split_pair(record, &self.sub);
        let cell = std::str::from_utf8(key)
            .ok()
            .and_then(|name| self.registry.scalar(name));
        let Some(cell) = cell else {
            diag.warn(format_args!(
                "no such variable: {}",
                String::from_utf8_lossy(key)
            ));
            return Ok(());
        };
        let copy = self.arena().duplicate(value).map_err(JobError::Allocation)?;
        cell.set(copy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use populator_core::{ScopeLevel, SlotId};
    use populator_store::{BindingTable, HostBindings, KvStore, RecordList};
    use std::sync::Mutex;

    use crate::stream::{CaptureSink, DiagnosticSink};

    #[test]
    fn split_at_first_sub_delimiter() {
        assert_eq!(split_pair(b"a:1:2", b":"), (&b"a"[..], &b"1:2"[..]));
        assert_eq!(split_pair(b"a=>b", b"=>"), (&b"a"[..], &b"b"[..]));
        assert_eq!(split_pair(b"bare", b":"), (&b"bare"[..], &b""[..]));
        assert_eq!(split_pair(b"k:", b":"), (&b"k"[..], &b""[..]));
    }

    #[test]
    fn map_sink_inserts_and_updates() {
        let arena = Arena::default();
        let store = Arc::new(Mutex::new(KvStore::with_default_size(arena.clone()).unwrap()));
        let mut sink = MapSink::new(Arc::clone(&store), arena.duplicate(b":").unwrap());
        let mut diag = Diagnostics::disabled(SlotId(0));
        sink.accept(b"a:1", &mut diag).unwrap();
        sink.accept(b"a:2", &mut diag).unwrap();
        sink.accept(b"b", &mut diag).unwrap();
        let store = lock_unpoisoned(&store);
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup(b"a"), Some(&b"2"[..]));
        assert_eq!(store.lookup(b"b"), Some(&b""[..]));
    }

    #[test]
    fn list_sink_appends_raw_records() {
        let arena = Arena::default();
        let list = Arc::new(Mutex::new(RecordList::new(arena)));
        let mut sink = ListSink::new(Arc::clone(&list));
        let mut diag = Diagnostics::disabled(SlotId(0));
        sink.accept(b"x:1", &mut diag).unwrap();
        sink.accept(b"y", &mut diag).unwrap();
        let list = lock_unpoisoned(&list);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![&b"x:1"[..], &b"y"[..]]);
    }

    #[test]
    fn scalar_sink_sets_existing_and_warns_on_missing() {
        let arena = Arena::default();
        let table = Arc::new(BindingTable::new());
        let cell = table.declare_scalar("host", ScopeLevel(2));
        let registry = Arc::new(StoreRegistry::new(table.clone(), arena.clone()));
        let mut sink = ScalarSink::new(registry, arena.duplicate(b"=").unwrap());

        let capture = CaptureSink::new();
        let mut diag = Diagnostics::new(
            Some(capture.try_clone_writer().unwrap()),
            SlotId(1),
            Default::default(),
        );
        sink.accept(b"host=example.org", &mut diag).unwrap();
        sink.accept(b"port=80", &mut diag).unwrap();

        assert_eq!(cell.get().as_deref(), Some(&b"example.org"[..]));
        assert!(table.lookup("port").is_none());
        assert_eq!(capture.contents(), "populator[1]: no such variable: port\n");
    }
}
