//! stream reader configuration
use crate::binlog::event::EventKind;
use myrepl_core::binlog::gtid::GtidSet;
use smol_str::SmolStr;

/// how and where the dump starts, plus what gets delivered
///
/// exactly one of file/position and auto-position gtid mode drives
/// the session; setting `auto_position` wins
#[derive(Debug, Clone)]
pub struct BinlogOptions {
    pub server_id: u32,
    /// start from the given position instead of the file head
    pub resume_stream: bool,
    /// ask the master to keep the dump open at end of logs
    pub blocking: bool,
    pub only_events: Option<Vec<EventKind>>,
    pub ignored_events: Option<Vec<EventKind>>,
    pub filter_non_implemented_events: bool,
    pub log_file: Option<String>,
    pub log_pos: Option<u32>,
    pub auto_position: Option<GtidSet>,
    pub only_tables: Option<Vec<SmolStr>>,
    pub only_schemas: Option<Vec<SmolStr>>,
    /// cache each table's schema forever after the first lookup;
    /// faster, but ALTER TABLE goes unnoticed
    pub freeze_schema: bool,
}

impl BinlogOptions {
    pub fn new(server_id: u32) -> Self {
        BinlogOptions {
            server_id,
            resume_stream: false,
            blocking: true,
            only_events: None,
            ignored_events: None,
            filter_non_implemented_events: true,
            log_file: None,
            log_pos: None,
            auto_position: None,
            only_tables: None,
            only_schemas: None,
            freeze_schema: false,
        }
    }

    pub fn resume_stream(mut self, resume: bool) -> Self {
        self.resume_stream = resume;
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn only_events(mut self, events: Vec<EventKind>) -> Self {
        self.only_events = Some(events);
        self
    }

    pub fn ignored_events(mut self, events: Vec<EventKind>) -> Self {
        self.ignored_events = Some(events);
        self
    }

    pub fn filter_non_implemented_events(mut self, filter: bool) -> Self {
        self.filter_non_implemented_events = filter;
        self
    }

    pub fn position<F: Into<String>>(mut self, log_file: F, log_pos: u32) -> Self {
        self.log_file = Some(log_file.into());
        self.log_pos = Some(log_pos);
        self
    }

    pub fn auto_position(mut self, gtid_set: GtidSet) -> Self {
        self.auto_position = Some(gtid_set);
        self
    }

    pub fn only_tables<I, T>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SmolStr>,
    {
        self.only_tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    pub fn only_schemas<I, T>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SmolStr>,
    {
        self.only_schemas = Some(schemas.into_iter().map(Into::into).collect());
        self
    }

    pub fn freeze_schema(mut self, freeze: bool) -> Self {
        self.freeze_schema = freeze;
        self
    }
}
