//! event filtering: which events reach the consumer
use crate::binlog::event::{BinlogEvent, EventKind};
use smol_str::SmolStr;
use std::collections::HashSet;

/// two-stage filter
///
/// the packet stage always keeps TableMap and Rotate because position
/// and table bookkeeping depend on them; the delivery stage applies
/// the consumer's event/schema/table selection
#[derive(Debug, Clone)]
pub struct EventFilter {
    allowed: HashSet<EventKind>,
    allowed_in_packet: HashSet<EventKind>,
    only_schemas: Option<Vec<SmolStr>>,
    only_tables: Option<Vec<SmolStr>>,
}

impl EventFilter {
    pub fn new(
        only_events: Option<Vec<EventKind>>,
        ignored_events: Option<Vec<EventKind>>,
        filter_non_implemented_events: bool,
        only_schemas: Option<Vec<SmolStr>>,
        only_tables: Option<Vec<SmolStr>>,
    ) -> Self {
        let mut allowed: HashSet<EventKind> = match only_events {
            Some(events) => events.into_iter().collect(),
            None => EventKind::all().into_iter().collect(),
        };
        if let Some(ignored) = ignored_events {
            for kind in ignored {
                allowed.remove(&kind);
            }
        }
        if filter_non_implemented_events {
            allowed.remove(&EventKind::NotImplemented);
        }
        let mut allowed_in_packet = allowed.clone();
        allowed_in_packet.insert(EventKind::TableMap);
        allowed_in_packet.insert(EventKind::Rotate);
        EventFilter {
            allowed,
            allowed_in_packet,
            only_schemas,
            only_tables,
        }
    }

    /// packet-level decision, before any decoding effort is spent
    pub fn allowed_in_packet(&self, kind: EventKind) -> bool {
        self.allowed_in_packet.contains(&kind)
    }

    /// delivery-level decision on the decoded event
    pub fn delivers(&self, event: &BinlogEvent) -> bool {
        if !self.allowed.contains(&event.kind()) {
            return false;
        }
        if let Some((schema, table)) = event.table_ref() {
            if let Some(ref only_schemas) = self.only_schemas {
                if !only_schemas.iter().any(|s| s == schema) {
                    return false;
                }
            }
            if let Some(ref only_tables) = self.only_tables {
                if !only_tables.iter().any(|t| t == table) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::event::RowsEvent;

    fn write_rows(schema: &str, table: &str) -> BinlogEvent {
        BinlogEvent::WriteRows(RowsEvent {
            table_id: 1,
            schema: SmolStr::from(schema),
            table: SmolStr::from(table),
            columns: vec![],
            rows: vec![],
        })
    }

    #[test]
    fn test_default_filters_not_implemented() {
        let filter = EventFilter::new(None, None, true, None, None);
        assert!(!filter.delivers(&BinlogEvent::NotImplemented { event_type: 29 }));
        assert!(filter.delivers(&BinlogEvent::Xid { xid: 1 }));
    }

    #[test]
    fn test_only_events_still_consumes_table_map() {
        let filter = EventFilter::new(Some(vec![EventKind::WriteRows]), None, true, None, None);
        // packet level keeps the bookkeeping events
        assert!(filter.allowed_in_packet(EventKind::TableMap));
        assert!(filter.allowed_in_packet(EventKind::Rotate));
        assert!(!filter.allowed_in_packet(EventKind::Query));
        // delivery level stays strict
        assert!(!filter.delivers(&BinlogEvent::Rotate {
            position: 4,
            next_binlog: "mysql-bin.000001".to_owned()
        }));
        assert!(filter.delivers(&write_rows("db", "t")));
    }

    #[test]
    fn test_ignored_events() {
        let filter = EventFilter::new(None, Some(vec![EventKind::Xid]), true, None, None);
        assert!(!filter.delivers(&BinlogEvent::Xid { xid: 1 }));
        assert!(filter.delivers(&write_rows("db", "t")));
    }

    #[test]
    fn test_table_filter() {
        let filter = EventFilter::new(
            None,
            None,
            true,
            None,
            Some(vec![SmolStr::from("t2")]),
        );
        assert!(filter.delivers(&write_rows("db", "t2")));
        assert!(!filter.delivers(&write_rows("db", "t3")));
        // non-table events pass through
        assert!(filter.delivers(&BinlogEvent::Xid { xid: 1 }));
    }

    #[test]
    fn test_schema_filter() {
        let filter = EventFilter::new(
            None,
            None,
            true,
            Some(vec![SmolStr::from("watched")]),
            None,
        );
        assert!(filter.delivers(&write_rows("watched", "t")));
        assert!(!filter.delivers(&write_rows("other", "t")));
    }
}
