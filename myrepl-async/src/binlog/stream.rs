//! the consumer-facing replication stream reader
use crate::binlog::event::{
    BinlogEvent, EventKind, ReplicationEvent, RowsEvent, UpdateRowImage, UpdateRowsEvent,
};
use crate::binlog::filter::EventFilter;
use crate::binlog::options::BinlogOptions;
use crate::binlog::table::{ColumnSchema, Table};
use crate::conn::{Conn, ConnOpts};
use crate::error::{Error, Result};
use async_net::TcpStream;
use bytes::Bytes;
use bytes_parser::ReadFromBytesWithContext;
use myrepl_core::binlog::header::EventHeader;
use myrepl_core::binlog::parser::ParserV4;
use myrepl_core::binlog::{Event, LogEventType};
use myrepl_core::cmd::{ComBinlogDump, ComBinlogDumpGtid};
use myrepl_core::col::ColumnMeta;
use myrepl_core::packet::DumpPacket;
use smol_str::SmolStr;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
enum StreamState {
    Disconnected,
    Dumping,
    Closed,
}

/// attaches to a master as a replica and yields decoded events
///
/// owns two connections: the stream connection holds the dump, the
/// control connection answers information_schema lookups; both are
/// rebuilt from scratch on reconnect, never reused
#[derive(Debug)]
pub struct BinlogStreamReader {
    conn_opts: ConnOpts,
    options: BinlogOptions,
    filter: EventFilter,
    stream_conn: Option<Conn<TcpStream>>,
    ctl_conn: Option<Conn<TcpStream>>,
    parser: ParserV4,
    use_checksum: bool,
    // table id -> enriched table, valid until the next rotate
    table_map: HashMap<u64, Table>,
    // (schema, table) -> columns, only populated under freeze_schema
    schema_cache: HashMap<(SmolStr, SmolStr), Vec<ColumnSchema>>,
    log_file: Option<String>,
    log_pos: Option<u32>,
    // after the first dump, reconnects resume from the tracked position
    dumped_once: bool,
    state: StreamState,
}

impl BinlogStreamReader {
    /// build a reader without touching the network
    pub fn new(conn_opts: ConnOpts, options: BinlogOptions) -> Self {
        let filter = EventFilter::new(
            options.only_events.clone(),
            options.ignored_events.clone(),
            options.filter_non_implemented_events,
            options.only_schemas.clone(),
            options.only_tables.clone(),
        );
        BinlogStreamReader {
            conn_opts,
            filter,
            stream_conn: None,
            ctl_conn: None,
            parser: ParserV4::new(vec![], false),
            use_checksum: false,
            table_map: HashMap::new(),
            schema_cache: HashMap::new(),
            log_file: options.log_file.clone(),
            log_pos: options.log_pos,
            dumped_once: false,
            state: StreamState::Disconnected,
            options,
        }
    }

    /// connect and register the dump
    pub async fn connect(conn_opts: ConnOpts, options: BinlogOptions) -> Result<Self> {
        let mut reader = Self::new(conn_opts, options);
        reader.open().await?;
        Ok(reader)
    }

    /// current binlog file of the stream position
    pub fn log_file(&self) -> Option<&str> {
        self.log_file.as_deref()
    }

    /// current binlog position within `log_file`
    pub fn log_pos(&self) -> Option<u32> {
        self.log_pos
    }

    /// establish both connections, negotiate checksums and send the
    /// dump request
    pub async fn open(&mut self) -> Result<()> {
        if self.state == StreamState::Closed {
            return Err(Error::StreamClosed);
        }
        let mut stream_conn = Conn::connect(&self.conn_opts).await?;
        self.use_checksum = Self::checksum_enabled(&mut stream_conn).await?;
        log::debug!("binlog checksum enabled: {}", self.use_checksum);
        if self.use_checksum {
            // tell the master we can handle the crc32 trailer
            stream_conn
                .query()
                .exec("SET @master_binlog_checksum = @@global.binlog_checksum")
                .await?;
        }
        // the parser is rebuilt from the FDE once the stream delivers it
        self.parser = ParserV4::new(vec![], self.use_checksum);

        if let Some(gtid_set) = &self.options.auto_position {
            let dump = ComBinlogDumpGtid::new(self.options.server_id, gtid_set.clone());
            log::debug!("registering gtid dump: {}", gtid_set);
            stream_conn.send_msg(dump, true).await?;
        } else {
            if self.log_file.is_none() || self.log_pos.is_none() {
                let rs = stream_conn.query().qry("SHOW MASTER STATUS").await?;
                let file = rs
                    .cell_str(0, 0)
                    .ok_or_else(|| Error::PacketError("SHOW MASTER STATUS is empty".to_owned()))?;
                let pos: u32 = rs
                    .cell_str(0, 1)
                    .ok_or_else(|| Error::PacketError("SHOW MASTER STATUS is empty".to_owned()))?
                    .parse()?;
                self.log_file = Some(file);
                self.log_pos = Some(pos);
            }
            // resume from the tracked position, or replay the file
            let pos = if self.options.resume_stream || self.dumped_once {
                self.log_pos.unwrap_or(4)
            } else {
                4
            };
            let log_file = self.log_file.clone().unwrap_or_default();
            log::debug!("registering dump at {}:{}", log_file, pos);
            let dump = ComBinlogDump::new(
                log_file,
                pos,
                self.options.server_id,
                !self.options.blocking,
            );
            stream_conn.send_msg(dump, true).await?;
        }
        self.stream_conn = Some(stream_conn);
        if self.ctl_conn.is_none() {
            self.connect_ctl().await?;
        }
        self.dumped_once = true;
        self.state = StreamState::Dumping;
        Ok(())
    }

    /// release both connections; further `next_event` calls return
    /// end-of-stream
    pub async fn close(&mut self) -> Result<()> {
        self.state = StreamState::Closed;
        if let Some(conn) = self.stream_conn.take() {
            let _ = conn.close().await;
        }
        if let Some(conn) = self.ctl_conn.take() {
            let _ = conn.close().await;
        }
        Ok(())
    }

    /// pull the next event that passes the filter
    ///
    /// transparently reconnects on transient failures, resuming from
    /// the last tracked position (or the supplied gtid set); returns
    /// None on clean end of stream
    pub async fn next_event(&mut self) -> Result<Option<ReplicationEvent>> {
        loop {
            if self.state == StreamState::Closed {
                return Ok(None);
            }
            if self.stream_conn.is_none() {
                match self.open().await {
                    Ok(()) => (),
                    Err(e) if e.is_transient() => {
                        log::warn!("reconnect attempt failed: {}", e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            let conn = match self.stream_conn.as_mut() {
                Some(conn) => conn,
                None => continue,
            };
            let cap_flags = conn.cap_flags;
            let mut msg = match conn.recv_msg().await {
                Ok(msg) => msg,
                Err(e) if e.is_transient() => {
                    log::warn!("stream connection lost, reconnecting: {}", e);
                    self.disconnect();
                    continue;
                }
                Err(e) => return Err(e),
            };
            match DumpPacket::read_with_ctx(&mut msg, &cap_flags)? {
                DumpPacket::Eof => {
                    self.state = StreamState::Closed;
                    return Ok(None);
                }
                DumpPacket::Err(err) => {
                    let err = Error::from(err);
                    if err.is_transient() {
                        log::warn!("master reported {}, reconnecting", err);
                        self.disconnect();
                        continue;
                    }
                    return Err(err);
                }
                DumpPacket::Event(payload) => {
                    if let Some(event) = self.process_event(payload).await? {
                        return Ok(Some(event));
                    }
                }
            }
        }
    }

    fn disconnect(&mut self) {
        self.stream_conn = None;
        self.state = StreamState::Disconnected;
    }

    /// decode one event payload, run the bookkeeping it demands and
    /// apply both filter stages
    async fn process_event(&mut self, mut payload: Bytes) -> Result<Option<ReplicationEvent>> {
        let event = self.parser.parse_event(&mut payload, false)?;
        let header = event.header().clone();
        let kind = kind_for(LogEventType::from(header.type_code));
        if !self.filter.allowed_in_packet(kind) {
            self.track_position(&header);
            return Ok(None);
        }
        let data = match event {
            Event::FormatDescription(e) => {
                self.parser = ParserV4::from_fde(&e.data);
                BinlogEvent::FormatDescription {
                    binlog_version: e.data.binlog_version,
                    server_version: e.data.server_version,
                }
            }
            Event::Rotate(e) => {
                let next_binlog = e.data.next_binlog()?;
                log::debug!(
                    "rotate to {}:{}, table map invalidated",
                    next_binlog,
                    e.data.position
                );
                self.log_file = Some(next_binlog.clone());
                self.log_pos = Some(e.data.position as u32);
                // table ids are in-memory identifiers on the master and
                // get reused after a restart; a rotation is the only
                // reliable restart signal, so drop every mapping here
                self.table_map.clear();
                BinlogEvent::Rotate {
                    position: e.data.position,
                    next_binlog,
                }
            }
            Event::TableMap(e) => {
                let tm = e.data.table_map()?;
                let schemas = self
                    .load_schema(tm.schema_name.clone(), tm.table_name.clone())
                    .await?;
                let table = Table::from_table_map(e.data.table_id, &tm, schemas);
                let data = BinlogEvent::TableMap {
                    table_id: table.table_id,
                    schema: table.schema_name.clone(),
                    table: table.table_name.clone(),
                    columns: table.column_names(),
                };
                self.table_map.insert(table.table_id, table);
                data
            }
            Event::WriteRows(e) => {
                let (table, metas) = self.mapped_table(e.data.table_id)?;
                let decoded = e.data.rows(&metas)?;
                let rows = decoded.rows.into_iter().map(|r| table.row_image(r)).collect();
                BinlogEvent::WriteRows(RowsEvent {
                    table_id: table.table_id,
                    schema: table.schema_name.clone(),
                    table: table.table_name.clone(),
                    columns: table.column_names(),
                    rows,
                })
            }
            Event::DeleteRows(e) => {
                let (table, metas) = self.mapped_table(e.data.table_id)?;
                let decoded = e.data.rows(&metas)?;
                let rows = decoded.rows.into_iter().map(|r| table.row_image(r)).collect();
                BinlogEvent::DeleteRows(RowsEvent {
                    table_id: table.table_id,
                    schema: table.schema_name.clone(),
                    table: table.table_name.clone(),
                    columns: table.column_names(),
                    rows,
                })
            }
            Event::UpdateRows(e) => {
                let (table, metas) = self.mapped_table(e.data.table_id)?;
                let decoded = e.data.update_rows(&metas)?;
                let rows = decoded
                    .rows
                    .into_iter()
                    .map(|r| UpdateRowImage {
                        before_values: table.row_image(r.before),
                        after_values: table.row_image(r.after),
                    })
                    .collect();
                BinlogEvent::UpdateRows(UpdateRowsEvent {
                    table_id: table.table_id,
                    schema: table.schema_name.clone(),
                    table: table.table_name.clone(),
                    columns: table.column_names(),
                    rows,
                })
            }
            Event::Query(e) => BinlogEvent::Query {
                schema: e.data.schema_str()?.to_owned(),
                query: e.data.query_str()?.to_owned(),
                execution_time: e.data.exec_time,
                error_code: e.data.error_code,
            },
            Event::Xid(e) => BinlogEvent::Xid { xid: e.data },
            Event::Gtid(e) => BinlogEvent::Gtid {
                sid: e.data.sid,
                gno: e.data.gno,
            },
            Event::Stop(_) => BinlogEvent::Stop,
            Event::AnonymousGtid(_)
            | Event::PreviousGtids(_)
            | Event::Heartbeat(_)
            | Event::Unsupported(_) => BinlogEvent::NotImplemented {
                event_type: header.type_code,
            },
        };
        if kind != EventKind::Rotate {
            self.track_position(&header);
        }
        if !self.filter.delivers(&data) {
            return Ok(None);
        }
        Ok(Some(ReplicationEvent {
            timestamp: header.timestamp,
            server_id: header.server_id,
            event_size: header.event_len,
            log_pos: header.next_pos,
            flags: header.flags.bits(),
            data,
        }))
    }

    fn track_position(&mut self, header: &EventHeader) {
        if header.next_pos > 0 {
            self.log_pos = Some(header.next_pos);
        }
    }

    /// look up a row event's table in the map populated by TABLE_MAP
    ///
    /// a miss means the stream is inconsistent with our bookkeeping,
    /// decoding anyway would silently produce garbage
    fn mapped_table(&self, table_id: u64) -> Result<(&Table, Vec<ColumnMeta>)> {
        let table = self.table_map.get(&table_id).ok_or_else(|| {
            Error::ProtocolInconsistency(format!(
                "row event references unknown table id {}",
                table_id
            ))
        })?;
        let metas = table.columns.iter().map(|c| c.meta.clone()).collect();
        Ok((table, metas))
    }

    async fn load_schema(
        &mut self,
        schema: SmolStr,
        table: SmolStr,
    ) -> Result<Vec<ColumnSchema>> {
        let key = (schema, table);
        if self.options.freeze_schema {
            if let Some(cached) = self.schema_cache.get(&key) {
                return Ok(cached.clone());
            }
        }
        let schemas = self.get_table_information(&key.0, &key.1).await?;
        if self.options.freeze_schema {
            self.schema_cache.insert(key, schemas.clone());
        }
        Ok(schemas)
    }

    /// fetch column facts over the control connection, retrying once
    /// on a transient failure with a fresh connection
    async fn get_table_information(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnSchema>> {
        let sql = format!(
            "SELECT COLUMN_NAME, COLLATION_NAME, CHARACTER_SET_NAME, \
             COLUMN_COMMENT, COLUMN_TYPE, COLUMN_KEY \
             FROM information_schema.columns \
             WHERE table_schema = '{}' AND table_name = '{}' \
             ORDER BY ORDINAL_POSITION",
            escape(schema),
            escape(table)
        );
        let mut last_err = None;
        for attempt in 0..2 {
            if self.ctl_conn.is_none() {
                self.connect_ctl().await?;
            }
            let conn = match self.ctl_conn.as_mut() {
                Some(conn) => conn,
                None => continue,
            };
            match conn.query().qry(sql.clone()).await {
                Ok(rs) => {
                    log::debug!(
                        "loaded schema for {}.{}: {} columns",
                        schema,
                        table,
                        rs.rows.len()
                    );
                    return Ok(rs.rows.iter().filter_map(ColumnSchema::from_row).collect());
                }
                Err(e) if e.is_transient() && attempt == 0 => {
                    log::warn!("control connection lost, rebuilding: {}", e);
                    self.ctl_conn = None;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::PacketError("schema lookup retries exhausted".to_owned())))
    }

    async fn connect_ctl(&mut self) -> Result<()> {
        let opts = self.conn_opts.clone().database("information_schema");
        self.ctl_conn = Some(Conn::connect(&opts).await?);
        Ok(())
    }

    /// whether the master appends a CRC32 trailer to every event;
    /// servers before 5.6 do not know the variable
    async fn checksum_enabled(conn: &mut Conn<TcpStream>) -> Result<bool> {
        let rs = conn
            .query()
            .qry("SHOW GLOBAL VARIABLES LIKE 'BINLOG_CHECKSUM'")
            .await?;
        Ok(match rs.cell_str(0, 1) {
            None => false,
            Some(value) => value != "NONE",
        })
    }

    /// adapt the pull API into a `futures::Stream`
    pub fn into_stream(
        self,
    ) -> impl futures::Stream<Item = Result<ReplicationEvent>> + Send {
        futures::stream::try_unfold(self, |mut reader| async move {
            match reader.next_event().await? {
                Some(event) => Ok(Some((event, reader))),
                None => Ok(None),
            }
        })
    }
}

fn kind_for(event_type: LogEventType) -> EventKind {
    match event_type {
        LogEventType::QueryEvent => EventKind::Query,
        LogEventType::StopEvent => EventKind::Stop,
        LogEventType::RotateEvent => EventKind::Rotate,
        LogEventType::FormatDescriptionEvent => EventKind::FormatDescription,
        LogEventType::XidEvent => EventKind::Xid,
        LogEventType::TableMapEvent => EventKind::TableMap,
        LogEventType::WriteRowsEventV1 | LogEventType::WriteRowsEventV2 => EventKind::WriteRows,
        LogEventType::UpdateRowsEventV1 | LogEventType::UpdateRowsEventV2 => EventKind::UpdateRows,
        LogEventType::DeleteRowsEventV1 | LogEventType::DeleteRowsEventV2 => EventKind::DeleteRows,
        LogEventType::GtidLogEvent => EventKind::Gtid,
        _ => EventKind::NotImplemented,
    }
}

fn escape(ident: &str) -> String {
    ident.replace('\\', "\\\\").replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::event::ColumnValue;

    fn conn_opts() -> ConnOpts {
        ConnOpts::new("127.0.0.1", 3306, "repl", "repl")
    }

    fn frozen_reader(options: BinlogOptions) -> BinlogStreamReader {
        let mut reader = BinlogStreamReader::new(conn_opts(), options.freeze_schema(true));
        reader.schema_cache.insert(
            (SmolStr::from("pymysqlreplication_test"), SmolStr::from("t")),
            vec![
                ColumnSchema::for_tests_with_charset("id", "int(11)", None),
                ColumnSchema::for_tests("data", "varchar(50)"),
            ],
        );
        reader
    }

    fn wrap_event(type_code: u8, payload: &[u8], next_pos: u32) -> Bytes {
        let event_len = 19 + payload.len();
        let mut v = Vec::with_capacity(event_len);
        v.extend_from_slice(&1590000000u32.to_le_bytes());
        v.push(type_code);
        v.extend_from_slice(&1u32.to_le_bytes());
        v.extend_from_slice(&(event_len as u32).to_le_bytes());
        v.extend_from_slice(&next_pos.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(payload);
        Bytes::from(v)
    }

    fn rotate_payload(position: u64, next_binlog: &str) -> Vec<u8> {
        let mut v = position.to_le_bytes().to_vec();
        v.extend_from_slice(next_binlog.as_bytes());
        v
    }

    /// TABLE_MAP for `pymysqlreplication_test.t(id INT NOT NULL, data VARCHAR(50))`
    fn table_map_payload(table_id: u64) -> Vec<u8> {
        let schema = b"pymysqlreplication_test";
        let mut v = Vec::new();
        v.extend_from_slice(&table_id.to_le_bytes()[..6]);
        v.extend_from_slice(&1u16.to_le_bytes());
        v.push(schema.len() as u8);
        v.extend_from_slice(schema);
        v.push(0);
        v.push(1);
        v.extend_from_slice(b"t");
        v.push(0);
        v.push(2);
        v.extend_from_slice(&[0x03, 0x0f]);
        v.push(2);
        v.extend_from_slice(&150u16.to_le_bytes());
        v.push(0b10);
        v
    }

    fn write_rows_payload(table_id: u64, id: u32, data: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&table_id.to_le_bytes()[..6]);
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&2u16.to_le_bytes());
        v.push(2);
        v.push(0b11);
        v.push(0);
        v.extend_from_slice(&id.to_le_bytes());
        v.push(data.len() as u8);
        v.extend_from_slice(data);
        v
    }

    fn update_rows_minimal_payload(table_id: u64, id: u32, after: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&table_id.to_le_bytes()[..6]);
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&2u16.to_le_bytes());
        v.push(2);
        v.push(0b01);
        v.push(0b10);
        v.push(0);
        v.extend_from_slice(&id.to_le_bytes());
        v.push(0);
        v.push(after.len() as u8);
        v.extend_from_slice(after);
        v
    }

    #[smol_potat::test]
    async fn test_rotate_resets_table_map_and_position() {
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        // map a table first
        reader
            .process_event(wrap_event(19, &table_map_payload(0x66), 200))
            .await
            .unwrap();
        assert!(reader.table_map.contains_key(&0x66));
        let ev = reader
            .process_event(wrap_event(4, &rotate_payload(4, "mysql-bin.000002"), 0))
            .await
            .unwrap()
            .unwrap();
        match ev.data {
            BinlogEvent::Rotate {
                position,
                next_binlog,
            } => {
                assert_eq!(4, position);
                assert_eq!("mysql-bin.000002", next_binlog);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(reader.table_map.is_empty());
        assert_eq!(Some("mysql-bin.000002"), reader.log_file());
        assert_eq!(Some(4), reader.log_pos());
    }

    #[smol_potat::test]
    async fn test_table_map_then_write_rows() {
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        let ev = reader
            .process_event(wrap_event(19, &table_map_payload(0x66), 300))
            .await
            .unwrap()
            .unwrap();
        match &ev.data {
            BinlogEvent::TableMap {
                schema,
                table,
                columns,
                ..
            } => {
                assert_eq!("pymysqlreplication_test", schema.as_str());
                assert_eq!("t", table.as_str());
                assert_eq!(
                    vec![SmolStr::from("id"), SmolStr::from("data")],
                    columns.clone()
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        let ev = reader
            .process_event(wrap_event(
                30,
                &write_rows_payload(0x66, 1, b"Hello World"),
                400,
            ))
            .await
            .unwrap()
            .unwrap();
        match ev.data {
            BinlogEvent::WriteRows(rows) => {
                assert_eq!("pymysqlreplication_test", rows.schema.as_str());
                assert_eq!("t", rows.table.as_str());
                assert_eq!(1, rows.rows.len());
                assert_eq!(
                    Some(&ColumnValue::SignedInt(1)),
                    rows.rows[0].get("id")
                );
                assert_eq!(
                    Some(&ColumnValue::String("Hello World".to_owned())),
                    rows.rows[0].get("data")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(Some(400), reader.log_pos());
    }

    #[smol_potat::test]
    async fn test_unknown_table_id_is_protocol_inconsistency() {
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        let err = reader
            .process_event(wrap_event(30, &write_rows_payload(0x99, 1, b"x"), 400))
            .await
            .unwrap_err();
        match err {
            Error::ProtocolInconsistency(_) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[smol_potat::test]
    async fn test_position_monotonicity() {
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        let mut last = 0u32;
        for next_pos in [120u32, 200, 290, 350] {
            reader
                .process_event(wrap_event(19, &table_map_payload(0x66), next_pos))
                .await
                .unwrap();
            let pos = reader.log_pos().unwrap();
            assert!(pos >= last);
            last = pos;
        }
        assert_eq!(350, last);
    }

    #[smol_potat::test]
    async fn test_only_events_filter_still_tracks_table_map() {
        let options = BinlogOptions::new(1024).only_events(vec![EventKind::WriteRows]);
        let mut reader = frozen_reader(options);
        // table map is consumed internally but not delivered
        let delivered = reader
            .process_event(wrap_event(19, &table_map_payload(0x66), 300))
            .await
            .unwrap();
        assert!(delivered.is_none());
        assert!(reader.table_map.contains_key(&0x66));
        // query events are dropped at the packet stage, position still moves
        let delivered = reader
            .process_event(wrap_event(2, &query_payload("BEGIN"), 350))
            .await
            .unwrap();
        assert!(delivered.is_none());
        assert_eq!(Some(350), reader.log_pos());
        // row events flow through
        let delivered = reader
            .process_event(wrap_event(30, &write_rows_payload(0x66, 1, b"x"), 400))
            .await
            .unwrap();
        assert!(delivered.is_some());
    }

    #[smol_potat::test]
    async fn test_only_tables_filter() {
        let options = BinlogOptions::new(1024).only_tables(vec!["t2"]);
        let mut reader = frozen_reader(options);
        reader.schema_cache.insert(
            (SmolStr::from("pymysqlreplication_test"), SmolStr::from("t")),
            vec![
                ColumnSchema::for_tests_with_charset("id", "int(11)", None),
                ColumnSchema::for_tests("data", "varchar(50)"),
            ],
        );
        // the map event for table `t` is filtered from delivery but
        // still cached for decode
        let delivered = reader
            .process_event(wrap_event(19, &table_map_payload(0x66), 300))
            .await
            .unwrap();
        assert!(delivered.is_none());
        let delivered = reader
            .process_event(wrap_event(30, &write_rows_payload(0x66, 1, b"x"), 400))
            .await
            .unwrap();
        assert!(delivered.is_none());
    }

    #[smol_potat::test]
    async fn test_minimal_row_image_update() {
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        reader
            .process_event(wrap_event(19, &table_map_payload(0x66), 300))
            .await
            .unwrap();
        let ev = reader
            .process_event(wrap_event(
                31,
                &update_rows_minimal_payload(0x66, 1, b"World"),
                500,
            ))
            .await
            .unwrap()
            .unwrap();
        match ev.data {
            BinlogEvent::UpdateRows(rows) => {
                let row = &rows.rows[0];
                assert_eq!(
                    Some(&ColumnValue::SignedInt(1)),
                    row.before_values.get("id")
                );
                assert_eq!(Some(&ColumnValue::Null), row.before_values.get("data"));
                assert_eq!(Some(&ColumnValue::Null), row.after_values.get("id"));
                assert_eq!(
                    Some(&ColumnValue::String("World".to_owned())),
                    row.after_values.get("data")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[smol_potat::test]
    async fn test_gtid_event_delivery() {
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        let sid = uuid::Uuid::parse_str("57b70f4e-20d3-11e5-a393-4a63946f7eac").unwrap();
        let mut payload = vec![1u8];
        payload.extend_from_slice(sid.as_bytes());
        payload.extend_from_slice(&7u64.to_le_bytes());
        let ev = reader
            .process_event(wrap_event(33, &payload, 600))
            .await
            .unwrap()
            .unwrap();
        match ev.data {
            BinlogEvent::Gtid { sid: got, gno } => {
                assert_eq!(sid, got);
                assert_eq!(7, gno);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[smol_potat::test]
    async fn test_unsupported_event_becomes_not_implemented() {
        // NotImplemented passes through when not filtered
        let options = BinlogOptions::new(1024).filter_non_implemented_events(false);
        let mut reader = frozen_reader(options);
        let ev = reader
            .process_event(wrap_event(29, b"\x01# rows query", 700))
            .await
            .unwrap()
            .unwrap();
        match ev.data {
            BinlogEvent::NotImplemented { event_type } => assert_eq!(29, event_type),
            other => panic!("unexpected {:?}", other),
        }
        // and is dropped under the default configuration
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        let delivered = reader
            .process_event(wrap_event(29, b"\x01# rows query", 800))
            .await
            .unwrap();
        assert!(delivered.is_none());
        assert_eq!(Some(800), reader.log_pos());
    }

    fn query_payload(query: &str) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&33u32.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.push(0);
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.push(0);
        v.extend_from_slice(query.as_bytes());
        v
    }

    #[smol_potat::test]
    async fn test_query_event_fields() {
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        let ev = reader
            .process_event(wrap_event(2, &query_payload("CREATE TABLE t(id INT)"), 900))
            .await
            .unwrap()
            .unwrap();
        match ev.data {
            BinlogEvent::Query { query, schema, .. } => {
                assert_eq!("CREATE TABLE t(id INT)", query);
                assert_eq!("", schema);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[smol_potat::test]
    async fn test_close_is_idempotent_and_terminal() {
        let mut reader = frozen_reader(BinlogOptions::new(1024));
        reader.close().await.unwrap();
        reader.close().await.unwrap();
        assert_eq!(None, reader.next_event().await.unwrap());
    }
}
