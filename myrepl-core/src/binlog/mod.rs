pub mod fde;
pub mod gtid;
pub mod header;
pub mod parser;
pub mod query;
pub mod rotate;
pub mod rows;
pub mod table_map;

use bytes::Bytes;
use fde::FormatDescriptionData;
use gtid::{GtidLogData, PreviousGtidsData};
use header::EventHeader;
use query::QueryData;
use rotate::RotateData;
use rows::RowsData;
use table_map::TableMapData;

/// the complete binlog v4 event type number space
///
/// reference: https://github.com/mysql/mysql-server/blob/5.7/libbinlogevents/include/binlog_event.h
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogEventType {
    Unknown,
    StartEventV3,
    QueryEvent,
    StopEvent,
    RotateEvent,
    IntvarEvent,
    LoadEvent,
    SlaveEvent,
    CreateFileEvent,
    AppendBlockEvent,
    ExecLoadEvent,
    DeleteFileEvent,
    NewLoadEvent,
    RandEvent,
    UserVarEvent,
    FormatDescriptionEvent,
    XidEvent,
    BeginLoadQueryEvent,
    ExecuteLoadQueryEvent,
    TableMapEvent,
    WriteRowsEventV0,
    UpdateRowsEventV0,
    DeleteRowsEventV0,
    WriteRowsEventV1,
    UpdateRowsEventV1,
    DeleteRowsEventV1,
    IncidentEvent,
    HeartbeatLogEvent,
    IgnorableLogEvent,
    RowsQueryLogEvent,
    WriteRowsEventV2,
    UpdateRowsEventV2,
    DeleteRowsEventV2,
    GtidLogEvent,
    AnonymousGtidLogEvent,
    PreviousGtidsLogEvent,
    TransactionContextEvent,
    ViewChangeEvent,
    XaPrepareLogEvent,
    Invalid,
}

impl From<u8> for LogEventType {
    fn from(code: u8) -> LogEventType {
        match code {
            0 => LogEventType::Unknown,
            1 => LogEventType::StartEventV3,
            2 => LogEventType::QueryEvent,
            3 => LogEventType::StopEvent,
            4 => LogEventType::RotateEvent,
            5 => LogEventType::IntvarEvent,
            6 => LogEventType::LoadEvent,
            7 => LogEventType::SlaveEvent,
            8 => LogEventType::CreateFileEvent,
            9 => LogEventType::AppendBlockEvent,
            10 => LogEventType::ExecLoadEvent,
            11 => LogEventType::DeleteFileEvent,
            12 => LogEventType::NewLoadEvent,
            13 => LogEventType::RandEvent,
            14 => LogEventType::UserVarEvent,
            15 => LogEventType::FormatDescriptionEvent,
            16 => LogEventType::XidEvent,
            17 => LogEventType::BeginLoadQueryEvent,
            18 => LogEventType::ExecuteLoadQueryEvent,
            19 => LogEventType::TableMapEvent,
            // 20..=22 are also called PreGa(Write|Update|Delete)RowsEvent,
            // used in 5.1.0 ~ 5.1.17
            20 => LogEventType::WriteRowsEventV0,
            21 => LogEventType::UpdateRowsEventV0,
            22 => LogEventType::DeleteRowsEventV0,
            // 23..=25 used in 5.1.18 ~ 5.6.x
            23 => LogEventType::WriteRowsEventV1,
            24 => LogEventType::UpdateRowsEventV1,
            25 => LogEventType::DeleteRowsEventV1,
            26 => LogEventType::IncidentEvent,
            27 => LogEventType::HeartbeatLogEvent,
            28 => LogEventType::IgnorableLogEvent,
            29 => LogEventType::RowsQueryLogEvent,
            // 30..=32 used from 5.6.x on
            30 => LogEventType::WriteRowsEventV2,
            31 => LogEventType::UpdateRowsEventV2,
            32 => LogEventType::DeleteRowsEventV2,
            33 => LogEventType::GtidLogEvent,
            34 => LogEventType::AnonymousGtidLogEvent,
            35 => LogEventType::PreviousGtidsLogEvent,
            36 => LogEventType::TransactionContextEvent,
            37 => LogEventType::ViewChangeEvent,
            38 => LogEventType::XaPrepareLogEvent,
            _ => LogEventType::Invalid,
        }
    }
}

impl From<LogEventType> for u8 {
    fn from(event_type: LogEventType) -> u8 {
        match event_type {
            LogEventType::Unknown => 0,
            LogEventType::StartEventV3 => 1,
            LogEventType::QueryEvent => 2,
            LogEventType::StopEvent => 3,
            LogEventType::RotateEvent => 4,
            LogEventType::IntvarEvent => 5,
            LogEventType::LoadEvent => 6,
            LogEventType::SlaveEvent => 7,
            LogEventType::CreateFileEvent => 8,
            LogEventType::AppendBlockEvent => 9,
            LogEventType::ExecLoadEvent => 10,
            LogEventType::DeleteFileEvent => 11,
            LogEventType::NewLoadEvent => 12,
            LogEventType::RandEvent => 13,
            LogEventType::UserVarEvent => 14,
            LogEventType::FormatDescriptionEvent => 15,
            LogEventType::XidEvent => 16,
            LogEventType::BeginLoadQueryEvent => 17,
            LogEventType::ExecuteLoadQueryEvent => 18,
            LogEventType::TableMapEvent => 19,
            LogEventType::WriteRowsEventV0 => 20,
            LogEventType::UpdateRowsEventV0 => 21,
            LogEventType::DeleteRowsEventV0 => 22,
            LogEventType::WriteRowsEventV1 => 23,
            LogEventType::UpdateRowsEventV1 => 24,
            LogEventType::DeleteRowsEventV1 => 25,
            LogEventType::IncidentEvent => 26,
            LogEventType::HeartbeatLogEvent => 27,
            LogEventType::IgnorableLogEvent => 28,
            LogEventType::RowsQueryLogEvent => 29,
            LogEventType::WriteRowsEventV2 => 30,
            LogEventType::UpdateRowsEventV2 => 31,
            LogEventType::DeleteRowsEventV2 => 32,
            LogEventType::GtidLogEvent => 33,
            LogEventType::AnonymousGtidLogEvent => 34,
            LogEventType::PreviousGtidsLogEvent => 35,
            LogEventType::TransactionContextEvent => 36,
            LogEventType::ViewChangeEvent => 37,
            LogEventType::XaPrepareLogEvent => 38,
            // pseudo invalid code
            LogEventType::Invalid => 99,
        }
    }
}

/// v4 event: common header plus typed payload
#[derive(Debug, Clone)]
pub struct RawEvent<D> {
    pub header: EventHeader,
    pub data: D,
}

pub type QueryEvent = RawEvent<QueryData>;
pub type StopEvent = RawEvent<()>;
pub type RotateEvent = RawEvent<RotateData>;
pub type FormatDescriptionEvent = RawEvent<FormatDescriptionData>;
/// the payload of XID_EVENT is just the transaction id
pub type XidEvent = RawEvent<u64>;
pub type TableMapEvent = RawEvent<TableMapData>;
pub type WriteRowsEvent = RawEvent<RowsData>;
pub type UpdateRowsEvent = RawEvent<RowsData>;
pub type DeleteRowsEvent = RawEvent<RowsData>;
pub type GtidEvent = RawEvent<GtidLogData>;
pub type PreviousGtidsEvent = RawEvent<PreviousGtidsData>;
pub type HeartbeatEvent = RawEvent<()>;
/// any event without a typed decoder, payload kept raw
pub type UnsupportedEvent = RawEvent<Bytes>;

/// every decoded binlog event
#[derive(Debug, Clone)]
pub enum Event {
    Query(QueryEvent),
    Stop(StopEvent),
    Rotate(RotateEvent),
    FormatDescription(FormatDescriptionEvent),
    Xid(XidEvent),
    TableMap(TableMapEvent),
    WriteRows(WriteRowsEvent),
    UpdateRows(UpdateRowsEvent),
    DeleteRows(DeleteRowsEvent),
    Gtid(GtidEvent),
    AnonymousGtid(GtidEvent),
    PreviousGtids(PreviousGtidsEvent),
    Heartbeat(HeartbeatEvent),
    Unsupported(UnsupportedEvent),
}

impl Event {
    pub fn header(&self) -> &EventHeader {
        match self {
            Event::Query(e) => &e.header,
            Event::Stop(e) => &e.header,
            Event::Rotate(e) => &e.header,
            Event::FormatDescription(e) => &e.header,
            Event::Xid(e) => &e.header,
            Event::TableMap(e) => &e.header,
            Event::WriteRows(e) => &e.header,
            Event::UpdateRows(e) => &e.header,
            Event::DeleteRows(e) => &e.header,
            Event::Gtid(e) => &e.header,
            Event::AnonymousGtid(e) => &e.header,
            Event::PreviousGtids(e) => &e.header,
            Event::Heartbeat(e) => &e.header,
            Event::Unsupported(e) => &e.header,
        }
    }

    pub fn event_type(&self) -> LogEventType {
        LogEventType::from(self.header().type_code)
    }
}
