//! query event and its status variables
use bytes::{Buf, Bytes};
use bytes_parser::error::{Error, Result};
use bytes_parser::{ReadBytesExt, ReadFromBytes};

/// Data of QueryEvent
///
/// reference: https://dev.mysql.com/doc/internals/en/query-event.html
/// only binlog v4, with status_vars_length in the post header
#[derive(Debug, Clone)]
pub struct QueryData {
    pub slave_proxy_id: u32,
    pub exec_time: u32,
    pub schema_len: u8,
    pub error_code: u16,
    pub status_vars_len: u16,
    // below is variable part
    pub status_vars: Bytes,
    pub schema: Bytes,
    pub query: Bytes,
}

impl QueryData {
    pub fn schema_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.schema[..])
            .map_err(|e| Error::ConstraintError(format!("invalid schema name: {}", e)))
    }

    pub fn query_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.query[..])
            .map_err(|e| Error::ConstraintError(format!("invalid query text: {}", e)))
    }

    pub fn parse_status_vars(&self) -> Result<QueryStatusVars> {
        QueryStatusVars::read_from(&mut self.status_vars.clone())
    }
}

impl ReadFromBytes for QueryData {
    fn read_from(input: &mut Bytes) -> Result<Self> {
        let slave_proxy_id = input.read_le_u32()?;
        let exec_time = input.read_le_u32()?;
        let schema_len = input.read_u8()?;
        let error_code = input.read_le_u16()?;
        let status_vars_len = input.read_le_u16()?;
        // 13(4+4+1+2+2) bytes consumed, status vars stay raw here
        let status_vars = input.read_len(status_vars_len as usize)?;
        let schema = input.read_len(schema_len as usize)?;
        input.read_len(1)?;
        let query = input.split_to(input.remaining());
        Ok(QueryData {
            slave_proxy_id,
            exec_time,
            schema_len,
            error_code,
            status_vars_len,
            status_vars,
            schema,
            query,
        })
    }
}

#[derive(Debug, Clone)]
pub enum QueryStatusVar {
    Flags2Code(u32),
    SqlModeCode(u64),
    Catalog(Bytes),
    AutoIncrement { inc: u16, offset: u16 },
    // https://dev.mysql.com/doc/refman/8.0/en/charset-connection.html
    CharsetCode { client: u16, conn: u16, server: u16 },
    TimeZoneCode(Bytes),
    CatalogNzCode(Bytes),
    LcTimeNamesCode(u16),
    CharsetDatabaseCode(u16),
    TableMapForUpdateCode(u64),
    MasterDataWrittenCode(u32),
    Invokers { username: Bytes, hostname: Bytes },
    UpdatedDbNames(Vec<Bytes>),
    // 3-byte integer on the wire
    MicroSeconds(u32),
}

#[derive(Debug, Clone)]
pub struct QueryStatusVars(pub Vec<QueryStatusVar>);

impl std::ops::Deref for QueryStatusVars {
    type Target = Vec<QueryStatusVar>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ReadFromBytes for QueryStatusVars {
    fn read_from(input: &mut Bytes) -> Result<Self> {
        let mut vars = Vec::new();
        while input.has_remaining() {
            let key = input.read_u8()?;
            let var = match key {
                0x00 => QueryStatusVar::Flags2Code(input.read_le_u32()?),
                0x01 => QueryStatusVar::SqlModeCode(input.read_le_u64()?),
                0x02 => {
                    // 1-byte length + str + '\0'
                    let len = input.read_u8()?;
                    let s = input.read_len(len as usize)?;
                    input.read_len(1)?;
                    QueryStatusVar::Catalog(s)
                }
                0x03 => {
                    let inc = input.read_le_u16()?;
                    let offset = input.read_le_u16()?;
                    QueryStatusVar::AutoIncrement { inc, offset }
                }
                0x04 => {
                    let client = input.read_le_u16()?;
                    let conn = input.read_le_u16()?;
                    let server = input.read_le_u16()?;
                    QueryStatusVar::CharsetCode {
                        client,
                        conn,
                        server,
                    }
                }
                0x05 => {
                    let len = input.read_u8()?;
                    QueryStatusVar::TimeZoneCode(input.read_len(len as usize)?)
                }
                0x06 => {
                    let len = input.read_u8()?;
                    QueryStatusVar::CatalogNzCode(input.read_len(len as usize)?)
                }
                0x07 => QueryStatusVar::LcTimeNamesCode(input.read_le_u16()?),
                0x08 => QueryStatusVar::CharsetDatabaseCode(input.read_le_u16()?),
                0x09 => QueryStatusVar::TableMapForUpdateCode(input.read_le_u64()?),
                0x0a => QueryStatusVar::MasterDataWrittenCode(input.read_le_u32()?),
                0x0b => {
                    let lun = input.read_u8()?;
                    let username = input.read_len(lun as usize)?;
                    let lhn = input.read_u8()?;
                    let hostname = input.read_len(lhn as usize)?;
                    QueryStatusVar::Invokers { username, hostname }
                }
                0x0c => {
                    let cnt = input.read_u8()?;
                    let mut names = Vec::new();
                    for _ in 0..cnt {
                        names.push(input.read_until(0, false)?);
                    }
                    QueryStatusVar::UpdatedDbNames(names)
                }
                0x0d => QueryStatusVar::MicroSeconds(input.read_le_u24()?),
                _ => {
                    return Err(Error::ConstraintError(format!(
                        "invalid key of query status var: {}",
                        key
                    )))
                }
            };
            vars.push(var);
        }
        Ok(QueryStatusVars(vars))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_query_payload(schema: &str, query: &str) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&33u32.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.push(schema.len() as u8);
        v.extend_from_slice(&0u16.to_le_bytes());
        // status vars: sql mode only
        let mut status_vars = vec![0x01u8];
        status_vars.extend_from_slice(&0u64.to_le_bytes());
        v.extend_from_slice(&(status_vars.len() as u16).to_le_bytes());
        v.extend_from_slice(&status_vars);
        v.extend_from_slice(schema.as_bytes());
        v.push(0);
        v.extend_from_slice(query.as_bytes());
        v
    }

    #[test]
    fn test_query_data() {
        let mut input = Bytes::from(sample_query_payload("test", "BEGIN"));
        let qd = QueryData::read_from(&mut input).unwrap();
        assert_eq!(33, qd.slave_proxy_id);
        assert_eq!("test", qd.schema_str().unwrap());
        assert_eq!("BEGIN", qd.query_str().unwrap());
        let vars = qd.parse_status_vars().unwrap();
        assert_eq!(1, vars.len());
        match &vars[0] {
            QueryStatusVar::SqlModeCode(0) => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}
