//! table metadata: TABLE_MAP columns enriched with information_schema
use crate::binlog::event::{value_from_binlog, ColumnValue, RowImage};
use myrepl_core::bitmap;
use myrepl_core::binlog::table_map::TableMap;
use myrepl_core::col::ColumnMeta;
use myrepl_core::row::LogRow;
use myrepl_core::row::TextRow;
use serde_derive::Serialize;
use smol_str::SmolStr;

/// column facts fetched from information_schema.columns, merged
/// row-for-row into the bare TABLE_MAP type list
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSchema {
    pub name: SmolStr,
    pub collation: Option<SmolStr>,
    /// None for binary collations
    pub character_set: Option<SmolStr>,
    pub comment: String,
    /// full type text, e.g. "int(10) unsigned"
    pub column_type: String,
    pub is_primary_key: bool,
    pub is_unsigned: bool,
    pub is_bool: bool,
    pub enum_values: Vec<SmolStr>,
    pub set_values: Vec<SmolStr>,
}

impl ColumnSchema {
    /// build from one row of
    /// `SELECT COLUMN_NAME, COLLATION_NAME, CHARACTER_SET_NAME,
    ///  COLUMN_COMMENT, COLUMN_TYPE, COLUMN_KEY ...`
    pub fn from_row(row: &TextRow) -> Option<ColumnSchema> {
        let cell = |i: usize| -> Option<String> {
            row.0
                .get(i)?
                .as_ref()
                .map(|bs| String::from_utf8_lossy(bs).into_owned())
        };
        let name = SmolStr::from(cell(0)?);
        let collation = cell(1).map(SmolStr::from);
        let character_set = cell(2).map(SmolStr::from);
        let comment = cell(3).unwrap_or_default();
        let column_type = cell(4).unwrap_or_default();
        let column_key = cell(5).unwrap_or_default();
        let lowered = column_type.to_ascii_lowercase();
        let enum_values = if lowered.starts_with("enum(") {
            parse_value_list(&column_type)
        } else {
            vec![]
        };
        let set_values = if lowered.starts_with("set(") {
            parse_value_list(&column_type)
        } else {
            vec![]
        };
        Some(ColumnSchema {
            name,
            collation,
            character_set,
            comment,
            is_primary_key: column_key.eq_ignore_ascii_case("PRI"),
            is_unsigned: lowered.contains("unsigned"),
            is_bool: lowered.starts_with("tinyint(1)"),
            column_type,
            enum_values,
            set_values,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(name: &str, column_type: &str) -> ColumnSchema {
        Self::for_tests_with_charset(name, column_type, Some("utf8"))
    }

    #[cfg(test)]
    pub(crate) fn for_tests_with_charset(
        name: &str,
        column_type: &str,
        charset: Option<&str>,
    ) -> ColumnSchema {
        let lowered = column_type.to_ascii_lowercase();
        let enum_values = if lowered.starts_with("enum(") {
            parse_value_list(column_type)
        } else {
            vec![]
        };
        let set_values = if lowered.starts_with("set(") {
            parse_value_list(column_type)
        } else {
            vec![]
        };
        ColumnSchema {
            name: SmolStr::from(name),
            collation: charset.map(|c| SmolStr::from(format!("{}_general_ci", c))),
            character_set: charset.map(SmolStr::from),
            comment: String::new(),
            column_type: column_type.to_owned(),
            is_primary_key: false,
            is_unsigned: lowered.contains("unsigned"),
            is_bool: lowered.starts_with("tinyint(1)"),
            enum_values,
            set_values,
        }
    }
}

/// parse the quoted member list of an enum/set COLUMN_TYPE,
/// e.g. `enum('a','b','it''s')`
fn parse_value_list(column_type: &str) -> Vec<SmolStr> {
    let inner = match (column_type.find('('), column_type.rfind(')')) {
        (Some(open), Some(close)) if close > open => &column_type[open + 1..close],
        _ => return vec![],
    };
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote => {
                // doubled quote is an escaped quote inside the literal
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push('\'');
                } else {
                    in_quote = false;
                    values.push(SmolStr::from(current.as_str()));
                    current.clear();
                }
            }
            '\'' => in_quote = true,
            _ if in_quote => current.push(c),
            _ => (),
        }
    }
    values
}

/// one column of a mapped table
#[derive(Debug, Clone, Serialize)]
pub struct TableColumn {
    pub name: SmolStr,
    #[serde(skip)]
    pub meta: ColumnMeta,
    pub nullable: bool,
    pub schema: Option<ColumnSchema>,
}

impl TableColumn {
    /// whether string-ish payloads decode as text
    ///
    /// binary collations report a NULL character set; columns with no
    /// schema row default to text
    pub fn is_text(&self) -> bool {
        match &self.schema {
            Some(s) => s.character_set.is_some(),
            None => true,
        }
    }
}

/// a table as referenced by row events: the TABLE_MAP identity plus
/// the enriched column list
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub table_id: u64,
    pub schema_name: SmolStr,
    pub table_name: SmolStr,
    pub columns: Vec<TableColumn>,
}

impl Table {
    /// merge the table map with its information_schema rows; extra or
    /// missing schema rows degrade to placeholder column names
    pub fn from_table_map(table_id: u64, tm: &TableMap, schemas: Vec<ColumnSchema>) -> Table {
        let mut schemas: Vec<Option<ColumnSchema>> = schemas.into_iter().map(Some).collect();
        schemas.resize(tm.col_metas.len().max(schemas.len()), None);
        let columns = tm
            .col_metas
            .iter()
            .enumerate()
            .map(|(i, meta)| {
                let schema = schemas[i].take();
                let name = schema
                    .as_ref()
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| SmolStr::from(format!("UNKNOWN_COL{}", i)));
                TableColumn {
                    name,
                    meta: meta.clone(),
                    nullable: bitmap_index_or(&tm.null_bitmap, i),
                    schema,
                }
            })
            .collect();
        Table {
            table_id,
            schema_name: tm.schema_name.clone(),
            table_name: tm.table_name.clone(),
            columns,
        }
    }

    pub fn column_names(&self) -> Vec<SmolStr> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// turn one decoded row image into a name -> value map
    pub fn row_image(&self, row: LogRow) -> RowImage {
        let mut image = RowImage::with_capacity(self.columns.len());
        for (col, raw) in self.columns.iter().zip(row.0.into_iter()) {
            image.insert(col.name.clone(), value_from_binlog(raw, col));
        }
        image
    }

    /// value map with every column null, for row images shorter than
    /// the column list
    pub fn null_image(&self) -> RowImage {
        let mut image = RowImage::with_capacity(self.columns.len());
        for col in &self.columns {
            image.insert(col.name.clone(), ColumnValue::Null);
        }
        image
    }
}

fn bitmap_index_or(bm: &[u8], idx: usize) -> bool {
    if idx >> 3 < bm.len() {
        bitmap::index(bm, idx)
    } else {
        false
    }
}
