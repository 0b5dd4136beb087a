use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::DatabaseError;
use crate::models::enums::OptionList;

/// A row of the shared `list_options` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodedOption {
    pub list: OptionList,
    pub option_id: String,
    pub title: String,
    pub codes: String,
}

/// Fetch an active option by `(list_id, option_id)`.
pub fn get_option(
    conn: &Connection,
    list: OptionList,
    option_id: &str,
) -> Result<Option<CodedOption>, DatabaseError> {
    let option = conn
        .query_row(
            "SELECT option_id, title, codes FROM list_options
             WHERE list_id = ?1 AND option_id = ?2 AND activity = 1",
            params![list.as_str(), option_id],
            |row| {
                Ok(CodedOption {
                    list,
                    option_id: row.get(0)?,
                    title: row.get(1)?,
                    codes: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(option)
}

pub fn option_exists(
    conn: &Connection,
    list: OptionList,
    option_id: &str,
) -> Result<bool, DatabaseError> {
    Ok(get_option(conn, list, option_id)?.is_some())
}

pub fn option_title(
    conn: &Connection,
    list: OptionList,
    option_id: &str,
) -> Result<Option<String>, DatabaseError> {
    Ok(get_option(conn, list, option_id)?.map(|o| o.title))
}
