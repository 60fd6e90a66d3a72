use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::models::Position;

const DB_DATE_FORMAT: &str = "%Y-%m-%d";

/// Whole-collection access to persisted positions.
pub trait PositionGateway {
    fn load_all(&self) -> Result<Vec<Position>, StorageError>;
    /// Replace everything persisted with `records`.
    fn write_all(&mut self, records: &[Position]) -> Result<(), StorageError>;
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(StorageError::Unavailable)?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.init()?;
        tracing::debug!("Opened database at {}", db.path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(StorageError::Unavailable)?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobstack") {
            proj_dirs.data_dir().join("jobstack.db")
        } else {
            PathBuf::from("jobstack.db")
        }
    }

    fn init(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY,
                result TEXT NOT NULL DEFAULT '',
                company TEXT NOT NULL DEFAULT '',
                job_title TEXT NOT NULL DEFAULT '',
                job_title_pdf TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                web TEXT NOT NULL DEFAULT '',
                person TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                request_sent_date TEXT,
                answer_date TEXT,
                conversation TEXT NOT NULL DEFAULT ''
            );
            "#,
            )
            .map_err(StorageError::Unavailable)
    }

    fn row_to_position(row: &rusqlite::Row) -> rusqlite::Result<Position> {
        Ok(Position {
            id: row.get(0)?,
            result: row.get(1)?,
            company: row.get(2)?,
            job_title: row.get(3)?,
            job_title_pdf: row.get(4)?,
            location: row.get(5)?,
            web: row.get(6)?,
            person: row.get(7)?,
            phone: row.get(8)?,
            email: row.get(9)?,
            request_sent_date: get_date(row, 10)?,
            answer_date: get_date(row, 11)?,
            conversation: row.get(12)?,
        })
    }
}

impl PositionGateway for Database {
    fn load_all(&self) -> Result<Vec<Position>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, result, company, job_title, job_title_pdf, location, web,
                        person, phone, email, request_sent_date, answer_date, conversation
                 FROM positions
                 ORDER BY id",
            )
            .map_err(StorageError::Unavailable)?;

        let rows = stmt
            .query_map([], Self::row_to_position)
            .map_err(StorageError::Unavailable)?;

        let positions = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::Unavailable)?;
        tracing::info!("Loaded {} positions from {}", positions.len(), self.path.display());
        Ok(positions)
    }

    fn write_all(&mut self, records: &[Position]) -> Result<(), StorageError> {
        // Dropping the transaction without commit rolls back, so a failed
        // write leaves the previous rows in place.
        let tx = self.conn.transaction().map_err(StorageError::Write)?;
        tx.execute("DELETE FROM positions", [])
            .map_err(StorageError::Write)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO positions (id, result, company, job_title, job_title_pdf,
                        location, web, person, phone, email, request_sent_date, answer_date,
                        conversation)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .map_err(StorageError::Write)?;
            for p in records {
                stmt.execute(params![
                    p.id,
                    p.result,
                    p.company,
                    p.job_title,
                    p.job_title_pdf,
                    p.location,
                    p.web,
                    p.person,
                    p.phone,
                    p.email,
                    p.request_sent_date.map(|d| d.format(DB_DATE_FORMAT).to_string()),
                    p.answer_date.map(|d| d.format(DB_DATE_FORMAT).to_string()),
                    p.conversation,
                ])
                .map_err(StorageError::Write)?;
            }
        }
        tx.commit().map_err(StorageError::Write)?;
        tracing::info!("Wrote {} positions to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// A stored date that does not parse reads as empty so one bad row cannot
/// hide every other position.
fn get_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(idx)?;
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(None);
    };
    match NaiveDate::parse_from_str(text.trim(), DB_DATE_FORMAT) {
        Ok(date) => Ok(Some(date)),
        Err(e) => {
            let id: i64 = row.get(0)?;
            tracing::warn!("Ignoring unreadable date '{}' of position #{}: {}", text, id, e);
            Ok(None)
        }
    }
}
