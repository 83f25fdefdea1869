use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::calc::{Account, ResultEntry, ResultRecord};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("codequiz.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts(
            id TEXT PRIMARY KEY,
            fullname TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            student_no TEXT NOT NULL,
            birth_date TEXT,
            source_of_truth TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_student_no ON accounts(student_no)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS result_records(
            username TEXT PRIMARY KEY,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS result_entries(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            language TEXT NOT NULL,
            score REAL NOT NULL,
            time_seconds REAL NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(username) REFERENCES result_records(username),
            UNIQUE(username, language)
        )",
        [],
    )?;

    // Workspaces created before the quiz timer shipped stored score-only rows.
    ensure_result_entries_time_seconds(&conn)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_result_entries_username ON result_entries(username, sort_order)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_result_entries_language ON result_entries(language)",
        [],
    )?;

    Ok(conn)
}

fn ensure_result_entries_time_seconds(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "result_entries", "time_seconds")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE result_entries ADD COLUMN time_seconds REAL NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

// ---- account store ----

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub fullname: String,
    pub username: String,
    pub password: String,
    pub student_no: String,
    pub birth_date: Option<String>,
    pub source_of_truth: Option<String>,
}

const ACCOUNT_COLUMNS: &str = "id, fullname, username, student_no, birth_date, source_of_truth";

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        fullname: row.get(1)?,
        username: row.get(2)?,
        student_no: row.get(3)?,
        birth_date: row.get(4)?,
        source_of_truth: row.get(5)?,
    })
}

pub fn account_create(conn: &Connection, new: &NewAccount) -> anyhow::Result<Account> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO accounts(id, fullname, username, password, student_no, birth_date, source_of_truth, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &new.fullname,
            &new.username,
            &new.password,
            &new.student_no,
            &new.birth_date,
            &new.source_of_truth,
            &now,
        ),
    )?;

    Ok(Account {
        id,
        fullname: new.fullname.clone(),
        username: new.username.clone(),
        student_no: new.student_no.clone(),
        birth_date: new.birth_date.clone(),
        source_of_truth: new.source_of_truth.clone(),
    })
}

pub fn account_username_taken(conn: &Connection, username: &str) -> anyhow::Result<bool> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM accounts WHERE username = ?",
            [username],
            |r| r.get(0),
        )
        .optional()?;
    Ok(existing.is_some())
}

/// Credential check for login. The password comparison happens in SQL so
/// the stored value stays out of the process's domain types.
pub fn account_find_by_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE username = ? AND password = ?",
        ACCOUNT_COLUMNS
    );
    let account = conn
        .query_row(&sql, (username, password), account_from_row)
        .optional()?;
    Ok(account)
}

pub fn account_find_by_student_no(
    conn: &Connection,
    student_no: &str,
) -> anyhow::Result<Option<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE student_no = ? ORDER BY rowid LIMIT 1",
        ACCOUNT_COLUMNS
    );
    let account = conn
        .query_row(&sql, [student_no], account_from_row)
        .optional()?;
    Ok(account)
}

/// Password reset keyed by campus ID. Returns the updated account, or
/// `None` when no account carries that ID.
pub fn account_update_password(
    conn: &Connection,
    student_no: &str,
    new_password: &str,
) -> anyhow::Result<Option<Account>> {
    let Some(account) = account_find_by_student_no(conn, student_no)? else {
        return Ok(None);
    };
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE accounts SET password = ?, updated_at = ? WHERE id = ?",
        (new_password, &now, &account.id),
    )?;
    Ok(Some(account))
}

/// Fullname projection for the dashboard's name list.
pub fn account_list_fullnames(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT fullname FROM accounts ORDER BY rowid")?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

pub fn account_list_all(conn: &Connection) -> anyhow::Result<Vec<Account>> {
    let sql = format!("SELECT {} FROM accounts ORDER BY rowid", ACCOUNT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let accounts = stmt
        .query_map([], account_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

// ---- result store ----

pub fn result_find_by_username(
    conn: &Connection,
    username: &str,
) -> anyhow::Result<Option<ResultRecord>> {
    let known: Option<String> = conn
        .query_row(
            "SELECT username FROM result_records WHERE username = ?",
            [username],
            |r| r.get(0),
        )
        .optional()?;
    if known.is_none() {
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT language, score, time_seconds
         FROM result_entries
         WHERE username = ?
         ORDER BY sort_order",
    )?;
    let entries = stmt
        .query_map([username], |r| {
            Ok(ResultEntry {
                language: r.get(0)?,
                score: r.get(1)?,
                time_seconds: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(ResultRecord {
        username: username.to_string(),
        entries,
    }))
}

/// Whole-record replace: the record's entry rows are rewritten in entry
/// order inside one transaction. Concurrent savers race at record
/// granularity; the last writer wins.
pub fn result_save(conn: &mut Connection, record: &ResultRecord) -> anyhow::Result<()> {
    let tx = conn.transaction()?;
    let now = Utc::now().to_rfc3339();

    tx.execute(
        "INSERT INTO result_records(username, updated_at) VALUES(?, ?)
         ON CONFLICT(username) DO UPDATE SET updated_at = excluded.updated_at",
        (&record.username, &now),
    )?;
    tx.execute(
        "DELETE FROM result_entries WHERE username = ?",
        [&record.username],
    )?;

    for (i, entry) in record.entries.iter().enumerate() {
        tx.execute(
            "INSERT INTO result_entries(id, username, language, score, time_seconds, sort_order)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &record.username,
                &entry.language,
                entry.score,
                entry.time_seconds,
                i as i64,
            ),
        )?;
    }

    tx.commit()?;
    Ok(())
}

pub fn result_list_all(conn: &Connection) -> anyhow::Result<Vec<ResultRecord>> {
    let mut record_stmt = conn.prepare("SELECT username FROM result_records ORDER BY rowid")?;
    let usernames = record_stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entry_stmt = conn.prepare(
        "SELECT username, language, score, time_seconds
         FROM result_entries
         ORDER BY sort_order",
    )?;
    let mut entries_by_username: std::collections::HashMap<String, Vec<ResultEntry>> =
        std::collections::HashMap::new();
    let rows = entry_stmt.query_map([], |r| {
        let username: String = r.get(0)?;
        Ok((
            username,
            ResultEntry {
                language: r.get(1)?,
                score: r.get(2)?,
                time_seconds: r.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (username, entry) = row?;
        entries_by_username.entry(username).or_default().push(entry);
    }

    let records = usernames
        .into_iter()
        .map(|username| {
            let entries = entries_by_username.remove(&username).unwrap_or_default();
            ResultRecord { username, entries }
        })
        .collect();
    Ok(records)
}
