//! SQLite mirror of the TestResultWebApp tables

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

use super::{ExistingResult, ResultStore, StoreError};
use crate::core::records::{
    CaseRecord, FileRecord, HeaderRecord, ResultRecord, STATE_IN_PROGRESS, STATE_NEW_REPORT,
};

/// Local result database, written inside one transaction per run
pub struct SqliteStore {
    conn: Connection,
    in_transaction: bool,
}

fn sqlite_err(context: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Sqlite { context, source }
}

impl SqliteStore {
    /// Open or create the database at `path` and begin the run transaction
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Connect(format!("{}: {}", path.display(), e)))?;
        Self::with_connection(conn)
    }

    /// Open an existing database for lookups only, as used by a dry run.
    ///
    /// Nothing is created on disk: a missing file is replaced by an empty
    /// in-memory database, and a file without result tables simply has no
    /// existing results.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            log::debug!("{} does not exist, dry run starts from an empty database", path.display());
            return Self::open_in_memory();
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| StoreError::Connect(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    /// In-memory store, mostly useful for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Connect(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let mut store = Self {
            conn,
            in_transaction: false,
        };
        store.init_schema()?;
        store
            .conn
            .execute_batch("BEGIN")
            .map_err(sqlite_err("Could not start transaction"))?;
        store.in_transaction = true;
        Ok(store)
    }

    /// Create the result tables if they do not exist yet
    fn init_schema(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS tbl_prj (
                project TEXT NOT NULL,
                variant TEXT NOT NULL,
                branch TEXT NOT NULL,
                PRIMARY KEY (project, variant, branch)
            );

            -- One row per import run
            CREATE TABLE IF NOT EXISTS tbl_result (
                test_result_id TEXT PRIMARY KEY,
                project TEXT NOT NULL,
                variant TEXT NOT NULL,
                branch TEXT NOT NULL,
                time_start TEXT,
                time_end TEXT,
                version_sw_target TEXT NOT NULL,
                version_sw_test TEXT NOT NULL DEFAULT '',
                version_hardware TEXT NOT NULL DEFAULT '',
                jenkinsurl TEXT NOT NULL DEFAULT '',
                reporting_qualitygate TEXT NOT NULL DEFAULT '',
                interpretation TEXT,
                result_state TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tbl_file (
                file_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                tester_account TEXT NOT NULL DEFAULT '',
                tester_machine TEXT NOT NULL DEFAULT '',
                time_start TEXT,
                time_end TEXT,
                test_result_id TEXT NOT NULL REFERENCES tbl_result(test_result_id),
                origin TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_file_result ON tbl_file(test_result_id);

            CREATE TABLE IF NOT EXISTS tbl_file_header (
                file_id INTEGER PRIMARY KEY REFERENCES tbl_file(file_id),
                testtoolconfiguration_testtoolname TEXT,
                testtoolconfiguration_testtoolversionstring TEXT,
                testtoolconfiguration_projectname TEXT,
                testtoolconfiguration_logfileencoding TEXT,
                testtoolconfiguration_pythonversion TEXT,
                testtoolconfiguration_testfile TEXT,
                testtoolconfiguration_logfilepath TEXT,
                testtoolconfiguration_logfilemode TEXT,
                testtoolconfiguration_ctrlfilepath TEXT,
                testtoolconfiguration_configfile TEXT,
                testtoolconfiguration_confname TEXT,
                testfileheader_author TEXT,
                testfileheader_project TEXT,
                testfileheader_testfiledate TEXT,
                testfileheader_version_major TEXT,
                testfileheader_version_minor TEXT,
                testfileheader_version_patch TEXT,
                testfileheader_keyword TEXT,
                testfileheader_shortdescription TEXT,
                testexecution_useraccount TEXT,
                testexecution_computername TEXT,
                testrequirements_documentmanagement TEXT,
                testrequirements_testenvironment TEXT,
                testbenchconfig_name TEXT,
                testbenchconfig_data TEXT,
                preprocessor_filter TEXT,
                preprocessor_parameters TEXT
            );

            CREATE TABLE IF NOT EXISTS tbl_case (
                test_case_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                issue TEXT NOT NULL DEFAULT '',
                tcid TEXT NOT NULL DEFAULT '',
                fid TEXT NOT NULL DEFAULT '',
                testnumber INTEGER NOT NULL,
                repeatcount INTEGER NOT NULL,
                component TEXT NOT NULL,
                time_start TEXT,
                result_main TEXT NOT NULL,
                result_state TEXT NOT NULL,
                result_return INTEGER NOT NULL,
                counter_resets INTEGER NOT NULL,
                lastlog TEXT,
                test_result_id TEXT NOT NULL REFERENCES tbl_result(test_result_id),
                file_id INTEGER NOT NULL REFERENCES tbl_file(file_id)
            );
            CREATE INDEX IF NOT EXISTS idx_case_result ON tbl_case(test_result_id);
            CREATE INDEX IF NOT EXISTS idx_case_file ON tbl_case(file_id);

            -- Stand-in for the web application's evaluation tables
            CREATE TABLE IF NOT EXISTS evtbl_result_main (
                test_result_id TEXT PRIMARY KEY,
                total INTEGER NOT NULL,
                passed INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                unknown INTEGER NOT NULL
            );
            "#,
            )
            .map_err(sqlite_err("Could not create result tables"))
    }

    fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(sqlite_err("Could not inspect database schema"))
    }

    /// Recompute the evaluation summary for one result, or all results
    fn refresh_evtbl(&self, test_result_id: Option<&str>) -> Result<(), StoreError> {
        let summary = r#"
            INSERT OR REPLACE INTO evtbl_result_main (test_result_id, total, passed, failed, unknown)
            SELECT r.test_result_id,
                   COUNT(c.test_case_id),
                   COALESCE(SUM(c.result_main = 'Passed'), 0),
                   COALESCE(SUM(c.result_main = 'Failed'), 0),
                   COALESCE(SUM(c.result_main = 'Unknown'), 0)
            FROM tbl_result r
            LEFT JOIN tbl_case c ON c.test_result_id = r.test_result_id
        "#;
        match test_result_id {
            Some(id) => self
                .conn
                .execute(
                    &format!("{summary} WHERE r.test_result_id = ?1 GROUP BY r.test_result_id"),
                    params![id],
                )
                .map(|_| ())
                .map_err(sqlite_err("Could not update evaluation table")),
            None => self
                .conn
                .execute_batch(&format!("{summary} GROUP BY r.test_result_id"))
                .map_err(sqlite_err("Could not update evaluation tables")),
        }
    }
}

impl ResultStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn existing_result(&mut self, test_result_id: &str) -> Result<Option<ExistingResult>, StoreError> {
        if !self.has_table("tbl_result")? {
            return Ok(None);
        }
        self.conn
            .query_row(
                "SELECT project, version_sw_target FROM tbl_result WHERE test_result_id = ?1",
                params![test_result_id],
                |row| {
                    Ok(ExistingResult {
                        project: row.get(0)?,
                        version_sw_target: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(sqlite_err("Could not look up execution result"))
    }

    fn create_result(&mut self, result: &ResultRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO tbl_prj (project, variant, branch) VALUES (?1, ?2, ?3)",
                params![result.project, result.variant, result.branch],
            )
            .map_err(sqlite_err("Could not create project"))?;

        self.conn
            .execute(
                r#"INSERT INTO tbl_result (test_result_id, project, variant, branch, time_start,
                    time_end, version_sw_target, version_sw_test, version_hardware, jenkinsurl,
                    reporting_qualitygate, result_state)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
                params![
                    result.test_result_id,
                    result.project,
                    result.variant,
                    result.branch,
                    result.time_start,
                    result.time_end,
                    result.version_sw_target,
                    result.version_sw_test,
                    result.version_hardware,
                    result.jenkinsurl,
                    result.reporting_qualitygate,
                    STATE_IN_PROGRESS,
                ],
            )
            .map_err(sqlite_err("Could not create execution result"))?;
        Ok(())
    }

    fn create_file(&mut self, file: &FileRecord) -> Result<i64, StoreError> {
        self.conn
            .execute(
                r#"INSERT INTO tbl_file (name, tester_account, tester_machine, time_start,
                    time_end, test_result_id, origin)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    file.name,
                    file.tester_account,
                    file.tester_machine,
                    file.time_start,
                    file.time_end,
                    file.test_result_id,
                    file.origin,
                ],
            )
            .map_err(sqlite_err("Could not create test file"))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_header(&mut self, file_id: i64, header: &HeaderRecord) -> Result<(), StoreError> {
        let columns = header.columns();
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> = (2..=columns.len() + 1).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO tbl_file_header (file_id, {}) VALUES (?1, {})",
            names.join(", "),
            placeholders.join(", ")
        );

        let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(columns.len() + 1);
        values.push(&file_id);
        values.extend(columns.iter().map(|(_, value)| value as &dyn rusqlite::ToSql));

        self.conn
            .execute(&sql, values.as_slice())
            .map_err(sqlite_err("Could not create test file header"))?;
        Ok(())
    }

    fn create_case(&mut self, file_id: i64, case: &CaseRecord) -> Result<i64, StoreError> {
        self.conn
            .execute(
                r#"INSERT INTO tbl_case (name, issue, tcid, fid, testnumber, repeatcount,
                    component, time_start, result_main, result_state, result_return,
                    counter_resets, lastlog, test_result_id, file_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
                params![
                    case.name,
                    case.issue,
                    case.tcid,
                    case.fid,
                    case.testnumber,
                    case.repeatcount,
                    case.component,
                    case.time_start,
                    case.result_main,
                    case.result_state,
                    case.result_return,
                    case.counter_resets,
                    case.lastlog,
                    case.test_result_id,
                    file_id,
                ],
            )
            .map_err(sqlite_err("Could not create test case"))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish(&mut self, test_result_id: &str, append: bool) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Err(StoreError::Finished);
        }
        self.refresh_evtbl(None)?;
        self.conn
            .execute(
                "UPDATE tbl_result SET result_state = ?1 WHERE test_result_id = ?2",
                params![STATE_NEW_REPORT, test_result_id],
            )
            .map_err(sqlite_err("Could not finish execution result"))?;
        if append {
            self.refresh_evtbl(Some(test_result_id))?;
        }
        self.conn
            .execute_batch("COMMIT")
            .map_err(sqlite_err("Could not commit"))?;
        self.in_transaction = false;
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("rollback of unfinished import failed: {}", e);
            }
        }
    }
}
