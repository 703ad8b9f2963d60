//! MySQL/MariaDB backend for the TestResultWebApp database

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, Transaction};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

use super::{ExistingResult, ResultStore, StoreError};
use crate::core::records::{
    CaseRecord, FileRecord, HeaderRecord, ResultRecord, STATE_IN_PROGRESS, STATE_NEW_REPORT,
};

/// Connection to the web application database, one transaction per run
pub struct MysqlStore {
    runtime: Runtime,
    pool: MySqlPool,
    tx: Option<Transaction<'static, MySql>>,
}

fn mysql_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |source| StoreError::Mysql { context, source }
}

impl MysqlStore {
    pub fn connect(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        database: &str,
    ) -> Result<Self, StoreError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(user)
            .password(password)
            .database(database)
            .charset("utf8mb4");

        let (pool, tx) = runtime.block_on(async {
            let pool = MySqlPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options)
                .await
                .map_err(|e| StoreError::Connect(e.to_string()))?;
            let tx = pool
                .begin()
                .await
                .map_err(mysql_err("Could not start transaction"))?;
            Ok::<_, StoreError>((pool, tx))
        })?;

        Ok(Self {
            runtime,
            pool,
            tx: Some(tx),
        })
    }
}

impl ResultStore for MysqlStore {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    fn existing_result(&mut self, test_result_id: &str) -> Result<Option<ExistingResult>, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;
        let row: Option<(String, String)> = self
            .runtime
            .block_on(
                sqlx::query_as(
                    "SELECT project, version_sw_target FROM tbl_result WHERE test_result_id = ?",
                )
                .bind(test_result_id)
                .fetch_optional(&mut **tx),
            )
            .map_err(mysql_err("Could not look up execution result"))?;

        Ok(row.map(|(project, version_sw_target)| ExistingResult {
            project,
            version_sw_target,
        }))
    }

    fn create_result(&mut self, result: &ResultRecord) -> Result<(), StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;
        self.runtime.block_on(async {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM tbl_prj WHERE project = ? AND variant = ? AND branch = ?",
            )
            .bind(&result.project)
            .bind(&result.variant)
            .bind(&result.branch)
            .fetch_one(&mut **tx)
            .await
            .map_err(mysql_err("Could not look up project"))?;

            if count == 0 {
                sqlx::query("INSERT INTO tbl_prj (project, variant, branch) VALUES (?, ?, ?)")
                    .bind(&result.project)
                    .bind(&result.variant)
                    .bind(&result.branch)
                    .execute(&mut **tx)
                    .await
                    .map_err(mysql_err("Could not create project"))?;
            }

            sqlx::query(
                "INSERT INTO tbl_result (test_result_id, project, variant, branch, time_start, \
                 time_end, version_sw_target, version_sw_test, version_hardware, jenkinsurl, \
                 reporting_qualitygate, result_state) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&result.test_result_id)
            .bind(&result.project)
            .bind(&result.variant)
            .bind(&result.branch)
            .bind(&result.time_start)
            .bind(&result.time_end)
            .bind(&result.version_sw_target)
            .bind(&result.version_sw_test)
            .bind(&result.version_hardware)
            .bind(&result.jenkinsurl)
            .bind(&result.reporting_qualitygate)
            .bind(STATE_IN_PROGRESS)
            .execute(&mut **tx)
            .await
            .map_err(mysql_err("Could not create execution result"))?;

            Ok(())
        })
    }

    fn create_file(&mut self, file: &FileRecord) -> Result<i64, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;
        let done = self
            .runtime
            .block_on(
                sqlx::query(
                    "INSERT INTO tbl_file (name, tester_account, tester_machine, time_start, \
                     time_end, test_result_id, origin) VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&file.name)
                .bind(&file.tester_account)
                .bind(&file.tester_machine)
                .bind(&file.time_start)
                .bind(&file.time_end)
                .bind(&file.test_result_id)
                .bind(&file.origin)
                .execute(&mut **tx),
            )
            .map_err(mysql_err("Could not create test file"))?;
        Ok(done.last_insert_id() as i64)
    }

    fn create_header(&mut self, file_id: i64, header: &HeaderRecord) -> Result<(), StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;
        let columns = header.columns();
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let sql = format!(
            "INSERT INTO tbl_file_header (file_id, {}) VALUES (?{})",
            names.join(", "),
            ", ?".repeat(columns.len())
        );

        let mut query = sqlx::query(&sql).bind(file_id);
        for (_, value) in columns {
            query = query.bind(value);
        }
        self.runtime
            .block_on(query.execute(&mut **tx))
            .map_err(mysql_err("Could not create test file header"))?;
        Ok(())
    }

    fn create_case(&mut self, file_id: i64, case: &CaseRecord) -> Result<i64, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;
        let done = self
            .runtime
            .block_on(
                sqlx::query(
                    "INSERT INTO tbl_case (name, issue, tcid, fid, testnumber, repeatcount, \
                     component, time_start, result_main, result_state, result_return, \
                     counter_resets, lastlog, test_result_id, file_id) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&case.name)
                .bind(&case.issue)
                .bind(&case.tcid)
                .bind(&case.fid)
                .bind(case.testnumber)
                .bind(case.repeatcount)
                .bind(&case.component)
                .bind(&case.time_start)
                .bind(&case.result_main)
                .bind(&case.result_state)
                .bind(case.result_return)
                .bind(case.counter_resets)
                .bind(&case.lastlog)
                .bind(&case.test_result_id)
                .bind(file_id)
                .execute(&mut **tx),
            )
            .map_err(mysql_err("Could not create test case"))?;
        Ok(done.last_insert_id() as i64)
    }

    fn finish(&mut self, test_result_id: &str, append: bool) -> Result<(), StoreError> {
        let mut tx = self.tx.take().ok_or(StoreError::Finished)?;
        self.runtime.block_on(async {
            sqlx::query("CALL update_evtbls()")
                .execute(&mut *tx)
                .await
                .map_err(mysql_err("Could not update evaluation tables"))?;

            sqlx::query("UPDATE tbl_result SET result_state = ? WHERE test_result_id = ?")
                .bind(STATE_NEW_REPORT)
                .bind(test_result_id)
                .execute(&mut *tx)
                .await
                .map_err(mysql_err("Could not finish execution result"))?;

            if append {
                sqlx::query("CALL update_evtbl(?)")
                    .bind(test_result_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(mysql_err("Could not update evaluation table"))?;
            }

            tx.commit().await.map_err(mysql_err("Could not commit"))
        })
    }
}

impl Drop for MysqlStore {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            log::debug!("rolling back unfinished import");
            if let Err(e) = self.runtime.block_on(tx.rollback()) {
                log::warn!("rollback failed: {}", e);
            }
        }
        self.runtime.block_on(self.pool.close());
    }
}
