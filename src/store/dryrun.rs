//! Dry-run wrapper: reads go to the real backend, writes are only recorded

use super::{ExistingResult, ResultStore, StoreError};
use crate::core::records::{CaseRecord, FileRecord, HeaderRecord, ResultRecord};

/// Wraps a store and swallows every write
pub struct DryRun<S> {
    inner: S,
    next_file_id: i64,
    next_case_id: i64,
    planned: Vec<String>,
}

impl<S: ResultStore> DryRun<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            next_file_id: 1,
            next_case_id: 1,
            planned: Vec::new(),
        }
    }

    /// Descriptions of the writes that would have been made
    pub fn planned(&self) -> &[String] {
        &self.planned
    }
}

impl<S: ResultStore> ResultStore for DryRun<S> {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    fn existing_result(&mut self, test_result_id: &str) -> Result<Option<ExistingResult>, StoreError> {
        self.inner.existing_result(test_result_id)
    }

    fn create_result(&mut self, result: &ResultRecord) -> Result<(), StoreError> {
        self.planned.push(format!(
            "tbl_result {} ({}/{}/{})",
            result.test_result_id, result.project, result.branch, result.version_sw_target
        ));
        Ok(())
    }

    fn create_file(&mut self, file: &FileRecord) -> Result<i64, StoreError> {
        let id = self.next_file_id;
        self.next_file_id += 1;
        self.planned.push(format!("tbl_file {} '{}'", id, file.name));
        Ok(id)
    }

    fn create_header(&mut self, file_id: i64, _header: &HeaderRecord) -> Result<(), StoreError> {
        self.planned.push(format!("tbl_file_header {}", file_id));
        Ok(())
    }

    fn create_case(&mut self, file_id: i64, case: &CaseRecord) -> Result<i64, StoreError> {
        let id = self.next_case_id;
        self.next_case_id += 1;
        self.planned
            .push(format!("tbl_case {} '{}' in file {}", id, case.name, file_id));
        Ok(id)
    }

    /// Nothing to commit; the wrapped store rolls back when dropped
    fn finish(&mut self, test_result_id: &str, append: bool) -> Result<(), StoreError> {
        self.planned.push(format!(
            "finish {}{}",
            test_result_id,
            if append { " (append)" } else { "" }
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_writes_are_not_forwarded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("results.db");

        let mut store = DryRun::new(SqliteStore::open(&path).unwrap());
        store
            .create_result(&ResultRecord {
                test_result_id: "r1".to_string(),
                project: "CAR".to_string(),
                variant: "CAR".to_string(),
                branch: "main".to_string(),
                time_start: None,
                time_end: None,
                version_sw_target: "1.0".to_string(),
                version_sw_test: String::new(),
                version_hardware: String::new(),
                jenkinsurl: String::new(),
                reporting_qualitygate: String::new(),
            })
            .unwrap();
        let file_id = store
            .create_file(&FileRecord {
                name: "a.robot".to_string(),
                tester_account: String::new(),
                tester_machine: String::new(),
                time_start: None,
                time_end: None,
                test_result_id: "r1".to_string(),
                origin: "ROBFW".to_string(),
            })
            .unwrap();
        assert_eq!(file_id, 1);
        store.finish("r1", false).unwrap();

        assert_eq!(store.planned().len(), 3);
        assert_eq!(store.existing_result("r1").unwrap(), None);
        drop(store);

        let mut reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.existing_result("r1").unwrap(), None);
    }
}
