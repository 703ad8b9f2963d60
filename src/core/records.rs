//! Rows written to the TestResultWebApp tables
//!
//! Records are built once from resolved values and handed to a
//! [`ResultStore`](crate::store::ResultStore). All text is truncated to the
//! column widths of the web application schema.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDateTime;
use miette::Diagnostic;
use thiserror::Error;

use crate::core::resolve::{FileInfo, RunInfo, TestTool};
use crate::robot::metadata::TagIds;
use crate::robot::model::{Suite, TestCase};

/// Width of regular text columns
pub const MAX_TEXT: usize = 255;
/// Width of short columns (test tool name, encoding, component, ...)
pub const MAX_SHORT: usize = 45;

/// Value stored in `tbl_file.origin`
pub const FILE_ORIGIN: &str = "ROBFW";
pub const LOGFILE_ENCODING: &str = "UTF-8";

pub const STATE_IN_PROGRESS: &str = "in progress";
pub const STATE_NEW_REPORT: &str = "new report";
pub const CASE_STATE_COMPLETE: &str = "complete";
pub const CASE_RESULT_RETURN: i32 = 11;

/// Timestamp layout expected by the web application
const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Error, Diagnostic)]
pub enum RecordError {
    #[error("Invalid Robot Framework result state '{status}' of test '{test}'")]
    #[diagnostic(code(robotresults2db::record::status))]
    InvalidStatus { test: String, status: String },
}

/// Truncate to at most `max_len` characters, ending in `...` when shortened
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let keep = max_len.saturating_sub(3);
        format!("{}...", s.chars().take(keep).collect::<String>())
    }
}

pub fn format_time(time: Option<NaiveDateTime>) -> Option<String> {
    time.map(|t| t.format(DB_TIME_FORMAT).to_string())
}

/// `tbl_result` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub test_result_id: String,
    pub project: String,
    pub variant: String,
    pub branch: String,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub version_sw_target: String,
    pub version_sw_test: String,
    pub version_hardware: String,
    pub jenkinsurl: String,
    pub reporting_qualitygate: String,
}

impl ResultRecord {
    pub fn new(test_result_id: &str, run: &RunInfo, suite: &Suite) -> Self {
        Self {
            test_result_id: test_result_id.to_string(),
            project: run.project.value.clone(),
            variant: run.project.value.clone(),
            branch: run.branch.clone(),
            time_start: format_time(suite.outcome.start),
            time_end: format_time(suite.outcome.end),
            version_sw_target: run.version_sw.value.clone(),
            version_sw_test: run.version_test.clone(),
            version_hardware: run.version_hw.clone(),
            jenkinsurl: String::new(),
            reporting_qualitygate: String::new(),
        }
    }
}

/// `tbl_file` row, one per test file (leaf suite)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub tester_account: String,
    pub tester_machine: String,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub test_result_id: String,
    pub origin: String,
}

impl FileRecord {
    pub fn new(test_result_id: &str, suite: &Suite, info: &FileInfo) -> Self {
        Self {
            name: truncate(&suite.source_display(), MAX_TEXT),
            tester_account: truncate(&info.tester, MAX_TEXT),
            tester_machine: truncate(&info.machine, MAX_TEXT),
            time_start: format_time(suite.outcome.start),
            time_end: format_time(suite.outcome.end),
            test_result_id: test_result_id.to_string(),
            origin: FILE_ORIGIN.to_string(),
        }
    }
}

/// `tbl_file_header` row
///
/// Columns without a Robot Framework counterpart are written empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    pub testtoolconfiguration_testtoolname: String,
    pub testtoolconfiguration_testtoolversionstring: String,
    pub testtoolconfiguration_projectname: String,
    pub testtoolconfiguration_logfileencoding: String,
    pub testtoolconfiguration_pythonversion: String,
    pub testtoolconfiguration_testfile: String,
    pub testtoolconfiguration_logfilepath: String,
    pub testtoolconfiguration_logfilemode: String,
    pub testtoolconfiguration_ctrlfilepath: String,
    pub testtoolconfiguration_configfile: String,
    pub testtoolconfiguration_confname: String,

    pub testfileheader_author: String,
    pub testfileheader_project: String,
    pub testfileheader_testfiledate: String,
    pub testfileheader_version_major: String,
    pub testfileheader_version_minor: String,
    pub testfileheader_version_patch: String,
    pub testfileheader_keyword: String,
    pub testfileheader_shortdescription: String,

    pub testexecution_useraccount: String,
    pub testexecution_computername: String,

    pub testrequirements_documentmanagement: String,
    pub testrequirements_testenvironment: String,

    pub testbenchconfig_name: String,
    pub testbenchconfig_data: String,

    pub preprocessor_filter: String,
    pub preprocessor_parameters: String,
}

impl HeaderRecord {
    pub fn new(file: &FileRecord, suite: &Suite, info: &FileInfo) -> Self {
        let tool = TestTool::parse(&info.testtool);
        Self {
            testtoolconfiguration_testtoolname: truncate(&tool.name, MAX_SHORT),
            testtoolconfiguration_testtoolversionstring: truncate(&tool.version, MAX_TEXT),
            testtoolconfiguration_projectname: truncate(&info.project, MAX_TEXT),
            testtoolconfiguration_logfileencoding: truncate(LOGFILE_ENCODING, MAX_SHORT),
            testtoolconfiguration_pythonversion: truncate(&tool.python_version, MAX_TEXT),
            testtoolconfiguration_testfile: file.name.clone(),
            testtoolconfiguration_configfile: truncate(&info.configfile, MAX_TEXT),
            testfileheader_author: truncate(&info.author, MAX_TEXT),
            testfileheader_project: truncate(&info.project, MAX_TEXT),
            testfileheader_shortdescription: truncate(&suite.doc, MAX_TEXT),
            testexecution_useraccount: truncate(&info.tester, MAX_TEXT),
            testexecution_computername: truncate(&info.machine, MAX_TEXT),
            ..Self::default()
        }
    }

    /// Column values in `tbl_file_header` order (after `file_id`)
    pub fn columns(&self) -> [(&'static str, &str); 27] {
        [
            ("testtoolconfiguration_testtoolname", self.testtoolconfiguration_testtoolname.as_str()),
            ("testtoolconfiguration_testtoolversionstring", self.testtoolconfiguration_testtoolversionstring.as_str()),
            ("testtoolconfiguration_projectname", self.testtoolconfiguration_projectname.as_str()),
            ("testtoolconfiguration_logfileencoding", self.testtoolconfiguration_logfileencoding.as_str()),
            ("testtoolconfiguration_pythonversion", self.testtoolconfiguration_pythonversion.as_str()),
            ("testtoolconfiguration_testfile", self.testtoolconfiguration_testfile.as_str()),
            ("testtoolconfiguration_logfilepath", self.testtoolconfiguration_logfilepath.as_str()),
            ("testtoolconfiguration_logfilemode", self.testtoolconfiguration_logfilemode.as_str()),
            ("testtoolconfiguration_ctrlfilepath", self.testtoolconfiguration_ctrlfilepath.as_str()),
            ("testtoolconfiguration_configfile", self.testtoolconfiguration_configfile.as_str()),
            ("testtoolconfiguration_confname", self.testtoolconfiguration_confname.as_str()),
            ("testfileheader_author", self.testfileheader_author.as_str()),
            ("testfileheader_project", self.testfileheader_project.as_str()),
            ("testfileheader_testfiledate", self.testfileheader_testfiledate.as_str()),
            ("testfileheader_version_major", self.testfileheader_version_major.as_str()),
            ("testfileheader_version_minor", self.testfileheader_version_minor.as_str()),
            ("testfileheader_version_patch", self.testfileheader_version_patch.as_str()),
            ("testfileheader_keyword", self.testfileheader_keyword.as_str()),
            ("testfileheader_shortdescription", self.testfileheader_shortdescription.as_str()),
            ("testexecution_useraccount", self.testexecution_useraccount.as_str()),
            ("testexecution_computername", self.testexecution_computername.as_str()),
            ("testrequirements_documentmanagement", self.testrequirements_documentmanagement.as_str()),
            ("testrequirements_testenvironment", self.testrequirements_testenvironment.as_str()),
            ("testbenchconfig_name", self.testbenchconfig_name.as_str()),
            ("testbenchconfig_data", self.testbenchconfig_data.as_str()),
            ("preprocessor_filter", self.preprocessor_filter.as_str()),
            ("preprocessor_parameters", self.preprocessor_parameters.as_str()),
        ]
    }
}

/// `tbl_case` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub name: String,
    pub issue: String,
    pub tcid: String,
    pub fid: String,
    /// 1-based position within the test file
    pub testnumber: u32,
    pub repeatcount: u32,
    pub component: String,
    pub time_start: Option<String>,
    pub result_main: String,
    pub result_state: String,
    pub result_return: i32,
    pub counter_resets: i32,
    /// Base64 of the status message, NULL when there is none
    pub lastlog: Option<String>,
    pub test_result_id: String,
}

impl CaseRecord {
    pub fn new(
        test_result_id: &str,
        test: &TestCase,
        testnumber: u32,
        component: &str,
    ) -> Result<Self, RecordError> {
        let name = truncate(&test.name, MAX_TEXT);
        let result_main = test
            .outcome
            .status
            .and_then(|s| s.result_main())
            .ok_or_else(|| RecordError::InvalidStatus {
                test: name.clone(),
                status: test.outcome.raw.clone(),
            })?;
        let ids = TagIds::from_tags(&test.tags);

        Ok(Self {
            name,
            issue: ids.issue(),
            tcid: ids.tcid(),
            fid: ids.fid(),
            testnumber,
            repeatcount: 1,
            component: truncate(component, MAX_SHORT),
            time_start: format_time(test.outcome.start),
            result_main: result_main.to_string(),
            result_state: CASE_STATE_COMPLETE.to_string(),
            result_return: CASE_RESULT_RETURN,
            counter_resets: 0,
            lastlog: (!test.outcome.message.is_empty())
                .then(|| BASE64.encode(test.outcome.message.as_bytes())),
            test_result_id: test_result_id.to_string(),
        })
    }
}
