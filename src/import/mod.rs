//! Import pipeline: resolved execution result -> database rows
//!
//! [`ImportPlan::new`] resolves the run-level values, [`ImportPlan::check_existing`]
//! validates the run UUID against the store and [`ImportPlan::write`] walks
//! every test file and test case in document order.

use miette::Diagnostic;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::cli::output::Reporter;
use crate::core::config::ImportConfig;
use crate::core::records::{CaseRecord, FileRecord, HeaderRecord, ResultRecord};
use crate::core::resolve::{run_id, CliOverrides, ResolveError, Resolver, RunInfo};
use crate::robot::metadata::{run_metadata, SuiteMetadata};
use crate::robot::model::{ExecutionResult, Suite};
use crate::store::{ResultStore, StoreError};

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error("'--append' argument should be used in combination with '-UUID <UUID>' argument")]
    #[diagnostic(code(robotresults2db::args::append))]
    AppendWithoutUuid,

    #[error("UUID '{0}' is already existing in database")]
    #[diagnostic(
        code(robotresults2db::import::exists),
        help("Use another UUID (or omit -UUID) for a new execution result, or add --append to append to this one")
    )]
    ResultExists(String),

    #[error("UUID '{0}' is not existing for appending")]
    #[diagnostic(
        code(robotresults2db::import::missing),
        help("Use an existing UUID to append, or remove --append to create a new execution result")
    )]
    ResultMissing(String),

    #[error("Given project/variant '{given}' ({source_desc}) is different with existing value '{stored}' in database")]
    #[diagnostic(code(robotresults2db::import::variant_mismatch))]
    VariantMismatch {
        given: String,
        source_desc: String,
        stored: String,
    },

    #[error("Given version software '{given}' ({source_desc}) is different with existing value '{stored}' in database")]
    #[diagnostic(code(robotresults2db::import::version_mismatch))]
    VersionMismatch {
        given: String,
        source_desc: String,
        stored: String,
    },
}

/// Counters of one import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub files: usize,
    pub total: usize,
    pub written: usize,
    /// Written test cases per component label
    pub components: BTreeMap<String, usize>,
}

impl ImportStats {
    pub fn skipped(&self) -> usize {
        self.total - self.written
    }
}

/// Everything decided before the first write
#[derive(Debug)]
pub struct ImportPlan<'a> {
    pub test_result_id: String,
    pub run: RunInfo,
    pub append: bool,
    result: &'a ExecutionResult,
    resolver: Resolver<'a>,
    run_metadata: SuiteMetadata,
}

impl<'a> ImportPlan<'a> {
    pub fn new(
        result: &'a ExecutionResult,
        cli: &'a CliOverrides,
        config: Option<&'a ImportConfig>,
        uuid: Option<&str>,
        append: bool,
    ) -> Result<Self, ImportError> {
        if append && uuid.is_none() {
            return Err(ImportError::AppendWithoutUuid);
        }
        let test_result_id = run_id(uuid)?;
        let resolver = Resolver::new(cli, config, result.suite.outcome.start);
        let run_metadata = run_metadata(&result.suite);
        let run = resolver.run(&run_metadata);

        Ok(Self {
            test_result_id,
            run,
            append,
            result,
            resolver,
            run_metadata,
        })
    }

    /// Enforce the UUID rules: new runs need an unused UUID, appends an
    /// existing one whose explicitly given variant/version match.
    pub fn check_existing<S: ResultStore + ?Sized>(
        &self,
        store: &mut S,
        reporter: &Reporter,
    ) -> Result<(), ImportError> {
        let existing = store.existing_result(&self.test_result_id)?;
        match (existing, self.append) {
            (Some(_), false) => Err(ImportError::ResultExists(self.test_result_id.clone())),
            (None, true) => Err(ImportError::ResultMissing(self.test_result_id.clone())),
            (None, false) => Ok(()),
            (Some(stored), true) => {
                let project = &self.run.project;
                if !project.source.is_default() && project.value != stored.project {
                    return Err(ImportError::VariantMismatch {
                        given: project.value.clone(),
                        source_desc: project.source.to_string(),
                        stored: stored.project,
                    });
                }
                let version = &self.run.version_sw;
                if !version.source.is_default() && version.value != stored.version_sw_target {
                    return Err(ImportError::VersionMismatch {
                        given: version.value.clone(),
                        source_desc: version.source.to_string(),
                        stored: stored.version_sw_target,
                    });
                }
                reporter.info(
                    format!(
                        "Append to existing test execution result for variant '{}' - version '{}' - UUID '{}'",
                        stored.project, stored.version_sw_target, self.test_result_id
                    ),
                    0,
                );
                Ok(())
            }
        }
    }

    /// Write the execution result, every test file and every test case
    pub fn write<S: ResultStore + ?Sized>(
        &self,
        store: &mut S,
        reporter: &Reporter,
    ) -> Result<ImportStats, ImportError> {
        if !self.append {
            reporter.info(
                format!(
                    "Set project/variant to '{}' ({})",
                    self.run.project.value, self.run.project.source
                ),
                0,
            );
            reporter.info(
                format!(
                    "Set version_sw to '{}' ({})",
                    self.run.version_sw.value, self.run.version_sw.source
                ),
                0,
            );
            store.create_result(&ResultRecord::new(
                &self.test_result_id,
                &self.run,
                &self.result.suite,
            ))?;
            reporter.info(
                format!(
                    "Created test execution result for variant '{}' - version '{}' successfully: {}",
                    self.run.project.value, self.run.version_sw.value, self.test_result_id
                ),
                0,
            );
        }

        let mut stats = ImportStats::default();
        for file in &self.result.files {
            self.write_suite(
                store,
                reporter,
                &file.suite,
                &self.run_metadata,
                file.generator.as_deref(),
                &mut stats,
            )?;
        }

        store.finish(&self.test_result_id, self.append)?;
        Ok(stats)
    }

    fn write_suite<S: ResultStore + ?Sized>(
        &self,
        store: &mut S,
        reporter: &Reporter,
        suite: &Suite,
        inherited: &SuiteMetadata,
        generator: Option<&str>,
        stats: &mut ImportStats,
    ) -> Result<(), ImportError> {
        let metadata = inherited.overlaid_with(&suite.metadata);
        if !suite.is_leaf() {
            for child in &suite.suites {
                self.write_suite(store, reporter, child, &metadata, generator, stats)?;
            }
            return Ok(());
        }

        let source = suite.source_display();
        let info = self.resolver.file(&metadata, &source, generator);
        if info.project != self.run.project.value {
            reporter.warn(format!(
                "Test file '{}' has project '{}', but the execution result uses '{}'",
                source, info.project, self.run.project.value
            ));
        }
        if info.version_sw != self.run.version_sw.value {
            reporter.warn(format!(
                "Test file '{}' has version_sw '{}', but the execution result uses '{}'",
                source, info.version_sw, self.run.version_sw.value
            ));
        }

        let file = FileRecord::new(&self.test_result_id, suite, &info);
        let file_id = store.create_file(&file)?;
        store.create_header(file_id, &HeaderRecord::new(&file, suite, &info))?;
        stats.files += 1;
        reporter.info(
            format!(
                "Created test file result for file '{}' successfully: {}",
                file.name, file_id
            ),
            1,
        );

        let component = info.component.value.as_str();
        for (index, test) in suite.tests.iter().enumerate() {
            stats.total += 1;
            let testnumber = index as u32 + 1;

            let case = match CaseRecord::new(&self.test_result_id, test, testnumber, component) {
                Ok(case) => case,
                Err(e) => {
                    reporter.error(e);
                    continue;
                }
            };
            match store.create_case(file_id, &case) {
                Ok(case_id) => {
                    stats.written += 1;
                    *stats.components.entry(case.component.clone()).or_insert(0) += 1;
                    reporter.info(
                        format!(
                            "Created test case result for test '{}' successfully: {}",
                            case.name, case_id
                        ),
                        2,
                    );
                }
                Err(e) => {
                    reporter.error(format!(
                        "Could not create test case result for test '{}': {}",
                        case.name, e
                    ));
                }
            }
        }
        Ok(())
    }
}
