//! The import command: validate, parse, connect, write, summarize

use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::args::Cli;
use crate::cli::output::Reporter;
use crate::core::config::ImportConfig;
use crate::core::resolve::CliOverrides;
use crate::import::{ImportPlan, ImportStats};
use crate::robot::{collect_result_files, parse_file, ExecutionResult};
use crate::store::{self, ConnectParams, DryRun, ResultStore};

pub fn run(cli: Cli) -> Result<()> {
    let reporter = Reporter::new(cli.dryrun);

    // Everything that can be checked offline is checked before connecting
    let overrides = CliOverrides::new(cli.variant.as_deref(), cli.versions.as_deref())?;
    let config = cli
        .config
        .as_deref()
        .map(ImportConfig::load)
        .transpose()?;

    let files = collect_result_files(&cli.resultxmlfile, cli.recursive)?;
    if cli.resultxmlfile.is_dir() {
        reporter.info(
            if cli.recursive {
                "Searching result files recursively..."
            } else {
                "Searching result files..."
            },
            0,
        );
        for file in &files {
            reporter.info(file.display(), 1);
        }
    }

    let parsed = files
        .iter()
        .map(|path| parse_file(path))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let result = ExecutionResult::new(parsed);
    log::info!(
        "parsed {} result file(s) with {} test case(s)",
        result.files.len(),
        result.suite.test_count()
    );

    let plan = ImportPlan::new(
        &result,
        &overrides,
        config.as_ref(),
        cli.uuid.as_deref(),
        cli.append,
    )?;

    let backend = store::connect(&ConnectParams::from(&cli))?;
    log::info!("connected to {} backend", backend.backend());

    let stats = if cli.dryrun {
        let mut dry = DryRun::new(backend);
        let stats = import(&plan, &mut dry, &reporter)?;
        for write in dry.planned() {
            log::debug!("planned write: {}", write);
        }
        stats
    } else {
        let mut backend = backend;
        import(&plan, &mut backend, &reporter)?
    };

    print_summary(&stats, cli.append, &reporter);
    Ok(())
}

fn import<S: ResultStore + ?Sized>(
    plan: &ImportPlan<'_>,
    store: &mut S,
    reporter: &Reporter,
) -> Result<ImportStats> {
    plan.check_existing(store, reporter)?;
    let stats = plan.write(store, reporter)?;
    Ok(stats)
}

fn print_summary(stats: &ImportStats, append: bool, reporter: &Reporter) {
    let mode = if append { "appended" } else { "written" };
    let count = if stats.skipped() > 0 {
        format!("{} of {}", stats.written, stats.total)
    } else {
        format!("All {}", stats.total)
    };
    let extended = if stats.skipped() > 0 {
        format!(
            " {} test cases are skipped because of errors.",
            stats.skipped()
        )
    } else {
        String::new()
    };

    reporter.blank();
    reporter.info(
        format!(
            "{} test cases are {} to database successfully.{}",
            style(count).cyan(),
            mode,
            extended
        ),
        0,
    );

    if !stats.components.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Component", "Test cases"]);
        for (component, count) in &stats.components {
            builder.push_record([component.clone(), count.to_string()]);
        }
        reporter.blank();
        reporter.info(builder.build().with(Style::rounded()).to_string(), 0);
    }

    if reporter.is_dryrun() {
        reporter.blank();
        reporter.info(
            style("Dry run complete. Nothing was written to the database.").yellow(),
            0,
        );
    }
}

impl From<&Cli> for ConnectParams {
    fn from(cli: &Cli) -> Self {
        Self {
            server: cli.server.clone(),
            user: cli.user.clone(),
            password: cli.password.clone(),
            database: cli.database.clone(),
            read_only: cli.dryrun,
        }
    }
}
