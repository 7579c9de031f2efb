//! Command handler functions for the testrs CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::db;
use crate::model::ClassReport;
use crate::pipeline::{collect, CollectConfig};
use crate::resolve::SourceTreeResolver;

/// Arguments of the `collect` command.
pub struct CollectArgs<'a> {
    pub reports_dir: &'a Path,
    pub sources: &'a Path,
    pub extensions: &'a [String],
    pub name: Option<&'a str>,
    pub details: bool,
}

/// Collect a reports directory into a new run. The run is written in a
/// single transaction; a report that fails to parse leaves no trace.
pub fn cmd_collect(conn: &mut Connection, args: &CollectArgs<'_>) -> Result<String> {
    let name = match args.name {
        Some(n) => n.to_string(),
        None => default_run_name(),
    };
    let config = CollectConfig {
        publish_details: args.details,
        ..CollectConfig::new(PathBuf::from(args.reports_dir))
    };
    let resolver = SourceTreeResolver::new(args.sources, args.extensions.to_vec());

    let tx = conn.transaction()?;
    let run_id = db::create_run(&tx, &name, args.reports_dir.to_str())?;
    let mut sink = db::SqliteSink::new(&tx, run_id);
    let summary = collect(&config, &resolver, &mut sink)
        .with_context(|| format!("Failed to collect {}", args.reports_dir.display()))?;
    tx.commit()?;

    let mut out = String::new();
    writeln!(
        out,
        "Collected {} report(s) from {} → run '{}'",
        summary.reports,
        args.reports_dir.display(),
        name
    )?;
    writeln!(out, "Classes:    {}", summary.classes)?;
    writeln!(out, "Tests:      {}", summary.tests)?;
    writeln!(out, "Saved:      {}", summary.saved)?;
    if !summary.unresolved.is_empty() {
        writeln!(out, "Unresolved: {}", summary.unresolved.len())?;
        for classname in &summary.unresolved {
            writeln!(out, "  {classname}")?;
        }
    }
    Ok(out)
}

pub fn cmd_runs(conn: &Connection) -> Result<String> {
    let runs = db::list_runs(conn)?;
    if runs.is_empty() {
        return Ok("No runs in database.\n".to_string());
    }
    let mut out = String::new();
    writeln!(out, "{:<30} {:>10}  {:<27} REPORTS", "NAME", "RESOURCES", "CREATED")?;
    writeln!(out, "{}", "-".repeat(90))?;
    for run in &runs {
        writeln!(
            out,
            "{:<30} {:>10}  {:<27} {}",
            run.name,
            run.resources,
            run.created_at,
            run.reports_dir.as_deref().unwrap_or("-")
        )?;
    }
    Ok(out)
}

pub fn cmd_measures(conn: &Connection, run: Option<&str>, resource: Option<&str>) -> Result<String> {
    let name = resolve_run_name(conn, run)?;
    let measures = db::get_measures(conn, &name, resource)?;
    if measures.is_empty() {
        return Ok(format!("No measures in run '{}'.\n", name));
    }

    let mut out = String::new();
    writeln!(out, "{:<50} {:<22} {:>12}", "RESOURCE", "METRIC", "VALUE")?;
    writeln!(out, "{}", "-".repeat(86))?;
    for m in &measures {
        writeln!(out, "{:<50} {:<22} {:>12}", m.resource, m.metric, m.value)?;
    }
    Ok(out)
}

pub fn cmd_details(conn: &Connection, resource: &str, run: Option<&str>) -> Result<String> {
    let name = resolve_run_name(conn, run)?;
    let Some(detail) = db::get_detail(conn, &name, resource)? else {
        return Ok(format!(
            "No test details for '{}' in run '{}' (collect with --details).\n",
            resource, name
        ));
    };
    let report = ClassReport::from_detail(&detail)?;

    let mut out = String::new();
    writeln!(
        out,
        "{}: {} tests, {} failures, {} errors, {} skipped",
        resource,
        report.tests(),
        report.failures(),
        report.errors(),
        report.skipped()
    )?;
    for case in report.results() {
        let duration = case
            .duration_millis
            .map(|ms| format!("{ms} ms"))
            .unwrap_or_else(|| "-".to_string());
        writeln!(out, "  [{:<7}] {} ({})", case.outcome, case.name, duration)?;
        if let Some(message) = &case.message {
            writeln!(out, "            {message}")?;
        }
    }
    Ok(out)
}

pub fn cmd_delete(conn: &Connection, name: &str) -> Result<String> {
    db::delete_run(conn, name)?;
    Ok(format!("Deleted run '{}'\n", name))
}

fn resolve_run_name(conn: &Connection, name: Option<&str>) -> Result<String> {
    match name {
        Some(n) => Ok(n.to_string()),
        None => db::get_latest_run_name(conn)?
            .ok_or_else(|| anyhow::anyhow!("No runs found in database")),
    }
}

fn default_run_name() -> String {
    chrono::Utc::now().format("run-%Y%m%dT%H%M%S%.3f").to_string()
}
