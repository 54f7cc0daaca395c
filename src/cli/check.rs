//! `hotserve check`: load one route module and show what it resolves to.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::config::ReloadConfig;
use crate::reload::{ReloadEngine, log_errors};
use crate::route::{HandlerRegistry, RouteInfo, RouteOrigin, RouteTable, binder};

/// Everything `check` reports about a module.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub file: PathBuf,
    pub fingerprint: String,
    pub launch: Option<String>,
    pub exports: Vec<String>,
    /// Each module reachable from `file` (itself first) with its direct imports.
    pub dependencies: Vec<DependencyEntry>,
    pub routes: Vec<RouteInfo>,
}

#[derive(Debug, Serialize)]
pub struct DependencyEntry {
    pub module: PathBuf,
    pub imports: Vec<PathBuf>,
}

pub fn run(reload: &ReloadConfig, file: &Path, launch: Option<&str>, json: bool) -> Result<()> {
    let report = inspect(reload, file, launch)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Load `file` as the server would and describe it.
pub fn inspect(reload: &ReloadConfig, file: &Path, launch: Option<&str>) -> Result<CheckReport> {
    let engine = ReloadEngine::new(reload.clone(), HandlerRegistry::with_builtins(), log_errors());
    let module = engine
        .preload(file)
        .with_context(|| format!("cannot load {}", file.display()))?;

    let descs = binder::describe(&module, launch, engine.registry(), None)?;
    let table = RouteTable::new(binder::bind_all(descs, RouteOrigin::Source)?);

    let dependencies = std::iter::once(module.path.clone())
        .chain(engine.dependency_closure(&module.path))
        .map(|module| DependencyEntry {
            imports: engine.dependencies(&module),
            module,
        })
        .collect();

    Ok(CheckReport {
        file: module.path.clone(),
        fingerprint: module.fingerprint.clone(),
        launch: launch.map(str::to_string),
        exports: module.export_names().map(str::to_string).collect(),
        dependencies,
        routes: table.info(),
    })
}

fn print_report(report: &CheckReport) {
    println!("{} {}", "module".bold(), report.file.display());
    println!("  fingerprint {}", report.fingerprint.dimmed());
    if !report.exports.is_empty() {
        println!("  exports     {}", report.exports.join(", "));
    }

    println!("\n{}", "dependencies".bold());
    for entry in &report.dependencies {
        println!("  {}", entry.module.display());
        for import in &entry.imports {
            println!("    {} {}", "→".dimmed(), import.display());
        }
    }

    let title = match &report.launch {
        Some(name) => format!("routes ({name})"),
        None => "routes".to_string(),
    };
    println!("\n{}", title.bold());
    if report.routes.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for route in &report.routes {
        let middleware = match route.middleware {
            0 => String::new(),
            n => format!(" +{n} middleware"),
        };
        println!(
            "  {:<7} {}{}",
            route.method.green(),
            route.path,
            middleware.dimmed()
        );
    }
}
