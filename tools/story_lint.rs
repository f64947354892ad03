/// Story Linter: loads story projects and reports problems that would show
/// up in play.
///
/// Usage: story_lint <project file or dir> [--strict] [--quiet]

use std::path::{Path, PathBuf};
use std::process;

use story_engine::core::lint::{lint, Severity};
use story_engine::StoryGraph;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "story_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_lint <project file or dir> [--strict] [--quiet]");
        println!();
        println!("  --strict   Treat warnings as errors");
        println!("  --quiet    Hide informational notes");
        process::exit(0);
    }

    let mut strict = false;
    let mut quiet = false;
    for arg in &args[2..] {
        match arg.as_str() {
            "--strict" => strict = true,
            "--quiet" => quiet = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
    }

    let root = Path::new(&args[1]);
    let files = if root.is_file() {
        vec![root.to_path_buf()]
    } else if root.is_dir() {
        let mut files = Vec::new();
        collect_projects(root, &mut files);
        files.sort();
        files
    } else {
        eprintln!("ERROR: Path '{}' does not exist", root.display());
        process::exit(1);
    };

    let mut errors = 0;
    let mut warnings = 0;

    for path in &files {
        println!("\n=== {} ===", path.display());
        let graph = match StoryGraph::load(path) {
            Ok(graph) => graph,
            Err(e) => {
                println!("ERROR: failed to load: {}", e);
                errors += 1;
                continue;
            }
        };
        println!(
            "{} passages, {} variables",
            graph.passages.len(),
            graph.variable_defs.len()
        );

        let diagnostics = lint(&graph);
        let mut shown = 0;
        for diag in &diagnostics {
            match diag.severity {
                Severity::Error => errors += 1,
                Severity::Warning if strict => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Info if quiet => continue,
                Severity::Info => {}
            }
            println!("{}", diag);
            shown += 1;
        }
        if shown == 0 {
            println!("All checks passed!");
        }
    }

    println!(
        "\nSummary: {} files, {} errors, {} warnings",
        files.len(),
        errors,
        warnings
    );

    if errors == 0 {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn collect_projects(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_projects(&path, files);
            } else if matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("json" | "ron")
            ) {
                files.push(path);
            }
        }
    }
}
