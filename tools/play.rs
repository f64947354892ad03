/// Play: interactive terminal player for story projects.
///
/// Usage: play <project.json|project.ron> [--seed <n>] [--max-steps <n>]
///
/// Commands:
///   <n> | choose <n>    pick choice n (1-based)
///   next                continue a scene without choices
///   vars / inv / npcs   show session state
///   history             visited passages
///   eval <expr>         evaluate an expression against the variables
///   restart             start over
///   help                list commands
///   quit                exit

use std::io::{self, BufRead, Write};
use std::process;

use story_engine::core::flow::DEFAULT_MAX_CHAIN_STEPS;
use story_engine::schema::passage::Passage;
use story_engine::{EngineError, Step, StoryEngine, StoryEvent};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "story_engine=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let project = &args[1];
    let mut seed: u64 = 42;
    let mut max_steps = DEFAULT_MAX_CHAIN_STEPS;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--max-steps" if i + 1 < args.len() => {
                i += 1;
                max_steps = args[i].parse().unwrap_or(DEFAULT_MAX_CHAIN_STEPS);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut engine = match StoryEngine::builder()
        .seed(seed)
        .max_chain_steps(max_steps)
        .project(project)
        .build()
    {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    engine.subscribe(|event| {
        if let StoryEvent::SoundRequested(clip) = event {
            println!("  ♪ {}", clip);
        }
    });

    if let Some(graph) = engine.graph() {
        let meta = &graph.meta;
        if meta.author.is_empty() {
            println!("{} (v{})", meta.name, meta.version);
        } else {
            println!("{} by {} (v{})", meta.name, meta.author, meta.version);
        }
        println!("{} passages, seed {}", graph.passages.len(), seed);
    }
    println!("Type 'help' for commands.\n");

    show(engine.start());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match cmd.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "next" | "n" => show(engine.next_dialogue()),
            "choose" | "c" => match rest.parse::<usize>() {
                Ok(n) if n >= 1 => show(engine.select_choice(n - 1)),
                _ => println!("Usage: choose <n>"),
            },
            "vars" => {
                let mut vars: Vec<_> = engine.state().variables().iter().collect();
                vars.sort_by(|a, b| a.0.cmp(b.0));
                if vars.is_empty() {
                    println!("(no variables)");
                }
                for (name, value) in vars {
                    println!("  {} = {} ({})", name, value, value.type_name());
                }
            }
            "inv" => {
                let mut items: Vec<_> = engine.state().inventory().iter().collect();
                items.sort_by(|a, b| a.0.cmp(b.0));
                if items.is_empty() {
                    println!("(inventory empty)");
                }
                for (item, qty) in items {
                    println!("  {} x{}", item, qty);
                }
            }
            "npcs" => {
                let mut npcs: Vec<_> = engine.state().npcs().iter().collect();
                npcs.sort_by(|a, b| a.0.cmp(b.0));
                if npcs.is_empty() {
                    println!("(no npcs)");
                }
                for (id, npc) in npcs {
                    println!(
                        "  {}: {} at {}{}",
                        id,
                        npc.status.name(),
                        npc.location,
                        if npc.spawned { "" } else { " (not spawned)" }
                    );
                }
            }
            "history" => {
                println!("  {}", engine.state().history().join(" -> "));
            }
            "eval" => {
                if rest.is_empty() {
                    println!("Usage: eval <expression>");
                    continue;
                }
                match engine.try_evaluate(rest) {
                    Ok(value) => println!("  {}", value),
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "restart" => show(engine.start()),
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => show(engine.select_choice(n - 1)),
                Ok(_) => println!("Choices are numbered from 1."),
                Err(_) => {
                    println!("Unknown command: '{}'. Type 'help' for available commands.", other);
                }
            },
        }
    }
}

fn show(result: Result<Step, EngineError>) {
    match result {
        Ok(Step::Scene(passage)) => print_scene(&passage),
        Ok(Step::Ended) => println!("\n--- The End ---\n(type 'restart' to play again)\n"),
        Err(e) => println!("ERROR: {}", e),
    }
}

fn print_scene(passage: &Passage) {
    let Some(scene) = passage.scene() else {
        return;
    };
    println!();
    if !passage.title.is_empty() {
        println!("== {} ==", passage.title);
    }
    if let Some(bg) = &scene.background_image {
        println!("[{}]", bg);
    }
    match &scene.character_id {
        Some(who) => println!("{}: {}", who, scene.text),
        None => println!("{}", scene.text),
    }
    println!();
    if scene.choices.is_empty() {
        if passage.default_output.is_some() {
            println!("  (next)");
        }
    } else {
        for (i, choice) in scene.choices.iter().enumerate() {
            if choice.condition.trim().is_empty() {
                println!("  {}. {}", i + 1, choice.text);
            } else {
                println!("  {}. {}  [if {}]", i + 1, choice.text, choice.condition);
            }
        }
    }
}

fn print_usage() {
    println!("Play: interactive terminal player for story projects.");
    println!();
    println!("Usage: play <project> [--seed <n>] [--max-steps <n>]");
    println!();
    println!("  <project>          Story project file (.json, or .ron)");
    println!("  --seed <n>         RNG seed for random() and randint() (default: 42)");
    println!(
        "  --max-steps <n>    Logic passages allowed in one move (default: {})",
        DEFAULT_MAX_CHAIN_STEPS
    );
    println!();
    println!("Set RUST_LOG=story_engine=debug to trace transitions.");
}

fn print_help() {
    println!("Commands:");
    println!("  <n>, choose <n>   Pick choice n");
    println!("  next              Continue a scene without choices");
    println!("  vars              Show variables");
    println!("  inv               Show inventory");
    println!("  npcs              Show NPCs");
    println!("  history           Show visited passages");
    println!("  eval <expr>       Evaluate an expression");
    println!("  restart           Start the story over");
    println!("  help              Show this help");
    println!("  quit              Exit");
}
