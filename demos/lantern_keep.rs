/// Lantern Keep demo: plays the fixture story along a scripted route.
///
/// A mini story: arrival in the rain → the keeper's gate → the courtyard →
/// the tower stair → the lamp room.
///
/// Run with: cargo run --example lantern_keep

use story_engine::{Step, StoryEngine, StoryEvent};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "story_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut engine = StoryEngine::builder()
        .seed(2026)
        .project("tests/fixtures/lantern_keep.json")
        .build()
        .expect("Failed to load Lantern Keep");

    engine.subscribe(|event| match event {
        StoryEvent::SoundRequested(clip) => println!("  (sound: {})", clip),
        StoryEvent::PassageChanged(p) => println!("\n=== {} ===", p.title),
        StoryEvent::StoryEnded => println!("\n=== The End ==="),
    });

    // --- Scripted route: None means "next", Some(i) picks choice i ---
    let route = [Some(0), Some(0), None, Some(0), None];

    let mut step = engine.start().expect("Failed to start");
    for pick in route {
        let Step::Scene(passage) = &step else {
            break;
        };
        if let Some(scene) = passage.scene() {
            match &scene.character_id {
                Some(who) => println!("{}: \"{}\"", who, scene.text),
                None => println!("{}", scene.text),
            }
            for (i, choice) in scene.choices.iter().enumerate() {
                let marker = if pick == Some(i) { ">" } else { " " };
                println!(" {} {}. {}", marker, i + 1, choice.text);
            }
        }

        step = match pick {
            Some(i) => engine.select_choice(i),
            None => engine.next_dialogue(),
        }
        .expect("Story stopped unexpectedly");
    }

    // --- Final session state ---
    let state = engine.state();
    println!("\nVisited: {}", state.history().join(" -> "));

    let mut vars: Vec<_> = state.variables().iter().collect();
    vars.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in vars {
        println!("  {} = {}", name, value);
    }

    let mut items: Vec<_> = state.inventory().iter().collect();
    items.sort_by(|a, b| a.0.cmp(b.0));
    for (item, qty) in items {
        println!("  carrying {} x{}", item, qty);
    }

    if let Some(keeper) = state.npc("keeper") {
        println!("  keeper: {} at {}", keeper.status.name(), keeper.location);
    }
}
