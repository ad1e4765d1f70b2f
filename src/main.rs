//! Stagecraft Demo
//!
//! Drives two stages of a screen switch through their intro, run and
//! outro phases, sequenced by a small flow state machine.

use std::rc::Rc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use stagecraft::{
    logic::{erase, StateHandlers, TickFn},
    stage::StageProcessor,
    AppRunState, LogicContext, LogicEngine, MemoryGraph, MemoryNode, Package, PackageEvent, PackageNotice,
    Processor, RunState, SetupDocument, StateMachine, Step, VERSION,
};

/// Setup document for the demo.
const SETUP: &str = r#"{
    "engine": { "tick_rate": 60, "max_ticks_per_frame": 8 },
    "processors": [
        {
            "name": "screens",
            "switch_node_id": "screen-switch",
            "stages": [
                {
                    "id": "title",
                    "switch_id": "title",
                    "timeline": {
                        "params": { "end_time": 2.0, "loop_end_time": 2.0 },
                        "intro": { "start": 0.0, "end": 0.5 },
                        "outro": { "start": 1.5, "end": 2.0 }
                    }
                },
                {
                    "id": "game",
                    "switch_id": "game",
                    "processing": "after_children",
                    "timeline": {
                        "params": { "end_time": 3.0, "loop_end_time": 3.0 },
                        "intro": { "start": 0.0, "end": 1.0 },
                        "outro": { "start": 2.0, "end": 3.0 }
                    }
                }
            ]
        }
    ]
}"#;

/// Frames simulated at most.
const MAX_FRAMES: u32 = 1200;

/// Flow of the demo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Flow {
    Title,
    Game,
    Done,
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Stagecraft demo v{}", VERSION);

    let document = SetupDocument::from_json(SETUP)?;
    info!("Tick rate: {} Hz", document.engine.tick_rate);

    let graph = Rc::new(MemoryGraph::new());
    let switch = graph.insert(MemoryNode::new("screen-switch").with_children(["title", "game"]));

    let mut root = Processor::new("root");
    for setup in &document.processors {
        root.add_child(Box::new(StageProcessor::from_setup(setup)?));
    }

    let flow = Step::shared(flow_machine());
    root.add_stepable(erase(&flow));
    root.add_stepable(erase(&Step::shared(TickFn(|ctx: &LogicContext| {
        if ctx.tick % 60 == 0 {
            debug!(tick = ctx.tick, time = ctx.time, "clock");
        }
    }))));

    let mut engine = LogicEngine::new(document.engine.clone(), Box::new(root))?.with_graph(graph);
    if !engine.init() {
        anyhow::bail!("logic tree failed to initialize");
    }

    let frame_delta = 1.0 / f64::from(document.engine.tick_rate);
    let mut handled: Option<Flow> = None;

    for frame in 0..MAX_FRAMES {
        if frame == 30 {
            engine.queue_notice(PackageNotice::new(PackageEvent::WasLoaded, Package::new("level-1")));
        }

        engine.advance(frame_delta);

        let current = *flow.borrow().logic().current_state();
        if handled != Some(current) {
            info!("Flow: {:?} at tick {}", current, engine.context().tick);
            let stages = screens(&mut engine)?;
            match current {
                Flow::Title => {
                    stages.start_intro("title", None);
                }
                Flow::Game => {
                    stages.start_outro("title", None);
                    stages.start_intro("game", None);
                }
                Flow::Done => {
                    stages.start_outro("game", None);
                }
            }
            handled = Some(current);
        }

        let stages = screens(&mut engine)?;
        let settled = stages.stages().all(|s| s.run_state() == RunState::Stop);
        if current == Flow::Done && settled && !stages.is_any_timeline_running() {
            info!("All stages stopped after {} frames", frame + 1);
            break;
        }
    }

    info!(
        "Selected screen: {}",
        switch.selected_child().unwrap_or_else(|| "none".to_string())
    );

    engine.set_run_state(AppRunState::Paused);
    if !engine.deinit() {
        anyhow::bail!("logic tree failed to deinitialize cleanly");
    }

    info!("=== Demo Complete ===");
    Ok(())
}

/// Title for 1.5 s, game for 2 s, then done.
fn flow_machine() -> StateMachine<Flow> {
    let mut machine = StateMachine::new(Flow::Title);
    machine.register(
        Flow::Title,
        StateHandlers::<Flow>::new().on_process(|m, _ctx| {
            if m.ticks_in_state() >= 90 {
                m.set_next_state(Flow::Game);
            }
        }),
    );
    machine.register(
        Flow::Game,
        StateHandlers::<Flow>::new()
            .on_enter(|_m, ctx| info!("Game entered at {:.2}s", ctx.time))
            .on_process(|m, _ctx| {
                if m.ticks_in_state() >= 120 {
                    m.set_next_state(Flow::Done);
                }
            }),
    );
    machine.register(Flow::Done, StateHandlers::new());
    machine
}

/// The demo's stage processor.
fn screens(engine: &mut LogicEngine) -> Result<&mut StageProcessor> {
    engine
        .root_as_mut::<Processor>()
        .and_then(|root| root.children_mut().get_as_mut::<StageProcessor>("screens"))
        .context("screens stage processor missing")
}
