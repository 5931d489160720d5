//! Agent Backbone - eat action flow check
//!
//! Spawns one starving, exhausted agent, starts an eat action and pumps the
//! bus and the agent until the action has finished and its effects have been
//! delivered. Reports hunger and energy before and after.

use agent_backbone::core::config::SimulationConfig;
use agent_backbone::core::error::Result;
use agent_backbone::ecs::world::World;
use agent_backbone::entity::{Action, ActionQueue, Body, NeedsSystem};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Run the eat action flow against the component/event core
#[derive(Parser, Debug)]
#[command(name = "agent-backbone")]
#[command(about = "Pump the event bus and agent components through an eat action")]
struct Args {
    /// Minimum number of steps to run
    #[arg(long, default_value_t = 40)]
    ticks: u64,

    /// Hard cap on steps while the action is still running
    #[arg(long, default_value_t = 100)]
    max_ticks: u64,

    /// TOML file overriding simulation defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the final world snapshot as JSON
    #[arg(long, default_value_t = false)]
    dump_state: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agent_backbone=info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };

    let mut world = World::with_config(config.clone())?;
    let agent = world.spawn_agent_with_id("test_agent", "Test Bot", 30)?;

    let needs = agent.add_component::<NeedsSystem>(config.clone())?;
    let body = agent.add_component::<Body>(config.clone())?;
    let queue = agent.add_component::<ActionQueue>(config.clone())?;

    // Starving and exhausted
    if let Some(hunger) = needs.borrow_mut().get_need_mut("hunger") {
        hunger.value = 0.0;
    }
    body.borrow_mut().set_energy(0.1);

    println!(
        "Initial state: hunger={:.3}, energy={:.3}",
        needs.borrow().get_need("hunger").map_or(0.0, |n| n.value),
        body.borrow().energy()
    );

    let eat = Action::eat(&config);
    println!("Starting eat action (duration={})", eat.duration);
    queue.borrow_mut().start_action(eat.clone());

    let mut steps = 0u64;
    while (queue.borrow().is_busy() || steps < args.ticks) && steps < args.max_ticks {
        let report = world.tick()?;
        steps += 1;

        if !report.bus.is_clean() {
            tracing::warn!("Step {}: {} delivery failures", steps, report.bus.failures.len());
        }
        if steps % 10 == 0 {
            println!(
                "Step {}: action progress={:.1}/{}",
                steps,
                queue.borrow().action_progress(),
                eat.duration
            );
        }
    }

    let hunger = needs.borrow().get_need("hunger").map_or(0.0, |n| n.value);
    println!("Final state: hunger={:.3}, energy={:.3}", hunger, body.borrow().energy());

    if hunger > 0.1 {
        println!("SUCCESS: hunger increased");
    } else {
        println!("FAILURE: hunger did not increase");
    }

    let stats = world.bus().stats();
    tracing::info!(
        "Bus totals: emitted={}, delivered={}, failed={}",
        stats.emitted,
        stats.delivered,
        stats.failed
    );

    if args.dump_state {
        println!("{}", world.snapshot_json()?);
    }

    Ok(())
}
