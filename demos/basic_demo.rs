//! Basic demonstration of the Frontline simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=frontline_sim=debug` to watch kills and state changes.

use frontline_sim::{Faction, Result, SimConfig, SimWorld};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("frontline_sim=info")),
        )
        .init();

    println!("=== Frontline - Simulation Demo ===\n");

    let mut sim = SimWorld::with_seed(SimConfig::default(), 2024)?;
    sim.set_viewpoint(Vec3::ZERO, Vec3::Z);
    sim.deploy_initial_forces();
    sim.queue_reinforcement(Faction::Red, Vec3::new(20.0, 0.0, 100.0), 4);

    println!("Initial state:");
    print_snapshot(&mut sim);

    // 30 Hz fixed updates driven by a 60 Hz frame loop.
    println!("\nRunning 20 seconds of simulated time...\n");
    for frame in 0..1200 {
        sim.step(1.0 / 60.0);

        if (frame + 1) % 120 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", sim.current_tick(), sim.current_time());
            print_snapshot(&mut sim);
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty()?);
    Ok(())
}

fn print_snapshot(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();
    println!(
        "  Living: blue={} red={} total={}",
        snapshot.stats.blue, snapshot.stats.red, snapshot.stats.total
    );

    for squad in &snapshot.squads {
        let leader = squad.leader.map(|l| l.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "    Squad {} [{}]: {} members, leader {}",
            squad.id,
            squad.faction,
            squad.members.len(),
            leader
        );
    }

    for c in snapshot.combatants.iter().filter(|c| c.state != "Patrolling") {
        println!(
            "    #{} {} pos=({:.1}, {:.1}) hp={:.0} [{}] {}",
            c.id, c.faction, c.x, c.z, c.health, c.state, c.lod
        );
    }
}
