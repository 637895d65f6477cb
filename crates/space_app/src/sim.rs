//! The demo simulation: walkers that spawn on a timer, drift, and expire.

use serde::{Deserialize, Serialize};
use space_runtime::events::{ComponentAdded, EntityRemoved};
use space_runtime::{Binding, EntityId, EventKey, FnSystem, Space, SpaceError, System, bind};
use tracing::{debug, info};

// -- Components --

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

/// Ticks left before the walker is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub remaining: u32,
}

// -- Events --

/// Advances the simulation by `dt` seconds.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub dt: f32,
}

/// Asks for a new walker.
#[derive(Debug, Clone, Copy)]
pub struct Spawn {
    pub velocity: Velocity,
    pub lifetime: u32,
}

// -- States --

#[derive(Debug, Default)]
pub struct Clock {
    pub tick: u64,
    pub elapsed: f32,
}

#[derive(Debug, Default)]
pub struct Census {
    pub spawned: u64,
    pub expired: u64,
}

/// Simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Spawn a walker every this many ticks.
    pub spawn_every: u64,
    /// Ticks a walker lives.
    pub lifetime: u32,
    /// Walker speed in units per second.
    pub speed: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            spawn_every: 10,
            lifetime: 30,
            speed: 1.0,
        }
    }
}

// -- Systems --

/// Owns the [`Clock`] state and advances it first on every tick.
pub struct ClockSystem;

impl System for ClockSystem {
    fn bindings(&self) -> Vec<Binding> {
        vec![
            bind(100, |space: &mut Space, tick: &Tick| {
                let clock = space.state_mut::<Clock>()?;
                clock.tick += 1;
                clock.elapsed += tick.dt;
                Ok(())
            })
            .named("advance"),
        ]
    }

    fn on_added(&self, space: &mut Space) -> anyhow::Result<()> {
        space.states_mut().add(Clock::default())?;
        Ok(())
    }

    fn on_removed(&self, space: &mut Space) -> anyhow::Result<()> {
        let clock = space.states_mut().remove::<Clock>()?;
        info!(ticks = clock.tick, elapsed = clock.elapsed, "clock stopped");
        Ok(())
    }
}

/// Posts a [`Spawn`] on a timer and turns each one into a walker.
pub struct SpawnerSystem {
    config: SimConfig,
}

impl SpawnerSystem {
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }
}

impl System for SpawnerSystem {
    fn bindings(&self) -> Vec<Binding> {
        let config = self.config;
        vec![
            bind(90, move |space: &mut Space, _: &Tick| {
                let tick = space.state::<Clock>()?.tick;
                if config.spawn_every > 0 && tick % config.spawn_every == 0 {
                    // Spread headings around the circle.
                    let angle = tick as f32 * 0.7;
                    space.post(Spawn {
                        velocity: Velocity {
                            dx: angle.cos() * config.speed,
                            dy: angle.sin() * config.speed,
                        },
                        lifetime: config.lifetime,
                    });
                }
                Ok(())
            })
            .named("schedule"),
            bind(0, |space: &mut Space, spawn: &Spawn| {
                space.entities_mut().create((
                    Position { x: 0.0, y: 0.0 },
                    spawn.velocity,
                    Lifetime {
                        remaining: spawn.lifetime,
                    },
                ))?;
                space.state_mut::<Census>()?.spawned += 1;
                Ok(())
            })
            .named("spawn"),
        ]
    }
}

/// Integrates velocity into position.
pub struct MovementSystem;

impl System for MovementSystem {
    fn bindings(&self) -> Vec<Binding> {
        vec![bind(50, |space: &mut Space, tick: &Tick| {
            let mut query = space.query_mut::<(Position, Velocity)>()?;
            while let Some((_, (position, velocity))) = query.fetch_next() {
                position.x += velocity.dx * tick.dt;
                position.y += velocity.dy * tick.dt;
            }
            Ok(())
        })]
    }
}

/// Counts lifetimes down and removes walkers that run out.
pub struct LifetimeSystem;

impl System for LifetimeSystem {
    fn bindings(&self) -> Vec<Binding> {
        vec![bind(10, |space: &mut Space, _: &Tick| {
            let mut expired: Vec<EntityId> = Vec::new();
            let mut query = space.query_mut::<(Lifetime,)>()?;
            while let Some((id, (lifetime,))) = query.fetch_next() {
                lifetime.remaining = lifetime.remaining.saturating_sub(1);
                if lifetime.remaining == 0 {
                    expired.push(id);
                }
            }
            for id in expired {
                space.entities_mut().remove(id)?;
            }
            Ok(())
        })]
    }
}

/// Keeps the [`Census`] and reports walker arrivals and departures.
fn census_system() -> FnSystem {
    FnSystem::new("census")
        .on_added(|space| {
            space.states_mut().add(Census::default())?;
            Ok(())
        })
        .binding(
            bind(0, |_: &mut Space, event: &ComponentAdded| {
                debug!(entity = %event.entity, "walker spawned");
                Ok(())
            })
            .named("arrivals")
            .with_key(EventKey::of::<Velocity>()),
        )
        .binding(
            bind(0, |space: &mut Space, event: &EntityRemoved| {
                debug!(entity = %event.entity, "walker expired");
                space.state_mut::<Census>()?.expired += 1;
                Ok(())
            })
            .named("departures"),
        )
}

/// Installs every simulation system into `space`.
///
/// # Errors
///
/// Returns the first installation failure.
pub fn install(space: &mut Space, config: SimConfig) -> Result<(), SpaceError> {
    space.systems_mut().add_all((
        census_system(),
        ClockSystem,
        SpawnerSystem::new(config),
        MovementSystem,
        LifetimeSystem,
    ))?;
    Ok(())
}
