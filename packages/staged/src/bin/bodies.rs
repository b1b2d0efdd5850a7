use std::collections::HashMap;
use std::io::Write;

use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use staged::{
    component,
    Commands,
    Config,
    EntityID,
    ExclusiveSystem,
    Schedule,
    System,
    SystemRegistration,
    Universe,
    World,
};

const G: f32 = 10.0;
const TIME_STEP: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Position(f32, f32);
component!(Position);

#[derive(Debug, Clone, Copy, Default)]
pub struct Velocity(f32, f32);
component!(Velocity);

#[derive(Debug, Clone, Copy, Default)]
pub struct Mass(f32);
component!(Mass);

/// The number of simulation steps taken so far.
#[derive(Debug, Default)]
struct Steps(u64);

struct Body {
    id: EntityID,
    position: Position,
    mass: Mass,
}

/// Computes new velocities from the previous positions and queues them.
struct ApplyAcceleration;

impl System for ApplyAcceleration {
    fn run(&mut self, world: &World, commands: &mut Commands<'_>) {
        let bodies: Vec<Body> = world.query::<Position>()
            .filter_map(|(id, position)| {
                let mass = *world.get::<Mass>(id)?;
                Some(Body { id, position: *position, mass })
            })
            .collect();

        let updates: Vec<(EntityID, Velocity, bool)> = bodies.par_iter()
            .filter(|a| a.mass.0 > 0.0)
            .map(|a| {
                let Position(x_a, y_a) = a.position;
                let mut velocity = Velocity(0.0, 0.0);
                let mut collided = false;

                for b in bodies.iter() {
                    if b.id == a.id || b.mass.0 < 0.00001 {
                        continue;
                    }

                    let Position(x_b, y_b) = b.position;
                    let dx = x_b - x_a;
                    let dy = y_b - y_a;
                    let r2 = dx * dx + dy * dy;

                    // Bodies are overlapped!
                    if r2 < 0.0005 {
                        collided = true;
                        continue;
                    }

                    let acc = (G * b.mass.0) / r2;
                    let r = r2.sqrt();
                    velocity.0 += TIME_STEP * ((dx * acc) / r);
                    velocity.1 += TIME_STEP * ((dy * acc) / r);
                }

                (a.id, velocity, collided)
            })
            .collect();

        for (id, velocity, collided) in updates {
            let mut entity = commands.entity(id);
            entity.insert(velocity);
            if collided {
                entity.insert(Mass(0.0));
            }
        }

        commands.add(|world: &mut World| {
            world.get_resource_or_insert_with(Steps::default).0 += 1;
        });
    }
}

/// Moves every body along its velocity.
struct ApplyVelocity;

impl ExclusiveSystem for ApplyVelocity {
    fn run(&mut self, world: &mut World) {
        let velocities: Vec<(EntityID, Velocity)> = world.query::<Velocity>()
            .map(|(id, velocity)| (id, *velocity))
            .collect();

        for (id, Velocity(vx, vy)) in velocities {
            if let Some(Position(x, y)) = world.get_mut::<Position>(id) {
                *x += TIME_STEP * vx;
                *y += TIME_STEP * vy;
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    let mut world = World::with_universe(Universe::with_config(config.universe.clone()));

    // Populate universe!
    world.run_deferred(|_, commands| {
        const SQRT_NUM_ENTITIES: usize = 2;
        const SCALE: f32 = 2.0 / ((SQRT_NUM_ENTITIES - 1) as f32);

        for x in 0..SQRT_NUM_ENTITIES {
            for y in 0..SQRT_NUM_ENTITIES {
                let x = ((x as f32) * SCALE) - 1.0;
                let y = ((y as f32) * SCALE) - 1.0;

                let vx = y * 0.003;
                let vy = -x * 0.003;

                commands.spawn((Mass(0.00001), Position(x, y), Velocity(vx, vy)));
            }
        }
    });

    let mut schedule = Schedule::with_config(config.schedule.clone())?;
    let accel_sys = schedule.insert(SystemRegistration::from_system(ApplyAcceleration))?;
    schedule.insert(SystemRegistration::from_exclusive(ApplyVelocity).after(accel_sys))?;

    const SIZE: (i32, i32) = (500, 500);
    const OFFSET: (f32, f32) = (250.0, 250.0);
    const SCALE: (f32, f32) = (200.0, 200.0);
    const NUM_ITER: usize = 100;

    let mut dest = std::io::stdout();
    let mut last_positions = HashMap::new();

    write!(&mut dest, "<?xml version=\"1.0\" standalone=\"no\"?>\n")?;
    write!(&mut dest, "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.0//EN\" \"http://www.w3.org/TR/2001/REC-SVG-20010904/DTD/svg10.dtd\">\n")?;
    write!(&mut dest, "<svg xmlns=\"http://www.w3.org/2000/svg\" height=\"{}\" width=\"{}\">", SIZE.0, SIZE.1)?;
    write!(&mut dest, "<rect width=\"100%\" height=\"100%\" fill=\"black\"/>")?;

    for _ in 0..NUM_ITER {
        for _ in 0..10usize {
            schedule.run(&mut world);
        }

        // Render result!
        for (id, &Position(x, y)) in world.query::<Position>() {
            let Velocity(vx, vy) = world.get::<Velocity>(id).copied().unwrap_or_default();
            let v2 = (vx * vx + vy * vy).sqrt();
            let a = 1.0 - (v2 / 0.03).max(0.0).min(0.7);

            if let Some((lx, ly)) = last_positions.get(&id) {
                let x1 = lx * SCALE.0 + OFFSET.0;
                let y1 = ly * SCALE.1 + OFFSET.1;
                let x2 = x * SCALE.0 + OFFSET.0;
                let y2 = y * SCALE.1 + OFFSET.1;

                write!(&mut dest,
                       "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" style=\"stroke:rgba(255,0,0,{});stroke-width:1\" />",
                       x1, y1, x2, y2, a)?;
            }

            last_positions.insert(id, (x, y));
        }
    }

    write!(&mut dest, "</svg>")?;

    info!(steps = world.get_resource::<Steps>().map_or(0, |s| s.0), "simulation finished");
    Ok(())
}
