//! Systems and the schedule which runs them.
//!
//! A system runs in one of two modes:
//!
//! - Deferred systems get shared access to the `World` and a `Commands`
//!   handle. Consecutive deferred systems form a stage and run in parallel.
//!   Their command buffers are applied, in schedule order, once the whole
//!   stage has finished.
//! - Exclusive systems get `&mut World`. They always run alone, after every
//!   earlier command buffer has been applied.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt::{self, Debug, Formatter};
use std::ops::Range;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace};

use crate::command_buffer::CommandBuffer;
use crate::commands::Commands;
use crate::config::ScheduleConfig;
use crate::error::ScheduleError;
use crate::world::World;

/// A system which defers its changes to the world.
pub trait System: Send + Sync {
    /// The name of the system, used in logs and errors.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_name::<Self>())
    }

    /// Run the system.
    ///
    /// Any changes to the world must be queued in `commands`.
    fn run(&mut self, world: &World, commands: &mut Commands<'_>);
}

/// A system which needs direct access to the whole world.
pub trait ExclusiveSystem: Send + Sync {
    /// The name of the system, used in logs and errors.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_name::<Self>())
    }

    /// Run the system.
    fn run(&mut self, world: &mut World);
}

struct FnSystem<F>(F);

impl<F> System for FnSystem<F>
    where F: FnMut(&World, &mut Commands<'_>) + Send + Sync + 'static
{
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_name::<F>())
    }

    fn run(&mut self, world: &World, commands: &mut Commands<'_>) {
        (self.0)(world, commands)
    }
}

struct FnExclusiveSystem<F>(F);

impl<F> ExclusiveSystem for FnExclusiveSystem<F>
    where F: FnMut(&mut World) + Send + Sync + 'static
{
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_name::<F>())
    }

    fn run(&mut self, world: &mut World) {
        (self.0)(world)
    }
}

/// A token which represents a system in a `Schedule`.
///
/// These tokens are not unique between `Schedule`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemToken(pub usize);

enum SystemKind {
    Deferred(Box<dyn System>),
    Exclusive(Box<dyn ExclusiveSystem>),
}

/// A registration used for building `Schedule`s.
pub struct SystemRegistration {
    kind: SystemKind,
    name: Cow<'static, str>,
    before: Vec<SystemToken>,
    after: Vec<SystemToken>,
    concurrent_with: Vec<SystemToken>,
}

impl SystemRegistration {
    fn new(kind: SystemKind, name: Cow<'static, str>) -> SystemRegistration {
        SystemRegistration {
            kind,
            name,
            before: Vec::new(),
            after: Vec::new(),
            concurrent_with: Vec::new(),
        }
    }

    /// Create a new registration from any object implementing `System`.
    pub fn from_system(system: impl System + 'static) -> SystemRegistration {
        let name = system.name();
        SystemRegistration::new(SystemKind::Deferred(Box::new(system)), name)
    }

    /// Create a new registration from any object implementing
    /// `ExclusiveSystem`.
    pub fn from_exclusive(system: impl ExclusiveSystem + 'static) -> SystemRegistration {
        let name = system.name();
        SystemRegistration::new(SystemKind::Exclusive(Box::new(system)), name)
    }

    /// Create a deferred system from a closure.
    pub fn from_fn<F>(f: F) -> SystemRegistration
        where F: FnMut(&World, &mut Commands<'_>) + Send + Sync + 'static
    {
        SystemRegistration::from_system(FnSystem(f))
    }

    /// Create an exclusive system from a closure.
    pub fn exclusive_fn<F>(f: F) -> SystemRegistration
        where F: FnMut(&mut World) + Send + Sync + 'static
    {
        SystemRegistration::from_exclusive(FnExclusiveSystem(f))
    }

    /// Override the name of this system.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Require that this system is run before the system represented
    /// by the given token.
    pub fn before(mut self, system: SystemToken) -> Self {
        if let Err(insert_idx) = self.before.binary_search(&system) {
            self.before.insert(insert_idx, system);
        }

        self
    }

    /// Require that this system is run after the system represented
    /// by the given token.
    pub fn after(mut self, system: SystemToken) -> Self {
        if let Err(insert_idx) = self.after.binary_search(&system) {
            self.after.insert(insert_idx, system);
        }

        self
    }

    /// Require that this system shares a stage with the system represented
    /// by the given token.
    pub fn concurrent_with(mut self, system: SystemToken) -> Self {
        if let Err(insert_idx) = self.concurrent_with.binary_search(&system) {
            self.concurrent_with.insert(insert_idx, system);
        }

        self
    }

    /// Returns true if this system needs exclusive world access.
    pub fn is_exclusive(&self) -> bool {
        matches!(self.kind, SystemKind::Exclusive(_))
    }

    /// Get the name of this system.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for SystemRegistration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRegistration")
            .field("name", &self.name)
            .field("exclusive", &self.is_exclusive())
            .field("before", &self.before)
            .field("after", &self.after)
            .field("concurrent_with", &self.concurrent_with)
            .finish()
    }
}

struct ScheduledSystem {
    registration: SystemRegistration,
    token: SystemToken,
}

/// A run of systems with no flush between them.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    Deferred(Range<usize>),
    Exclusive(usize),
}

impl Stage {
    fn contains(&self, index: usize) -> bool {
        match self {
            Stage::Deferred(range) => range.contains(&index),
            Stage::Exclusive(x) => *x == index,
        }
    }

    fn range(&self) -> Range<usize> {
        match self {
            Stage::Deferred(range) => range.clone(),
            Stage::Exclusive(x) => *x..*x + 1,
        }
    }
}

fn build_stages(systems: &[ScheduledSystem], serialize_deferred: bool) -> Vec<Stage> {
    let mut stages = Vec::new();
    let mut start = None;

    for (index, system) in systems.iter().enumerate() {
        if system.registration.is_exclusive() {
            if let Some(start) = start.take() {
                stages.push(Stage::Deferred(start..index));
            }
            stages.push(Stage::Exclusive(index));
        } else if serialize_deferred {
            stages.push(Stage::Deferred(index..index + 1));
        } else if start.is_none() {
            start = Some(index);
        }
    }

    if let Some(start) = start {
        stages.push(Stage::Deferred(start..systems.len()));
    }

    stages
}

/// An ordered set of systems, split into stages separated by flush barriers.
pub struct Schedule {
    next_system_id: usize,
    systems: Vec<ScheduledSystem>,
    stages: Vec<Stage>,
    config: ScheduleConfig,
    pool: Option<ThreadPool>,
}

impl Schedule {
    /// Create a new empty `Schedule` with the default settings.
    pub fn new() -> Schedule {
        Schedule {
            next_system_id: 0,
            systems: Vec::new(),
            stages: Vec::new(),
            config: ScheduleConfig::default(),
            pool: None,
        }
    }

    /// Create a new empty `Schedule`.
    ///
    /// If `config.num_threads` is set, deferred systems run on a dedicated
    /// thread pool of that size rather than the global one.
    pub fn with_config(config: ScheduleConfig) -> Result<Schedule, ScheduleError> {
        let pool = match config.num_threads {
            Some(num_threads) => Some(ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|index| format!("staged-{}", index))
                .build()?),
            None => None,
        };

        Ok(Schedule {
            config,
            pool,
            ..Schedule::new()
        })
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Returns the number of systems in the schedule.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Get the systems in each stage, in execution order.
    ///
    /// A flush barrier follows every stage.
    pub fn stages(&self) -> Vec<Vec<SystemToken>> {
        self.stages.iter()
            .map(|stage| self.systems[stage.range()].iter().map(|s| s.token).collect())
            .collect()
    }

    fn position(&self, token: SystemToken) -> Result<usize, ScheduleError> {
        self.systems.iter()
            .position(|s| s.token == token)
            .ok_or(ScheduleError::UnknownSystem(token))
    }

    /// Insert a system into the schedule according to its registration
    /// requirements.
    ///
    /// Nothing is changed if the requirements cannot be met.
    pub fn insert(&mut self, registration: SystemRegistration) -> Result<SystemToken, ScheduleError> {
        let mut lo = 0;
        for token in registration.after.iter() {
            lo = lo.max(self.position(*token)? + 1);
        }

        let mut hi = self.systems.len();
        for token in registration.before.iter() {
            hi = hi.min(self.position(*token)?);
        }

        // The latest index which still shares a stage with every system in
        // `concurrent_with`.
        let mut shared_hi: Option<usize> = None;
        for token in registration.concurrent_with.iter() {
            let position = self.position(*token)?;
            let end = self.stages.iter()
                .find(|stage| stage.contains(position))
                .map_or(position + 1, |stage| stage.range().end);
            shared_hi = Some(shared_hi.map_or(end, |hi| hi.min(end)));
        }

        if lo > hi {
            return Err(ScheduleError::UnsatisfiableOrdering {
                system: registration.name.into_owned(),
            });
        }

        let index = match shared_hi {
            Some(shared_hi) if shared_hi >= lo => shared_hi.min(hi),
            _ if registration.before.is_empty() => self.systems.len(),
            _ => hi,
        };
        let token = SystemToken(self.next_system_id);
        self.systems.insert(index, ScheduledSystem { registration, token });

        let stages = build_stages(&self.systems, self.config.serialize_deferred);
        if let Err(err) = self.validate_concurrency(&stages) {
            self.systems.remove(index);
            return Err(err);
        }

        self.next_system_id += 1;
        self.stages = stages;
        debug!(systems = self.systems.len(), stages = self.stages.len(), "schedule rebuilt");
        Ok(token)
    }

    fn validate_concurrency(&self, stages: &[Stage]) -> Result<(), ScheduleError> {
        for (index, system) in self.systems.iter().enumerate() {
            for token in system.registration.concurrent_with.iter() {
                let other_index = self.position(*token)?;
                let other = &self.systems[other_index];

                let shared = stages.iter().any(|s| s.contains(index) && s.contains(other_index));
                if shared && index != other_index {
                    continue;
                }

                let system = system.registration.name.to_string();
                let other = other.registration.name.to_string();
                return Err(if self.config.serialize_deferred
                    && !self.systems[index].registration.is_exclusive()
                    && !self.systems[other_index].registration.is_exclusive()
                {
                    ScheduleError::DeferredConflict { system, other }
                } else {
                    ScheduleError::ExclusiveConflict { system, other }
                });
            }
        }

        Ok(())
    }

    /// Run every system once.
    ///
    /// Each stage of deferred systems is followed by a flush of their command
    /// buffers, so every exclusive system, and the caller, sees all changes
    /// queued before it.
    pub fn run(&mut self, world: &mut World) {
        let Schedule { systems, stages, config, pool, .. } = self;

        for stage in stages.iter() {
            match stage {
                Stage::Deferred(range) => {
                    run_deferred_stage(&mut systems[range.clone()], world, config.parallel, pool.as_ref());
                }
                Stage::Exclusive(index) => {
                    let scheduled = &mut systems[*index];
                    if let SystemKind::Exclusive(system) = &mut scheduled.registration.kind {
                        trace!(system = %scheduled.registration.name, "running exclusive system");
                        system.run(world);
                        trace!(system = %scheduled.registration.name, "exclusive system finished");
                    }
                }
            }
        }
    }
}

fn run_deferred_stage(systems: &mut [ScheduledSystem], world: &mut World, parallel: bool, pool: Option<&ThreadPool>) {
    let universe = world.universe().clone();
    let mut buffers: Vec<CommandBuffer> = systems.iter()
        .map(|_| universe.acquire_buffer())
        .collect();

    {
        let world: &World = world;
        let run_one = |(scheduled, buffer): (&mut ScheduledSystem, &mut CommandBuffer)| {
            let registration = &mut scheduled.registration;
            if let SystemKind::Deferred(system) = &mut registration.kind {
                trace!(system = %registration.name, "running system");
                let mut commands = Commands::new(buffer, &universe);
                system.run(world, &mut commands);
                trace!(system = %registration.name, commands = commands.len(), "system finished");
            }
        };

        if parallel && systems.len() > 1 {
            let mut run = || systems.par_iter_mut().zip(buffers.par_iter_mut()).for_each(run_one);
            match pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        } else {
            systems.iter_mut().zip(buffers.iter_mut()).for_each(run_one);
        }
    }

    world.flush(&mut buffers);

    for buffer in buffers {
        universe.release_buffer(buffer);
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::new()
    }
}

impl Debug for Schedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schedule {{")?;
        for (index, stage) in self.stages.iter().enumerate() {
            write!(f, "  stage {} - ", index)?;
            for system in self.systems[stage.range()].iter() {
                write!(f, "{} ({:?}), ", system.registration.name, system.token)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn noop() -> SystemRegistration {
        SystemRegistration::from_fn(|_, _| {})
    }

    fn exclusive_noop() -> SystemRegistration {
        SystemRegistration::exclusive_fn(|_| {})
    }

    #[test]
    fn test_ordering() {
        let mut schedule = Schedule::new();
        let a = schedule.insert(noop().named("a")).unwrap();
        let b = schedule.insert(noop().named("b").before(a)).unwrap();
        let c = schedule.insert(noop().named("c").after(b).before(a)).unwrap();
        assert_eq!(schedule.stages(), vec![vec![b, c, a]]);

        assert!(matches!(
            schedule.insert(noop().named("d").after(a).before(b)),
            Err(ScheduleError::UnsatisfiableOrdering { system }) if system == "d"));
        assert!(matches!(
            schedule.insert(noop().after(SystemToken(99))),
            Err(ScheduleError::UnknownSystem(SystemToken(99)))));
        assert_eq!(schedule.len(), 3);
    }

    #[test]
    fn test_exclusive_splits_stages() {
        let mut schedule = Schedule::new();
        let a = schedule.insert(noop()).unwrap();
        let b = schedule.insert(noop()).unwrap();
        let x = schedule.insert(exclusive_noop()).unwrap();
        let c = schedule.insert(noop()).unwrap();
        let y = schedule.insert(exclusive_noop()).unwrap();
        assert_eq!(schedule.stages(), vec![vec![a, b], vec![x], vec![c], vec![y]]);

        let mut serialized = Schedule::with_config(ScheduleConfig {
            serialize_deferred: true,
            ..ScheduleConfig::default()
        }).unwrap();
        let a = serialized.insert(noop()).unwrap();
        let b = serialized.insert(noop()).unwrap();
        assert_eq!(serialized.stages(), vec![vec![a], vec![b]]);
    }

    #[test]
    fn test_concurrent_with() {
        let mut schedule = Schedule::new();
        let a = schedule.insert(noop().named("a")).unwrap();
        let x = schedule.insert(exclusive_noop().named("x")).unwrap();

        assert!(matches!(
            schedule.insert(noop().named("b").concurrent_with(x)),
            Err(ScheduleError::ExclusiveConflict { .. })));

        let b = schedule.insert(noop().named("b").concurrent_with(a)).unwrap();
        assert_eq!(schedule.stages(), vec![vec![a, b], vec![x]]);

        // Splitting a and b apart would break b's request.
        assert!(matches!(
            schedule.insert(exclusive_noop().named("y").after(a).before(b)),
            Err(ScheduleError::ExclusiveConflict { system, other }) if system == "b" && other == "a"));
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.stages(), vec![vec![a, b], vec![x]]);

        let mut serialized = Schedule::with_config(ScheduleConfig {
            serialize_deferred: true,
            ..ScheduleConfig::default()
        }).unwrap();
        let a = serialized.insert(noop()).unwrap();
        assert!(matches!(
            serialized.insert(noop().concurrent_with(a)),
            Err(ScheduleError::DeferredConflict { .. })));
    }

    #[test]
    fn test_concurrent_with_joins_earlier_stage() {
        let mut schedule = Schedule::new();
        let a = schedule.insert(noop().named("a")).unwrap();
        let b = schedule.insert(noop().named("b")).unwrap();
        let x = schedule.insert(exclusive_noop().named("x")).unwrap();
        let c = schedule.insert(noop().named("c")).unwrap();

        // Placed at the end of a's stage, ahead of the exclusive system.
        let d = schedule.insert(noop().named("d").concurrent_with(a)).unwrap();
        assert_eq!(schedule.stages(), vec![vec![a, b, d], vec![x], vec![c]]);

        // Joining both c and a at once is impossible.
        assert!(matches!(
            schedule.insert(noop().named("e").concurrent_with(a).concurrent_with(c)),
            Err(ScheduleError::ExclusiveConflict { .. })));
        assert_eq!(schedule.len(), 5);

        // An `after` constraint past the shared stage cannot be met together
        // with the request.
        assert!(matches!(
            schedule.insert(noop().named("f").after(x).concurrent_with(b)),
            Err(ScheduleError::ExclusiveConflict { system, other }) if system == "f" && other == "b"));
        assert_eq!(schedule.stages(), vec![vec![a, b, d], vec![x], vec![c]]);
    }

    #[test]
    fn test_dedicated_pool() {
        let mut schedule = Schedule::with_config(ScheduleConfig {
            num_threads: Some(2),
            ..ScheduleConfig::default()
        }).unwrap();
        let mut world = World::new();

        for _ in 0..4 {
            schedule.insert(SystemRegistration::from_fn(|_, commands| {
                commands.spawn(());
            })).unwrap();
        }

        schedule.run(&mut world);
        assert_eq!(world.len(), 4);
        schedule.run(&mut world);
        assert_eq!(world.len(), 8);
    }
}
