use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use staged::{
    component,
    CommandBuffer,
    Commands,
    EntityID,
    EntityState,
    Events,
    Schedule,
    ScheduleConfig,
    SystemRegistration,
    World,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position(i32, i32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tag;

component!(Position, Tag);

#[derive(Debug, PartialEq)]
struct Counter {
    value: u32,
}

#[derive(Debug, PartialEq)]
struct Setting(u32);

#[derive(Debug, Default)]
struct Observed(Vec<Option<Position>>);

#[test]
fn test_effects_appear_at_the_barrier() {
    let mut world = World::new();
    let mut buffer = CommandBuffer::new();

    let id = world.reserve_entity();
    buffer.spawn(id, ());
    buffer.set_component(id, Position(0, 0));

    assert_eq!(world.entity_state(id), EntityState::Reserved);
    assert_eq!(world.get::<Position>(id), None);

    world.flush(std::slice::from_mut(&mut buffer));

    assert_eq!(world.get::<Position>(id), Some(&Position(0, 0)));
    assert!(buffer.is_empty());
}

fn increment(_: &World, commands: &mut Commands<'_>) {
    commands.add(|world: &mut World| world.resource_mut::<Counter>().value += 1);
}

#[test]
fn test_custom_commands_from_two_queues() {
    let mut world = World::new();
    world.run_deferred(|_, commands| commands.insert_resource(Counter { value: 0 }));

    let mut schedule = Schedule::new();
    let a = schedule.insert(SystemRegistration::from_fn(increment)).unwrap();
    schedule.insert(SystemRegistration::from_fn(increment).after(a)).unwrap();

    schedule.run(&mut world);
    assert_eq!(world.resource::<Counter>().value, 2);
}

#[test]
fn test_later_queue_wins() {
    for _ in 0..16 {
        let mut world = World::new();
        let mut schedule = Schedule::new();

        let a = schedule.insert(SystemRegistration::from_fn(|_, commands| {
            commands.insert_resource(Setting(1));
        })).unwrap();
        let b = schedule.insert(SystemRegistration::from_fn(|_, commands| {
            commands.insert_resource(Setting(2));
        }).after(a)).unwrap();
        assert_eq!(schedule.stages(), vec![vec![a, b]]);

        schedule.run(&mut world);
        assert_eq!(world.resource::<Setting>(), &Setting(2));
    }
}

#[test]
fn test_schedule_order_not_completion_order() {
    let mut world = World::new();
    let mut schedule = Schedule::new();

    // The first system is the slowest, so it finishes last.
    let a = schedule.insert(SystemRegistration::from_fn(|_, commands| {
        std::thread::sleep(std::time::Duration::from_millis(20));
        commands.insert_resource(Setting(1));
    })).unwrap();
    schedule.insert(SystemRegistration::from_fn(|_, commands| {
        commands.insert_resource(Setting(2));
    }).before(a)).unwrap();

    schedule.run(&mut world);
    assert_eq!(world.resource::<Setting>(), &Setting(1));
}

#[test]
fn test_double_despawn_does_not_abort() {
    let mut world = World::new();
    let id = world.spawn((Tag,));
    let other = world.spawn((Tag,));

    let mut first = CommandBuffer::new();
    first.despawn(id);
    let mut second = CommandBuffer::new();
    second.despawn(id);
    second.remove_component::<Tag>(other);

    world.flush(&mut [first, second]);

    assert_eq!(world.entity_state(id), EntityState::Despawned);
    assert!(!world.has_component::<Tag>(other));
}

#[test]
fn test_exclusive_system_sees_flushed_state() {
    let mut world = World::new();
    let mut schedule = Schedule::new();
    let spawned = Arc::new(AtomicUsize::new(0));

    let spawner = {
        let spawned = spawned.clone();
        schedule.insert(SystemRegistration::from_fn(move |_, commands| {
            let id = commands.spawn_empty().id();
            commands.entity(id).insert(Position(id.id() as i32, 0));
            spawned.store(id.id(), Ordering::SeqCst);
        })).unwrap()
    };

    let observer = {
        let spawned = spawned.clone();
        SystemRegistration::exclusive_fn(move |world| {
            let id = EntityID::new(spawned.load(Ordering::SeqCst));
            let seen = world.get::<Position>(id).copied();
            world.get_resource_or_insert_with(Observed::default).0.push(seen);
        })
    };
    schedule.insert(observer.after(spawner)).unwrap();

    schedule.run(&mut world);
    schedule.run(&mut world);

    let observed = &world.resource::<Observed>().0;
    assert_eq!(observed.len(), 2);
    assert!(observed.iter().all(Option::is_some));
}

#[test]
fn test_serialized_deferred_systems() {
    let mut world = World::new();
    let mut schedule = Schedule::with_config(ScheduleConfig {
        serialize_deferred: true,
        ..ScheduleConfig::default()
    }).unwrap();

    let a = schedule.insert(SystemRegistration::from_fn(|_, commands| {
        commands.insert_resource(Counter { value: 1 });
    })).unwrap();

    // With a flush between them, the second system reads the first's result.
    let b = schedule.insert(SystemRegistration::from_fn(|world, commands| {
        let value = world.get_resource::<Counter>().map_or(0, |c| c.value);
        commands.insert_resource(Setting(value * 10));
    }).after(a)).unwrap();
    assert_eq!(schedule.stages(), vec![vec![a], vec![b]]);

    schedule.run(&mut world);
    assert_eq!(world.resource::<Setting>(), &Setting(10));
}

#[derive(Debug, Default)]
struct Log {
    order: Vec<&'static str>,
    seen: Vec<usize>,
}

fn log_system(name: &'static str) -> SystemRegistration {
    SystemRegistration::from_fn(move |world, commands| {
        let seen = world.get_resource::<Log>().map_or(0, |log| log.order.len());
        commands.add(move |world: &mut World| {
            let log = world.get_resource_or_insert_with(Log::default);
            log.order.push(name);
            log.seen.push(seen);
        });
    })
}

#[test]
fn test_sequential_stage() {
    let mut world = World::new();
    let mut schedule = Schedule::with_config(ScheduleConfig {
        parallel: false,
        ..ScheduleConfig::default()
    }).unwrap();

    let b = schedule.insert(log_system("b")).unwrap();
    let a = schedule.insert(log_system("a").before(b)).unwrap();
    let c = schedule.insert(log_system("c").after(b)).unwrap();
    assert_eq!(schedule.stages(), vec![vec![a, b, c]]);

    schedule.run(&mut world);
    schedule.run(&mut world);

    // Running one after another still flushes only at the end of the stage,
    // so no system sees the commands of the others in its own run.
    let log = world.resource::<Log>();
    assert_eq!(log.order, vec!["a", "b", "c", "a", "b", "c"]);
    assert_eq!(log.seen, vec![0, 0, 0, 3, 3, 3]);
}

#[test]
fn test_schedule_as_resource() {
    let mut world = World::new();

    let mut inner = Schedule::new();
    inner.insert(SystemRegistration::from_fn(|_, commands| {
        commands.spawn((Tag,));
    })).unwrap();
    world.insert_resource(inner);

    let mut outer = Schedule::new();
    outer.insert(SystemRegistration::exclusive_fn(|world| {
        world.resource_scope(|world, schedule: &mut Schedule| {
            schedule.run(world);
            schedule.run(world);
        });
    })).unwrap();

    outer.run(&mut world);

    assert_eq!(world.query::<Tag>().count(), 2);
    assert!(world.contains_resource::<Schedule>());
}

#[test]
fn test_events_through_commands() {
    let mut world = World::new();
    let mut schedule = Schedule::new();

    let sender = schedule.insert(SystemRegistration::from_fn(|_, commands| {
        commands.send_event("ping");
    })).unwrap();
    schedule.insert(SystemRegistration::exclusive_fn(|world| {
        let drained = world.resource_mut::<Events<&'static str>>().drain().count();
        world.get_resource_or_insert_with(|| Counter { value: 0 }).value += drained as u32;
    }).after(sender)).unwrap();

    schedule.run(&mut world);
    schedule.run(&mut world);

    assert_eq!(world.resource::<Counter>().value, 2);
    assert!(world.resource::<Events<&'static str>>().is_empty());
}
