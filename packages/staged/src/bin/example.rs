use std::slice;

use tracing_subscriber::EnvFilter;

use staged::{CommandBuffer, component, World};

#[derive(Debug, Clone, Copy, Default)]
pub struct MyComponent(i32);

component!(MyComponent);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut world = World::new();

    let mut command_buffer = CommandBuffer::new();
    let entity = world.reserve_entity();
    command_buffer.spawn(entity, ());
    command_buffer.set_component(entity, MyComponent(3));

    println!("entity: {} ({:?})", entity, world.entity_state(entity));
    println!("before flush: {:?}", world.get::<MyComponent>(entity));

    world.flush(slice::from_mut(&mut command_buffer));

    println!("world: {:?}", world);
    println!("after flush: {:?}", world.get::<MyComponent>(entity));

    if let Some(components) = world.components(entity) {
        for component in components.component_types() {
            println!("component: {:?}", component);
        }
    }
}
