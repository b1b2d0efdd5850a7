//! The shared, thread-safe half of a world.

use std::sync::Arc;
use std::sync::atomic::{self, AtomicUsize};

use crossbeam_queue::SegQueue;

use crate::command_buffer::CommandBuffer;
use crate::config::UniverseConfig;
use crate::entity::EntityID;

/// The first ID handed out. `EntityID::default()` is never allocated.
const FIRST_ENTITY_ID: usize = 1;

/// A `Universe` owns everything a running system may touch without
/// holding the `World`: entity ID reservation and the pool of recycled
/// command buffers.
///
/// Reserving IDs never blocks and never hands out the same ID twice, no matter
/// how many threads are reserving at once.
pub struct Universe {
    next_entity_id: AtomicUsize,
    buffer_pool: SegQueue<CommandBuffer>,
    config: UniverseConfig,
}

impl Universe {
    /// Create a new universe with the default settings.
    pub fn new() -> Arc<Universe> {
        Universe::with_config(UniverseConfig::default())
    }

    /// Create a new universe with the given settings.
    pub fn with_config(config: UniverseConfig) -> Arc<Universe> {
        Arc::new(Universe {
            next_entity_id: AtomicUsize::new(FIRST_ENTITY_ID),
            buffer_pool: SegQueue::new(),
            config,
        })
    }

    /// Get the settings this universe was created with.
    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    /// Reserve a fresh entity ID.
    ///
    /// The entity has no storage until a spawn for it is applied to a `World`.
    pub fn allocate_entity(&self) -> EntityID {
        EntityID::new(self.next_entity_id.fetch_add(1, atomic::Ordering::Relaxed))
    }

    /// Returns the number of entity IDs reserved so far.
    pub fn allocated_entities(&self) -> usize {
        self.next_entity_id.load(atomic::Ordering::Relaxed) - FIRST_ENTITY_ID
    }

    /// Returns true if this universe has handed out `id`.
    pub fn is_allocated(&self, id: EntityID) -> bool {
        id.id() >= FIRST_ENTITY_ID && id.id() < self.next_entity_id.load(atomic::Ordering::Relaxed)
    }

    /// Take an empty command buffer from the pool, allocating if it is empty.
    pub fn acquire_buffer(&self) -> CommandBuffer {
        self.buffer_pool.pop()
            .unwrap_or_else(|| CommandBuffer::with_capacity(self.config.buffer_capacity))
    }

    /// Return a command buffer to the pool.
    ///
    /// Anything still queued in it is dropped without being applied, and
    /// its allocation is trimmed back to the configured buffer capacity.
    pub fn release_buffer(&self, mut buffer: CommandBuffer) {
        buffer.clear();
        buffer.shrink_to(self.config.buffer_capacity);
        if self.buffer_pool.len() < self.config.max_pooled_buffers {
            self.buffer_pool.push(buffer);
        }
    }

    /// Returns the number of idle buffers in the pool.
    pub fn pooled_buffers(&self) -> usize {
        self.buffer_pool.len()
    }
}
