use tracing::debug;

use crate::entity::{Entity, EntityClass, EntityKind};

/// Recycling registry for scene entities. Every entity is owned by value by
/// exactly one place: the active list or the free list of its class. Spawning
/// prefers recycling a free instance (which keeps its id) over constructing.
#[derive(Debug, Clone, Default)]
pub struct EntityPool {
    free_platforms: Vec<Entity>,
    free_spikes: Vec<Entity>,
    free_quicksand: Vec<Entity>,
    free_knives: Vec<Entity>,
    free_treasures: Vec<Entity>,
    active: Vec<Entity>,
    next_id: u32,
}

impl EntityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an entity at a position, recycling a free instance of the same
    /// class when one exists. Returns the instance id.
    pub fn spawn(&mut self, kind: EntityKind, width: f32, height: f32, x: f32, y: f32) -> u32 {
        let mut entity = self.acquire(kind, width, height);
        entity.place(x, y);
        let id = entity.id;
        self.active.push(entity);
        id
    }

    fn acquire(&mut self, kind: EntityKind, width: f32, height: f32) -> Entity {
        match self.free_list_mut(kind.class()).pop() {
            Some(mut entity) => {
                entity.reset();
                entity.reconfigure(kind, width, height);
                entity
            },
            None => {
                let id = self.next_id;
                self.next_id += 1;
                Entity::new(id, kind, width, height)
            },
        }
    }

    /// Retire one active entity into its free list. Active order of the
    /// remaining entities is preserved.
    pub fn deactivate(&mut self, id: u32) -> bool {
        match self.active.iter().position(|e| e.id == id) {
            Some(index) => {
                let entity = self.active.remove(index);
                self.release(entity);
                true
            },
            None => false,
        }
    }

    /// Retire every active entity. Used on level reset.
    pub fn deactivate_all(&mut self) {
        let drained: Vec<Entity> = self.active.drain(..).collect();
        for entity in drained {
            self.release(entity);
        }
    }

    /// Retire entities that fell out of the streaming window: behind the
    /// camera on x, or outside the vertical band. The goal chest is exempt
    /// so the end-of-level check can always find it. Returns how many were
    /// culled.
    pub fn cull_offscreen(
        &mut self,
        camera_x: f32,
        camera_y: f32,
        viewport_width: f32,
        viewport_height: f32,
        margin: f32,
    ) -> usize {
        let min_x = camera_x - (viewport_width / 2.0 + margin);
        let y_band = viewport_height / 2.0 + margin;

        let mut kept = Vec::with_capacity(self.active.len());
        let mut culled = 0;
        let drained: Vec<Entity> = self.active.drain(..).collect();
        for entity in drained {
            let keep = entity.class() == EntityClass::Treasure
                || (entity.x > min_x && (entity.y - camera_y).abs() < y_band);
            if keep {
                kept.push(entity);
            } else {
                culled += 1;
                self.release(entity);
            }
        }
        self.active = kept;
        if culled > 0 {
            debug!(culled, active = self.active.len(), "Culled offscreen entities");
        }
        culled
    }

    fn release(&mut self, entity: Entity) {
        self.free_list_mut(entity.class()).push(entity);
    }

    fn free_list_mut(&mut self, class: EntityClass) -> &mut Vec<Entity> {
        match class {
            EntityClass::Platform => &mut self.free_platforms,
            EntityClass::Spike => &mut self.free_spikes,
            EntityClass::Quicksand => &mut self.free_quicksand,
            EntityClass::Knife => &mut self.free_knives,
            EntityClass::Treasure => &mut self.free_treasures,
        }
    }

    pub fn active(&self) -> &[Entity] {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut [Entity] {
        &mut self.active
    }

    pub fn get(&self, id: u32) -> Option<&Entity> {
        self.active.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Entity> {
        self.active.iter_mut().find(|e| e.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn free_count(&self, class: EntityClass) -> usize {
        match class {
            EntityClass::Platform => self.free_platforms.len(),
            EntityClass::Spike => self.free_spikes.len(),
            EntityClass::Quicksand => self.free_quicksand.len(),
            EntityClass::Knife => self.free_knives.len(),
            EntityClass::Treasure => self.free_treasures.len(),
        }
    }
}
