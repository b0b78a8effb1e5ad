

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{PurgeError, Result};
use crate::toolkit::deletion::models::EntityRef;


#[derive(Clone, Default)]
pub struct LockRegistry {
    held: Arc<Mutex<HashMap<EntityRef, Uuid>>>,
}

impl LockRegistry {

    pub fn new() -> Self {
        Self::default()
    }

    /// Advisory only: the store itself is never locked.
    pub fn try_acquire(&self, entity: &EntityRef) -> Result<EntityLock> {
        let mut held = self.held.lock();
        if held.contains_key(entity) {
            warn!("Deletion already in progress for {}", entity);
            return Err(PurgeError::Locked(entity.clone()));
        }

        let token = Uuid::new_v4();
        held.insert(entity.clone(), token);
        debug!("Acquired deletion lock {} for {}", token, entity);

        Ok(EntityLock {
            registry: Arc::clone(&self.held),
            entity: entity.clone(),
            token,
        })
    }


    pub fn is_locked(&self, entity: &EntityRef) -> bool {
        self.held.lock().contains_key(entity)
    }
}


#[derive(Debug)]
pub struct EntityLock {
    registry: Arc<Mutex<HashMap<EntityRef, Uuid>>>,
    entity: EntityRef,
    token: Uuid,
}

impl EntityLock {
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn token(&self) -> Uuid {
        self.token
    }
}

impl Drop for EntityLock {
    fn drop(&mut self) {
        let mut held = self.registry.lock();
        if held.get(&self.entity) == Some(&self.token) {
            held.remove(&self.entity);
            debug!("Released deletion lock {} for {}", self.token, self.entity);
        }
    }
}
