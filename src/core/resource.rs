//! Named, capacity-bounded resources and their registry.
//!
//! Allocation is advisory and non-blocking: a denied caller gets an error and
//! decides on its own whether to retry or back off. Nothing here queues
//! waiters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::error::ResourceError;

/// A shared resource that task bodies reserve and release one unit at a time.
pub trait Resource: Send + Sync {
    /// Reserve one unit.
    ///
    /// # Errors
    ///
    /// Implementation-defined; [`Semaphore`] returns [`ResourceError::Exhausted`].
    fn allocate(&self) -> Result<(), ResourceError>;

    /// Release one previously reserved unit.
    ///
    /// # Errors
    ///
    /// Implementation-defined; [`Semaphore`] returns [`ResourceError::OverRelease`].
    fn deallocate(&self) -> Result<(), ResourceError>;
}

/// Counting semaphore with a fixed capacity. Invariant: `0 <= held <= capacity`.
#[derive(Debug)]
pub struct Semaphore {
    held: AtomicU32,
    capacity: u32,
}

impl Semaphore {
    /// Create a semaphore with `capacity` units, none held.
    #[must_use]
    pub const fn new(capacity: u32) -> Self {
        Self {
            held: AtomicU32::new(0),
            capacity,
        }
    }

    /// Maximum number of units.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units currently held.
    #[must_use]
    pub fn held(&self) -> u32 {
        self.held.load(Ordering::Acquire)
    }

    /// Units currently free.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.capacity - self.held()
    }
}

impl Resource for Semaphore {
    fn allocate(&self) -> Result<(), ResourceError> {
        // CAS loop: only reserve if the unit still fits at the moment of the swap.
        let mut current = self.held.load(Ordering::Acquire);
        loop {
            if current >= self.capacity {
                return Err(ResourceError::Exhausted {
                    capacity: self.capacity,
                });
            }
            match self.held.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn deallocate(&self) -> Result<(), ResourceError> {
        let mut current = self.held.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return Err(ResourceError::OverRelease);
            }
            match self.held.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Registry of named resources.
///
/// Registration changes and resource mutation run under the same lock, so an
/// unregister can never interleave with an allocate on the same name.
#[derive(Default)]
pub struct ResourceManager {
    resources: Mutex<HashMap<String, Arc<dyn Resource>>>,
}

impl ResourceManager {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resource` under `name`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::AlreadyRegistered`] if the name is taken.
    pub fn register(&self, name: impl Into<String>, resource: Arc<dyn Resource>) -> Result<(), ResourceError> {
        let name = name.into();
        let mut resources = self.resources.lock();
        if resources.contains_key(&name) {
            return Err(ResourceError::AlreadyRegistered(name));
        }
        debug!(resource = %name, "resource registered");
        resources.insert(name, resource);
        Ok(())
    }

    /// Register a new [`Semaphore`] of `capacity` units under `name`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::AlreadyRegistered`] if the name is taken.
    pub fn register_semaphore(&self, name: impl Into<String>, capacity: u32) -> Result<(), ResourceError> {
        self.register(name, Arc::new(Semaphore::new(capacity)))
    }

    /// Remove the resource registered under `name`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::NotFound`] if nothing is registered under the name.
    pub fn unregister(&self, name: &str) -> Result<(), ResourceError> {
        let mut resources = self.resources.lock();
        if resources.remove(name).is_none() {
            return Err(ResourceError::NotFound(name.to_string()));
        }
        debug!(resource = %name, "resource unregistered");
        Ok(())
    }

    /// Reserve one unit of the named resource.
    ///
    /// # Errors
    ///
    /// [`ResourceError::NotFound`] for an unknown name, otherwise the
    /// resource's own error unchanged.
    pub fn allocate(&self, name: &str) -> Result<(), ResourceError> {
        let resources = self.resources.lock();
        let resource = resources
            .get(name)
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))?;
        resource.allocate()
    }

    /// Release one unit of the named resource.
    ///
    /// # Errors
    ///
    /// [`ResourceError::NotFound`] for an unknown name, otherwise the
    /// resource's own error unchanged.
    pub fn deallocate(&self, name: &str) -> Result<(), ResourceError> {
        let resources = self.resources.lock();
        let resource = resources
            .get(name)
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))?;
        resource.deallocate()
    }

    /// Reserve one unit and return a guard that releases it on drop.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceManager::allocate`].
    pub fn acquire<'a>(&'a self, name: &str) -> Result<Allocation<'a>, ResourceError> {
        self.allocate(name)?;
        Ok(Allocation {
            manager: self,
            name: name.to_string(),
            released: false,
        })
    }

    /// Whether a resource is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.lock().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.lock().len()
    }

    /// Whether no resource is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("names", &self.names())
            .finish()
    }
}

/// One reserved unit of a named resource, released when dropped.
#[must_use = "dropping the allocation releases the unit immediately"]
pub struct Allocation<'a> {
    manager: &'a ResourceManager,
    name: String,
    released: bool,
}

impl Allocation<'_> {
    /// Name of the allocated resource.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the unit now, reporting any error instead of logging it.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceManager::deallocate`].
    pub fn release(mut self) -> Result<(), ResourceError> {
        self.released = true;
        self.manager.deallocate(&self.name)
    }
}

impl Drop for Allocation<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.manager.deallocate(&self.name) {
            warn!(resource = %self.name, error = %e, "failed to release allocation on drop");
        }
    }
}
