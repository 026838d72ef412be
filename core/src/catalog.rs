//! Catalog manager
//!
//! Holds the currently published [`Ais`] generation. Readers take an
//! `Arc<Ais>` and keep using it for as long as they like; writers take a
//! builder over a private copy and publish it back. Publishing swaps the
//! pointer in one step, so a reader never sees a half-applied change.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use log::{debug, info};

use crate::ais::{Ais, AisBuilder};
use crate::config::CoreConfig;
use crate::error::{AisError, Result};

/// Owner of the published catalog generations
#[derive(Debug)]
pub struct SchemaManager {
    /// Current generation
    current: RwLock<Arc<Ais>>,

    /// Superseded generations, newest last
    history: RwLock<VecDeque<Arc<Ais>>>,

    /// Configuration
    config: CoreConfig,
}

impl SchemaManager {
    /// Manager over an empty catalog
    pub fn new(config: CoreConfig) -> Result<Self> {
        Self::with_catalog(Ais::new(), config)
    }

    /// Manager over an existing generation, e.g. one restored from storage
    pub fn with_catalog(ais: Ais, config: CoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(SchemaManager {
            current: RwLock::new(Arc::new(ais)),
            history: RwLock::new(VecDeque::new()),
            config,
        })
    }

    /// Configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Currently published generation
    pub fn current(&self) -> Result<Arc<Ais>> {
        let current = self.current.read()
            .map_err(|e| AisError::StateError(format!("Failed to read current catalog: {}", e)))?;

        Ok(Arc::clone(&current))
    }

    /// Number of the currently published generation
    pub fn generation(&self) -> Result<u64> {
        Ok(self.current()?.generation())
    }

    /// Builder over a private copy of the current generation
    pub fn builder(&self) -> Result<AisBuilder> {
        let current = self.current()?;
        Ok(AisBuilder::from_published(&current, self.config.grouping.clone()))
    }

    /// Validate and publish a builder. Fails without publishing when the
    /// grouping is incomplete or another writer published since the builder
    /// was taken.
    pub fn publish(&self, builder: AisBuilder) -> Result<Arc<Ais>> {
        let mut current = self.current.write()
            .map_err(|e| AisError::StateError(format!("Failed to write current catalog: {}", e)))?;

        if builder.base_generation() != current.generation() {
            return Err(AisError::StaleGeneration {
                based_on: builder.base_generation(),
                current: current.generation(),
            });
        }

        let next = Arc::new(builder.freeze()?);
        let previous = std::mem::replace(&mut *current, Arc::clone(&next));

        let mut history = self.history.write()
            .map_err(|e| AisError::StateError(format!("Failed to write catalog history: {}", e)))?;
        history.push_back(previous);
        while history.len() > self.config.catalog.retained_generations {
            if let Some(dropped) = history.pop_front() {
                debug!("Released catalog generation {}", dropped.generation());
            }
        }

        info!("Published catalog generation {}", next.generation());
        Ok(next)
    }

    /// Build, validate and publish in one call
    pub fn apply<F>(&self, edit: F) -> Result<Arc<Ais>>
    where
        F: FnOnce(&mut AisBuilder) -> Result<()>,
    {
        let mut builder = self.builder()?;
        edit(&mut builder)?;
        self.publish(builder)
    }

    /// A retained or the current generation by number
    pub fn get_generation(&self, generation: u64) -> Result<Option<Arc<Ais>>> {
        let current = self.current()?;
        if current.generation() == generation {
            return Ok(Some(current));
        }

        let history = self.history.read()
            .map_err(|e| AisError::StateError(format!("Failed to read catalog history: {}", e)))?;

        Ok(history.iter().find(|ais| ais.generation() == generation).cloned())
    }
}

/// Thread-safe catalog manager
pub type SharedSchemaManager = Arc<SchemaManager>;

/// Create a new shared catalog manager
pub fn create_schema_manager(config: CoreConfig) -> Result<SharedSchemaManager> {
    let manager = SchemaManager::new(config)?;
    Ok(Arc::new(manager))
}
