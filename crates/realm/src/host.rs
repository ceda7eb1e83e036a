//! `RealmHost` builder and area management.
//!
//! The host is the entry point for running areas in a process. It binds
//! one ownership ledger and one broadcast group service, shared by every
//! area it opens, and tracks the areas in an [`AreaManager`].

use std::collections::HashSet;
use std::sync::Arc;

use realm_area::{
    Area, AreaConfig, AreaError, AreaHandle, AreaLogic, AreaManager, AreaOptions, QuitOptions,
    spawn_area,
};
use realm_group::{BroadcastGroup, MemoryGroups};
use realm_ledger::{MemoryLedger, OwnershipLedger};
use realm_protocol::{AreaDocument, AreaId};
use tokio::sync::Mutex;

use crate::RealmError;

/// Builder for a [`RealmHost`].
///
/// # Example
///
/// ```rust
/// use realm::prelude::*;
///
/// let host = RealmHost::in_memory()
///     .area_config(AreaConfig {
///         group_prefix: "zone".into(),
///         ..AreaConfig::default()
///     })
///     .build();
/// ```
pub struct RealmHostBuilder<L, B> {
    ledger: Arc<L>,
    groups: Arc<B>,
    config: AreaConfig,
}

impl<L, B> RealmHostBuilder<L, B>
where
    L: OwnershipLedger,
    B: BroadcastGroup,
{
    /// Sets the configuration every opened area gets.
    pub fn area_config(mut self, config: AreaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RealmHost<L, B> {
        RealmHost {
            ledger: self.ledger,
            groups: self.groups,
            config: self.config.validated(),
            registry: Mutex::new(Registry::default()),
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    manager: AreaManager,
    // Ids claimed by an `open_area` that hasn't registered yet.
    opening: HashSet<AreaId>,
}

/// Runs areas against one shared ledger and group service.
pub struct RealmHost<L, B> {
    ledger: Arc<L>,
    groups: Arc<B>,
    config: AreaConfig,
    registry: Mutex<Registry>,
}

impl RealmHost<MemoryLedger, MemoryGroups> {
    /// A builder on fresh in-process backends.
    pub fn in_memory() -> RealmHostBuilder<MemoryLedger, MemoryGroups> {
        Self::builder(Arc::new(MemoryLedger::new()), Arc::new(MemoryGroups::new()))
    }
}

impl<L, B> RealmHost<L, B>
where
    L: OwnershipLedger,
    B: BroadcastGroup,
{
    /// A builder on the given backends.
    pub fn builder(ledger: Arc<L>, groups: Arc<B>) -> RealmHostBuilder<L, B> {
        RealmHostBuilder {
            ledger,
            groups,
            config: AreaConfig::default(),
        }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn groups(&self) -> &Arc<B> {
        &self.groups
    }

    /// Creates an area running `logic`, initializes it with `options`,
    /// spawns its actor and starts it.
    ///
    /// An explicit id is claimed up front, so a second `open_area` for it
    /// fails with `PreconditionFailed` even while the first is starting.
    /// The area becomes visible through [`area`](Self::area) once it is
    /// running; if it fails to start it is shut down and never listed.
    pub async fn open_area<A: AreaLogic>(
        &self,
        logic: A,
        options: AreaOptions,
    ) -> Result<AreaHandle, RealmError> {
        let claimed = options.area_id.clone();
        if let Some(area_id) = &claimed {
            self.claim(area_id).await?;
        }
        let launched = self.launch(logic, options).await;

        let mut registry = self.registry.lock().await;
        if let Some(area_id) = &claimed {
            registry.opening.remove(area_id);
        }
        let handle = launched?;
        if let Err(e) = registry.manager.register(handle.clone()) {
            drop(registry);
            let _ = handle.shutdown().await;
            return Err(e.into());
        }

        tracing::info!(area_id = %handle.area_id(), areas = registry.manager.area_count(), "area open");
        Ok(handle)
    }

    async fn claim(&self, area_id: &AreaId) -> Result<(), RealmError> {
        let mut registry = self.registry.lock().await;
        if registry.manager.contains(area_id) || !registry.opening.insert(area_id.clone()) {
            return Err(AreaError::PreconditionFailed(format!("area {area_id} already registered")).into());
        }
        Ok(())
    }

    // Init, spawn and start, without holding the registry.
    async fn launch<A: AreaLogic>(
        &self,
        logic: A,
        options: AreaOptions,
    ) -> Result<AreaHandle, RealmError> {
        let mut area = Area::new(
            logic,
            Arc::clone(&self.ledger),
            Arc::clone(&self.groups),
            self.config.clone(),
        );
        area.init(options).await?;
        let handle = spawn_area(area)?;

        if let Err(e) = handle.start().await {
            tracing::warn!(area_id = %handle.area_id(), error = %e, "area failed to start");
            let _ = handle.shutdown().await;
            return Err(e.into());
        }
        Ok(handle)
    }

    /// The handle of an open area.
    pub async fn area(&self, area_id: &AreaId) -> Option<AreaHandle> {
        self.registry.lock().await.manager.get(area_id).cloned()
    }

    /// Ids of the open areas, sorted.
    pub async fn area_ids(&self) -> Vec<AreaId> {
        self.registry.lock().await.manager.area_ids()
    }

    /// Shuts an area down cleanly and returns its serialized document.
    ///
    /// Stops the area, serializes it, quits every held player (each is
    /// saved and its lock released), destroys the area and shuts its
    /// actor down. Player stop failures are logged; any other failure
    /// aborts and leaves the area open.
    pub async fn close_area(&self, area_id: &AreaId) -> Result<AreaDocument, RealmError> {
        let handle = self
            .area(area_id)
            .await
            .ok_or_else(|| RealmError::AreaNotOpen(area_id.clone()))?;

        if handle.info().await?.state.is_running() {
            if let Err(e) = handle.stop().await {
                tracing::warn!(%area_id, error = %e, "area stopped with errors");
            }
        }

        let (document, report) = handle.serialize().await?;
        if !report.is_complete() {
            tracing::warn!(%area_id, failed = report.failures.len(), "some players were not saved");
        }

        for player_id in handle.player_ids().await? {
            handle.quit(player_id, QuitOptions::save()).await?;
        }
        handle.destroy().await?;

        self.registry.lock().await.manager.remove(area_id).await?;
        tracing::info!(%area_id, "area closed");
        Ok(document)
    }

    /// Closes every open area, logging the ones that fail.
    pub async fn shutdown(&self) {
        for area_id in self.area_ids().await {
            if let Err(e) = self.close_area(&area_id).await {
                tracing::error!(%area_id, error = %e, "failed to close area");
            }
        }
    }
}
