//! Area manager: spawns and tracks the areas of one process.

use std::collections::HashMap;

use realm_group::BroadcastGroup;
use realm_ledger::OwnershipLedger;
use realm_protocol::AreaId;

use crate::{Area, AreaError, AreaHandle, AreaInfo, AreaLogic, AreaOptions, spawn_area};

/// Registry of running area actors, keyed by area id.
///
/// Areas of different logic types can live in one manager; it only holds
/// their handles.
#[derive(Debug, Default)]
pub struct AreaManager {
    areas: HashMap<AreaId, AreaHandle>,
}

impl AreaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes `area` with `options`, spawns its actor and registers
    /// it.
    ///
    /// Fails with [`PreconditionFailed`](AreaError::PreconditionFailed)
    /// if an area with the same id is already registered. The area is
    /// left Initialized; start it through the returned handle.
    pub async fn spawn<A, L, B>(
        &mut self,
        mut area: Area<A, L, B>,
        options: AreaOptions,
    ) -> Result<AreaHandle, AreaError>
    where
        A: AreaLogic,
        L: OwnershipLedger,
        B: BroadcastGroup,
    {
        if let Some(area_id) = &options.area_id {
            self.ensure_vacant(area_id)?;
        }
        area.init(options).await?;

        let handle = spawn_area(area)?;
        if let Err(e) = self.register(handle.clone()) {
            let _ = handle.shutdown().await;
            return Err(e);
        }
        Ok(handle)
    }

    /// Registers the handle of an area spawned elsewhere.
    ///
    /// Fails with [`PreconditionFailed`](AreaError::PreconditionFailed)
    /// if its id is taken; the caller still owns the actor then.
    pub fn register(&mut self, handle: AreaHandle) -> Result<(), AreaError> {
        let area_id = handle.area_id().clone();
        self.ensure_vacant(&area_id)?;
        self.areas.insert(area_id.clone(), handle);
        tracing::info!(%area_id, areas = self.areas.len(), "area registered");
        Ok(())
    }

    /// Returns `true` if an area with this id is registered.
    pub fn contains(&self, area_id: &AreaId) -> bool {
        self.areas.contains_key(area_id)
    }

    pub fn get(&self, area_id: &AreaId) -> Option<&AreaHandle> {
        self.areas.get(area_id)
    }

    /// Registered area ids, sorted.
    pub fn area_ids(&self) -> Vec<AreaId> {
        let mut ids: Vec<AreaId> = self.areas.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Summaries of every registered area, sorted by id. Areas whose
    /// actor has exited are left out.
    pub async fn list(&self) -> Vec<AreaInfo> {
        let mut infos = Vec::with_capacity(self.areas.len());
        for area_id in self.area_ids() {
            if let Some(handle) = self.areas.get(&area_id) {
                if let Ok(info) = handle.info().await {
                    infos.push(info);
                }
            }
        }
        infos
    }

    /// Unregisters an area and shuts its actor down.
    ///
    /// An unknown id fails with
    /// [`PreconditionFailed`](AreaError::PreconditionFailed).
    pub async fn remove(&mut self, area_id: &AreaId) -> Result<AreaHandle, AreaError> {
        let handle = self
            .areas
            .remove(area_id)
            .ok_or_else(|| AreaError::PreconditionFailed(format!("no area {area_id} registered")))?;

        let _ = handle.shutdown().await;
        tracing::info!(%area_id, areas = self.areas.len(), "area unregistered");
        Ok(handle)
    }

    fn ensure_vacant(&self, area_id: &AreaId) -> Result<(), AreaError> {
        if self.contains(area_id) {
            return Err(AreaError::PreconditionFailed(format!(
                "area {area_id} already registered"
            )));
        }
        Ok(())
    }
}
