//! Per-dossier allocation mode gate (`AUTOMATIC ⇄ MANUAL`).
//!
//! Transitions only happen on an explicit set or toggle; there are no
//! restrictions on when a dossier may switch.

use uuid::Uuid;

use crate::backend::Backend;
use crate::config::Actor;
use crate::error::Result;
use crate::model::AllocationMode;
use crate::repository::Repository;

/// Current mode. A failed read falls back to automatic.
pub fn mode<B: Backend>(repo: &mut Repository<B>, dossier_id: Uuid) -> AllocationMode {
    match repo.dossier_mode(dossier_id) {
        Ok(manual) => AllocationMode::from(manual),
        Err(e) => {
            tracing::warn!(
                dossier = %dossier_id,
                error = %e,
                "could not read allocation mode, assuming automatic"
            );
            AllocationMode::Automatic
        }
    }
}

pub fn set_mode<B: Backend>(
    repo: &mut Repository<B>,
    dossier_id: Uuid,
    mode: AllocationMode,
    actor: &Actor,
) -> Result<()> {
    repo.set_dossier_mode(dossier_id, mode.is_manual(), actor)?;
    tracing::info!(dossier = %dossier_id, %mode, %actor, "allocation mode changed");
    Ok(())
}

/// Flip the mode and return the new one. Unlike [`mode`], a failed read is an error here.
pub fn toggle<B: Backend>(
    repo: &mut Repository<B>,
    dossier_id: Uuid,
    actor: &Actor,
) -> Result<AllocationMode> {
    let current = AllocationMode::from(repo.dossier_mode(dossier_id)?);
    let next = match current {
        AllocationMode::Automatic => AllocationMode::Manual,
        AllocationMode::Manual => AllocationMode::Automatic,
    };
    set_mode(repo, dossier_id, next, actor)?;
    Ok(next)
}
