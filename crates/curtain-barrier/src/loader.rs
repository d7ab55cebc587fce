//! The opaque scene-loading collaborator.

use std::future::Future;

use curtain_protocol::ResourceId;

/// A staged-but-not-active scene, produced by [`SceneLoader::stage`].
///
/// Opaque to the barrier: holding one means the resource is ready to
/// flip live, and nothing more. Staging and activation are split so the
/// coordinator can keep every screen covered until activation finishes.
#[derive(Debug)]
pub struct StagedScene {
    resource: ResourceId,
}

impl StagedScene {
    /// Wraps a staged resource. Loader implementations call this from
    /// `stage` once their staging work is done.
    pub fn new(resource: ResourceId) -> Self {
        Self { resource }
    }

    /// The resource this handle stages.
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }
}

/// Errors reported by a scene loader.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The resource id doesn't name anything loadable.
    #[error("resource {0} not found")]
    NotFound(ResourceId),

    /// Staging started but could not finish.
    #[error("staging failed: {0}")]
    StageFailed(String),

    /// The staged scene could not be activated.
    #[error("activation failed: {0}")]
    ActivateFailed(String),
}

/// Stages and activates scene resources. Implemented by the host
/// application; the barrier only ever drives it through this trait.
///
/// The split contract:
/// 1. [`stage`](Self::stage) loads everything the new scene needs
///    *without* making it visible.
/// 2. [`activate`](Self::activate) flips the staged scene live.
///
/// The coordinator broadcasts the release only after both succeed, so no
/// participant ever sees a half-loaded scene.
pub trait SceneLoader: Send + Sync + 'static {
    /// Stages `resource` without activating it.
    fn stage(
        &self,
        resource: &ResourceId,
    ) -> impl Future<Output = Result<StagedScene, LoadError>> + Send;

    /// Activates a previously staged scene.
    fn activate(
        &self,
        staged: StagedScene,
    ) -> impl Future<Output = Result<(), LoadError>> + Send;
}
