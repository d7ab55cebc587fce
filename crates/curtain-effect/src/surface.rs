//! The opaque render collaborator effects draw on.

/// A full-screen cover an effect can drive.
///
/// `cover` runs from 0.0 (scene fully visible) to 1.0 (scene fully
/// hidden). How that maps to pixels — a black quad's alpha, a shutter
/// position, a shader uniform — is entirely the renderer's business.
///
/// Surfaces are allowed to vanish mid-play (a window closing, a canvas
/// being torn down). Playback receives the surface as an `Option` each
/// tick and treats absence as permission to finish early, never as an
/// error.
pub trait CoverSurface {
    /// Sets the current cover value, `0.0..=1.0`.
    fn set_cover(&mut self, cover: f32);
}
