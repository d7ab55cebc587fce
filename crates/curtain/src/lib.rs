//! # Curtain
//!
//! Synchronized scene transitions for small networked sessions: one
//! authority node and N followers cover their screens together, the
//! authority swaps the shared scene, and everyone reveals it together —
//! no participant ever sees the raw, un-animated load.
//!
//! The authority broadcasts `StartTransition`, every node plays its
//! covering effect and acknowledges, the authority waits for the full
//! barrier, stages and activates the new scene, then broadcasts `Loaded`
//! to release the reveal on every node at once.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use curtain::{AuthorityNode, NodeConfig};
//! use curtain_effect::EffectRegistry;
//! use curtain_transport::WebSocketListener;
//!
//! # use curtain_barrier::{LoadError, SceneLoader, StagedScene};
//! # use curtain_protocol::ResourceId;
//! # struct MyLoader;
//! # impl SceneLoader for MyLoader {
//! #     async fn stage(&self, r: &ResourceId) -> Result<StagedScene, LoadError> {
//! #         Ok(StagedScene::new(r.clone()))
//! #     }
//! #     async fn activate(&self, _s: StagedScene) -> Result<(), LoadError> {
//! #         Ok(())
//! #     }
//! # }
//! # async fn demo() -> Result<(), curtain::CurtainError> {
//! let listener = WebSocketListener::bind("127.0.0.1:9000").await?;
//! let registry = Arc::new(EffectRegistry::with_default_fade());
//!
//! let (node, handle) =
//!     AuthorityNode::new(listener, MyLoader, registry, NodeConfig::default());
//! tokio::spawn(node.run());
//!
//! handle.request_transition("LevelB").await?;
//! # Ok(())
//! # }
//! ```

mod authority;
mod config;
mod error;
mod follower;

pub use authority::{AuthorityHandle, AuthorityNode};
pub use config::NodeConfig;
pub use error::CurtainError;
pub use follower::{FollowerHandle, FollowerNode};

pub use curtain_protocol::PROTOCOL_VERSION;
