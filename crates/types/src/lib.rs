// crates/types/src/lib.rs
//! Wire contracts shared between the applytrack client and the sync backend.
//!
//! Everything here mirrors a JSON shape on the wire. Normalization of the
//! looser shapes (aliased metric names, nested result objects) happens in
//! `applytrack-core`, not here.

pub mod error;
pub mod status;
pub mod summary;
pub mod sync;

pub use error::*;
pub use status::*;
pub use summary::*;
pub use sync::*;
