//! vision_core: shared frame/renderer interfaces and mask overlay.

pub mod interfaces;
pub mod overlay;

pub mod prelude {
    pub use crate::interfaces::*;
    pub use crate::overlay::*;
}
