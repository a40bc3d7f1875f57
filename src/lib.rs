pub mod config;
pub mod error;
pub mod events;
pub mod processing {
    pub mod blur;
    pub mod compose;
    pub mod layout;
    pub mod overlay;
    pub mod resize;
    pub mod resolve;
    pub mod rotate;
    pub mod text;
}
pub mod tasks {
    pub mod gesture;
    pub mod presenter;
    pub mod reconcile;
    pub mod selector;
    pub mod transition;
    pub mod viewer;
}

pub use error::{Error, Result};
