pub mod association;
pub mod augment;
pub mod correction;
pub mod filter;
pub mod predict;
pub mod state;
pub mod types;

pub use association::*;
pub use augment::*;
pub use correction::*;
pub use filter::*;
pub use predict::*;
pub use state::*;
pub use types::*;
