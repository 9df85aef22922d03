pub mod config;
pub mod error;
pub mod panel;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use panel::*;
pub use traits::*;
pub use types::*;
