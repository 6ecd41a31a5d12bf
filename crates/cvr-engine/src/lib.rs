pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod gate;
pub mod util;

pub use bridge::*;
pub use config::*;
pub use dispatch::*;
pub use engine::*;
pub use gate::*;
pub use util::*;
