pub mod error;
pub mod ids;
pub mod incident;
pub mod model;
pub mod transitions;

pub use error::*;
pub use ids::*;
pub use incident::*;
pub use model::*;
