pub mod dates;
pub mod error;
pub mod traits;
pub mod types;

pub use dates::*;
pub use error::*;
pub use traits::*;
pub use types::*;
