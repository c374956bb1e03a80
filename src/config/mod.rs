pub mod content;
pub mod settings;

pub use content::*;
pub use settings::*;
