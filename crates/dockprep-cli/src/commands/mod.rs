pub mod defaults;
pub mod prepare;
