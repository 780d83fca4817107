pub mod env;
pub mod in_memory;
