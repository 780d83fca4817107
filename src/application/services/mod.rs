pub mod messenger;
pub mod profiles;
