pub mod cli;
pub mod mappers;
