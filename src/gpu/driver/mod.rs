pub mod binding;
pub mod command;
pub mod layout;
pub mod state;
pub mod types;
