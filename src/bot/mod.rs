// Discord front end: command routing, prompts and delivery

pub mod admin;
pub mod commands;
pub mod delivery;
pub mod discord;
pub mod handler;
pub mod prompts;

pub use delivery::{Delivery, DeliveryOutcome, DeliveryReport, Uploader};
pub use handler::Handler;
pub use prompts::PromptRegistry;
