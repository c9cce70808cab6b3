//! Shapes crossing the crate boundary: UI-originated intents and the events
//! the coordination loops broadcast back.

pub mod events;
pub mod requests;
