//! Notification popups: corner stacks, arrow-shaped outlines and the cairo
//! renderer that paints them.

pub mod config;
pub mod content;
pub mod error;
pub mod geometry;
pub mod popup;
pub mod render;
pub mod shape;
pub mod stack;
pub mod style;
pub mod surface;
pub mod theme;
pub mod workarea;
