//! Handler modules for banyan-api.

pub mod access;
pub mod files;
pub mod marks;
pub mod notes;
pub mod sequencers;
pub mod sync;
