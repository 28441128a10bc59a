pub mod catalog;
pub mod installer;
pub mod updater;
