//! Browser and Office storage backends.

pub mod local_storage;
pub mod office_settings;
