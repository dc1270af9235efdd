pub mod compare;
pub mod devices;
pub mod report;
pub mod summary;
