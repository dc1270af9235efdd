pub mod bayes;
pub mod device;
pub mod error;
pub mod summary;
pub mod table;
pub mod test_util;
pub mod variant;
