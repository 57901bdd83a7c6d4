pub mod duplicate;
pub mod hierarchy;
pub mod similarity;
