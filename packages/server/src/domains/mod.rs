// Business domains
pub mod contents;
