pub mod annotator;
pub mod cache;
pub mod colors;
pub mod jobs;
pub mod providers;
pub mod similarity;
pub mod tags;
