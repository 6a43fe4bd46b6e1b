pub mod listing;
pub mod published;
pub mod region_cache;
