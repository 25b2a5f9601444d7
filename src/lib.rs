pub mod app;
pub mod config;
pub mod error;
pub mod format;
pub mod indexer;
pub mod scheduler;
pub mod treasury;
pub mod db {
    pub mod models;
    pub mod preferences_repository;
    pub mod repository;
}
pub mod search {
    pub mod client;
    pub mod fitter;
    pub mod record;
}
pub mod notifications {
    pub mod preferences;
}
pub mod api {
    pub mod errors;
    pub mod preferences;
    pub mod search;
    pub mod sync;
}

#[cfg(test)]
pub(crate) mod test_support;
