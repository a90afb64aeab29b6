pub mod archival_path;
pub mod config;
pub mod dictionaries;
pub mod extract;
pub mod folders;
pub mod local_fs;
pub mod lock;
pub mod orchestrator;
pub mod paths;
pub mod period;
pub mod retry;
pub mod skip;
pub mod store;
pub mod uploader;
pub mod util;
