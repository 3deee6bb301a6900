pub mod config;
pub mod logging;

pub mod archive;
pub mod github;
pub mod hash;
pub mod http;
pub mod nar;
pub mod record;
pub mod template;
pub mod updater;
pub mod version;
