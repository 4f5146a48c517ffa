pub mod config;
pub mod logging;

// Engine
pub mod admission;
pub mod aria2;
pub mod http;
pub mod job_db;
pub mod library;
pub mod naming;
pub mod provider;
pub mod scheduler;
pub mod shutdown;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;
