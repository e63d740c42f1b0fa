// Library for tests to access modules

pub mod aggregation;
pub mod aggregation_worker;
pub mod config;
pub mod gauges;
pub mod maintenance;
pub mod metric_source;
pub mod models;
pub mod routes;
pub mod sample_buffer;
pub mod stats;
pub mod store;
pub mod task;
pub mod worker;
