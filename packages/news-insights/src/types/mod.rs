//! Data types shared by the stores, queues and stage workers.

pub mod chart;
pub mod fragment;
pub mod job;
pub mod news;
pub mod status;
