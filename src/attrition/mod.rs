pub mod features;
pub mod labels;
pub mod network;
pub mod service;
