//! Utility functions shared by the library and the demo binary

pub mod logging;
