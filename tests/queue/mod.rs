//! Queue Integration Test Modules

pub mod end_to_end;
