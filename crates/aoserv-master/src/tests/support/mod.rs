//! Shared harness for the behavioural suites.

mod client;
mod config_loader;
mod memory;
mod reporter;
mod services;
mod world;

pub use client::TestClient;
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use memory::{MemoryDatabase, MemoryDirectory};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use services::{FakeDnsService, StubbornService};
pub use world::{MasterWorld, PASSWORD, Reply, world};
