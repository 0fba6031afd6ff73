//! Test suites for the master.

pub(crate) mod support;
