//! End-to-end sign-in flow tests.
//!
//! A stub identity provider signs real responses; the service provider runs
//! its full command pipeline against them. Nothing leaves the process.

mod common;
mod acs_validation;
mod concurrency;
mod sign_in_flow;
