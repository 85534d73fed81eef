//! Integration tests for the harbormaster library
//!
//! Control-plane behavior is scripted through `common::FakeControlPlane`;
//! the engine client is exercised against a wiremock server.

mod common;

mod test_config;
mod test_docker_client;
