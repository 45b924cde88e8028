//! Host-side integration suite.
//!
//! `mock_hw` holds recorder implementations of every port; the other
//! modules drive [`AppService`](aws_sensor::app::service::AppService)
//! and the simulation adapters through whole device scenarios.

mod app_service_tests;
mod cloud_lifecycle_tests;
mod mock_hw;
mod provisioning_flow_tests;
mod provisioning_server_tests;
