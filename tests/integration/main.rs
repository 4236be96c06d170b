//! Integration tests: the deployment pipeline end to end against a
//! recording task runner, local price pages and a local webhook.

mod mock_runner;
mod notify;
mod pipeline;
mod servers;
