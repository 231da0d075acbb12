//! linkstat CLI - check link reachability and regenerate reports
//!
//! All command handling lives in the library crate so integration tests and
//! the binary share one code path.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    linkstat_cli::run().await
}
