//! RoastProbe host process
//!
//! Everything between the command line and the two library crates:
//!
//! - [`config`]: TOML configuration with production defaults and validation
//! - [`context`]: process-scoped state and the shutdown signal
//! - [`sim`]: simulated sensors and phase edges
//! - [`runner`]: the sampling loop and transport tasks
//!
//! ## Example
//!
//! ```rust,no_run
//! use roastprobe_host::{config::ProbeConfig, context::ProbeContext, runner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = ProbeContext::new(ProbeConfig::default())?;
//! let stop = ctx.shutdown_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     stop.trigger();
//! });
//! let summary = runner::run(ctx).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod runner;
pub mod sim;

pub use config::{ConfigError, ProbeConfig, TransportKind};
pub use context::{ProbeContext, ShutdownHandle};
pub use runner::{run, RunError, RunSummary};
