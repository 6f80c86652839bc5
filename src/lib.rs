//! skyguard-charts: time-window and aggregation engine for monitoring dashboards.
//!
//! The crate decides *what* a chart shows (time range, aggregation bucket width,
//! live vs. frozen mode, cross-chart linking, hover anchor) and leaves painting,
//! theming and storage to the host application.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod interaction;
pub mod telemetry;

pub use api::{ChartModeController, DashboardLinkCoordinator, MonitorDashboard};
pub use error::{ChartError, ChartResult};
