pub mod observers;

pub use observers::{ChartEvent, ChartObserver, PresetCatalogListener};
