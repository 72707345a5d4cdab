mod conditions;
mod config;
mod dataset;
mod engine;
mod error;
mod fallback;
mod response;
mod spatial;
mod utils;
mod window;

pub use engine::*;
pub use error::ClimateRiskError;

pub use config::*;
pub use fallback::{parse_payload, FallbackCoordinator, FallbackMode, PayloadSource};

pub use conditions::catalog::{
    label_for, lookup as lookup_condition, names as condition_names, Comparison, ConditionSetting,
    Derivation, CATALOG,
};
pub use conditions::evaluator::evaluate;
pub use conditions::statistics::{
    exceedance_probability, preview, trend_label, MIN_TREND_SAMPLES, PREVIEW_LIMIT,
};
pub use conditions::units::{heat_index, UnitNormalizer, UnitTransform};

pub use dataset::dataset_ref::{Axes, DatasetRef};
pub use dataset::error::DatasetError;
pub use dataset::handle::{bundled_sample_path, DatasetHandle};
pub use dataset::loader::{DatasetFormat, DatasetLoader, DatasetLocator};

pub use spatial::grid_locator::{resolve, GridLocator, ResolvedPoint};
pub use spatial::grid_point::{GridPoint, LatLon};

pub use window::day_of_year::{DayOfYear, ParseDayOfYearError};
pub use window::selector::{select_window, ClimateFrameFilterExt, WindowSelection};

pub use response::export::{save as export_response, to_csv, to_json, ExportFormat};
pub use response::result::*;
pub use response::summary::{summarize, ConditionSummary, RiskTier};
