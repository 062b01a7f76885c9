//! 常量与默认配置 / Constants and default configuration
//!
//! Literal defaults shared by the CLI, the fitter and the output writer.

/// 峰拟合常量 / Peak fit constants
pub mod fit {
    /// Half width of the fit window around the histogram mode
    pub const HALF_WINDOW: f64 = 10.0;

    /// Initial Gaussian mean, independent of the mode estimate
    pub const INITIAL_MEAN: f64 = 0.0;

    /// Initial Gaussian sigma
    pub const INITIAL_SIGMA: f64 = 5.0;

    /// Error bar attached to every fitted position, independent of the fit
    pub const FIXED_UNCERTAINTY: f64 = 0.0001;

    /// X range shown for the projected histogram
    pub const DISPLAY_MIN: f64 = -20.0;
    pub const DISPLAY_MAX: f64 = 20.0;
}

/// Defaults of the configuration surface
pub mod defaults {
    /// Data tag queried in the metadata store
    pub const DATA_TAG: &str = "Data.CB.T0";

    /// Name of the 2D timing histogram inside each artifact
    pub const HISTOGRAM_NAME: &str = "CaLib_CB_Time_Neut";

    /// Artifact file name pattern, `{run}` is replaced by the run number
    pub const ARTIFACT_PATTERN: &str = "Hist_CBTaggTAPS_{run}.json";

    /// Overview output container
    pub const OUTPUT_FILE: &str = "runset_overview.json";

    /// Key of the overview inside the output container
    pub const OVERVIEW_NAME: &str = "CBTime";

    /// Y display range of the overview
    pub const Y_MIN: f64 = -20.0;
    pub const Y_MAX: f64 = 20.0;

    /// Margin added on both sides of the run-number axis
    pub const AXIS_MARGIN: u32 = 10;

    /// Pause after each run in watch mode (milliseconds)
    pub const WATCH_PAUSE_MS: u64 = 100;
}

/// Overview labels
pub mod labels {
    pub const X_TITLE: &str = "Run Number";
    pub const Y_TITLE: &str = "CB time [ns]";
}

/// 环境变量
pub mod env {
    /// Log filter for the tracing subscriber
    pub const LOG_FILTER: &str = "RUNSET_LOG";
}
