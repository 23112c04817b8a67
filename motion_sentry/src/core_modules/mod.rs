pub mod background_aggregator;
pub mod blob_detector;
pub mod box_suppressor;
pub mod foreground_estimator;
pub mod frame;
pub mod mask_cleaner;
pub mod motion_blob;
pub mod motion_history;
pub mod pixel_mixture;
