pub mod csv_dataset_adapter;
pub mod file_config_adapter;
#[cfg(feature = "postgres")]
pub mod postgres_segment_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_segment_store;
