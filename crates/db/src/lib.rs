pub mod connection;
pub mod export;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use export::{export_table_to_csv, export_table_to_path, ExportError, ExportTable};
pub use repositories::{
    InMemoryUserProfileRepository, RepositoryError, SqlUserProfileRepository,
    UserProfileRepository,
};
