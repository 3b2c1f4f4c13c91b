pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{demo_dataset, seed_demo_dataset, DemoDataset, SeedSummary};
pub use repositories::{
    InMemoryActivityRepository, InMemoryAnalysisRepository, InMemoryApplicationUsageRepository,
    InMemoryBudgetRepository, InMemoryTransactionRepository, SqlActivityRepository,
    SqlAnalysisRepository, SqlApplicationUsageRepository, SqlBudgetRepository,
    SqlTransactionRepository,
};
