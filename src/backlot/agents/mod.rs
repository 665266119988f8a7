// src/backlot/agents/mod.rs

pub mod analytics;
pub mod sales;
pub mod talent;

pub use analytics::AnalyticsBehavior;
pub use sales::SalesBehavior;
pub use talent::TalentBehavior;
