//! ICU bed regulation desk following the CFM 2.156/2016 priority criteria.
//!
//! Requests are classified with [`priority::classify`], queued by priority and
//! age, and placed into beds through a [`RegulationDesk`]. Every state change
//! is committed atomically to the [`store::DocumentStore`].

pub mod analytics;
pub mod audit;
pub mod config;
pub mod discharge;
pub mod errors;
pub mod models;
pub mod priority;
pub mod regulation;
pub mod requests;
pub mod store;
pub mod structure;

pub use analytics::{DashboardStats, UnitOccupancy};
pub use audit::AuditView;
pub use config::{Config, Settings};
pub use discharge::DischargeStats;
pub use errors::{RegulationError, RegulationResult};
pub use priority::{classify, AnswerSheet, CfmAnswers, CfmPriority, Classification, RuleSet};
pub use regulation::{RegulationDesk, UnitBoard};
pub use requests::{QueueFilter, QueueSort};
