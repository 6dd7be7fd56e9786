//! Analytics Domain
//!
//! Pure computations behind the staff analytics screens, the admin
//! dashboard and the customer dashboard. Repositories feed in counts and
//! sums; everything here is arithmetic over those figures.

pub mod activity;
pub mod growth;
pub mod monthly;
pub mod recommendations;
pub mod error;

pub use activity::{ActivityAction, UserActivity};
pub use growth::{calculate_growth, percentage, ComparisonWindows};
pub use monthly::{fill_months, MonthlyPoint};
pub use recommendations::{recommend, HeldPolicy, Priority, Recommendation, EXPIRY_HORIZON_DAYS};
pub use error::AnalyticsError;
