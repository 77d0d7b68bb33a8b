//! Budget module - the request body sent to the billing budgets API.
//!
//! # Key Concepts
//! - Money: decimal strings converted to `{units, nanos}`
//! - Thresholds: percent/forecast pairs, with a built-in default set
//! - Filter: service, project, subaccount and label scopes
//! - Notifications: monitoring channels, Pub/Sub topic, default recipients
//! - Assembler: composes all of the above into one [`Budget`]

mod assembler;
mod filter;
mod money;
mod notify;
mod threshold;

pub use assembler::{
    assemble, assemble_debug, Assembly, AssemblyWarning, Budget, BudgetAmount, BudgetOptions,
    BudgetSpec, DebugAssembly, LastPeriod, MAX_DISPLAY_NAME,
};
pub use filter::{BudgetFilter, CreditTypesTreatment, LabelFilters, ScopeDescriptor};
pub use money::{MoneyAmount, DEFAULT_CURRENCY};
pub use notify::{NotificationChannels, NotificationOptions, NotificationRule, MAX_CHANNELS};
pub use threshold::{
    build_threshold_rules, default_thresholds, RawThreshold, SpendBasis, ThresholdSpec,
    FALLBACK_PERCENT,
};
