//! Audience segmentation: condition rules, groups, validation, and the
//! audience-size evaluation contract.

pub mod builder;
pub mod engine;
pub mod predicates;

pub use builder::{validate_groups, InvalidReason, RuleSet, Validation};
pub use engine::{AudienceEvaluator, CustomerProfile, InMemoryEvaluator, Segment};
pub use predicates::{
    Combinator, ConditionGroup, ConditionRule, Field, FieldType, Operator, CROSS_GROUP_COMBINATOR,
};
