//! Segments and audience evaluation.
//!
//! The production evaluator lives in the backend and is reached through
//! [`AudienceEvaluator`]. [`InMemoryEvaluator`] implements the same contract
//! over a local customer table for offline previews and tests.

use async_trait::async_trait;
use campaign_core::{CampaignResult, SegmentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::predicates::{
    Combinator, ConditionGroup, ConditionRule, Field, Operator, CROSS_GROUP_COMBINATOR,
};

/// A persisted audience definition. Immutable once a campaign references it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    #[serde(rename = "_id", alias = "id")]
    pub id: SegmentId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "conditions")]
    pub groups: Vec<ConditionGroup>,
}

/// Counts the customers matching a set of condition groups.
///
/// Implementations must be deterministic and side-effect free: the same groups
/// over unchanged customer data always yield the same count.
#[async_trait]
pub trait AudienceEvaluator: Send + Sync {
    async fn audience_size(&self, groups: &[ConditionGroup]) -> CampaignResult<u64>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub total_spend: f64,
    #[serde(default)]
    pub total_purchases: u64,
    #[serde(default)]
    pub last_purchase: Option<NaiveDate>,
    #[serde(default)]
    pub average_order_value: f64,
    #[serde(default)]
    pub order_frequency: f64,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub order_status: Option<String>,
}

impl CustomerProfile {
    fn attribute(&self, field: Field) -> Option<AttributeValue<'_>> {
        match field {
            Field::TotalSpend => Some(AttributeValue::Number(self.total_spend)),
            Field::TotalPurchases => Some(AttributeValue::Number(self.total_purchases as f64)),
            Field::AverageOrderValue => Some(AttributeValue::Number(self.average_order_value)),
            Field::OrderFrequency => Some(AttributeValue::Number(self.order_frequency)),
            Field::LastPurchase => self.last_purchase.map(AttributeValue::Date),
            Field::PaymentMethod => self.payment_method.as_deref().map(AttributeValue::Text),
            Field::OrderStatus => self.order_status.as_deref().map(AttributeValue::Text),
        }
    }
}

enum AttributeValue<'a> {
    Number(f64),
    Date(NaiveDate),
    Text(&'a str),
}

pub struct InMemoryEvaluator {
    customers: dashmap::DashMap<String, CustomerProfile>,
}

impl InMemoryEvaluator {
    pub fn new() -> Self {
        Self {
            customers: dashmap::DashMap::new(),
        }
    }

    pub fn upsert_customer(&self, customer: CustomerProfile) {
        self.customers.insert(customer.id.clone(), customer);
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn matches(&self, customer: &CustomerProfile, groups: &[ConditionGroup]) -> bool {
        match CROSS_GROUP_COMBINATOR {
            Combinator::And => groups.iter().all(|g| matches_group(customer, g)),
            Combinator::Or => groups.iter().any(|g| matches_group(customer, g)),
        }
    }

    pub fn count(&self, groups: &[ConditionGroup]) -> u64 {
        self.customers
            .iter()
            .filter(|entry| self.matches(entry.value(), groups))
            .count() as u64
    }
}

impl Default for InMemoryEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudienceEvaluator for InMemoryEvaluator {
    async fn audience_size(&self, groups: &[ConditionGroup]) -> CampaignResult<u64> {
        let size = self.count(groups);
        debug!(groups = groups.len(), audience_size = size, "Evaluated audience locally");
        Ok(size)
    }
}

fn matches_group(customer: &CustomerProfile, group: &ConditionGroup) -> bool {
    match group.combinator {
        Combinator::And => group.rules.iter().all(|r| matches_rule(customer, r)),
        Combinator::Or => group.rules.iter().any(|r| matches_rule(customer, r)),
    }
}

fn matches_rule(customer: &CustomerProfile, rule: &ConditionRule) -> bool {
    let (Some(field), Some(operator)) = (rule.field, rule.operator) else {
        return false;
    };
    let Some(actual) = customer.attribute(field) else {
        return false;
    };
    match actual {
        AttributeValue::Number(n) => compare_number(n, operator, rule),
        AttributeValue::Date(d) => compare_date(d, operator, rule),
        AttributeValue::Text(t) => compare_text(t, operator, rule),
    }
}

fn compare_number(actual: f64, operator: Operator, rule: &ConditionRule) -> bool {
    let parse = |v: &str| v.parse::<f64>().ok();
    match operator {
        Operator::In => rule.values().into_iter().filter_map(parse).any(|v| v == actual),
        Operator::NotIn => !rule.values().into_iter().filter_map(parse).any(|v| v == actual),
        Operator::Contains => actual.to_string().contains(rule.value.trim()),
        Operator::NotContains => !actual.to_string().contains(rule.value.trim()),
        _ => match parse(rule.value.trim()) {
            Some(expected) => compare_ordered(actual.partial_cmp(&expected), operator),
            None => false,
        },
    }
}

fn compare_date(actual: NaiveDate, operator: Operator, rule: &ConditionRule) -> bool {
    let parse = |v: &str| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok();
    match operator {
        Operator::In => rule.values().into_iter().filter_map(parse).any(|d| d == actual),
        Operator::NotIn => !rule.values().into_iter().filter_map(parse).any(|d| d == actual),
        Operator::Contains | Operator::NotContains => {
            let found = actual.to_string().contains(rule.value.trim());
            found == (operator == Operator::Contains)
        }
        _ => match parse(rule.value.trim()) {
            Some(expected) => compare_ordered(Some(actual.cmp(&expected)), operator),
            None => false,
        },
    }
}

fn compare_text(actual: &str, operator: Operator, rule: &ConditionRule) -> bool {
    let actual = actual.to_lowercase();
    let expected = rule.value.trim().to_lowercase();
    let in_list = || rule.values().iter().any(|v| v.to_lowercase() == actual);
    match operator {
        Operator::Equals => actual == expected,
        Operator::NotEquals => actual != expected,
        Operator::Contains => actual.contains(&expected),
        Operator::NotContains => !actual.contains(&expected),
        Operator::In => in_list(),
        Operator::NotIn => !in_list(),
        Operator::GreaterThan => actual > expected,
        Operator::LessThan => actual < expected,
    }
}

fn compare_ordered(ordering: Option<std::cmp::Ordering>, operator: Operator) -> bool {
    use std::cmp::Ordering;
    match (operator, ordering) {
        (Operator::Equals, Some(o)) => o == Ordering::Equal,
        (Operator::NotEquals, Some(o)) => o != Ordering::Equal,
        (Operator::GreaterThan, Some(o)) => o == Ordering::Greater,
        (Operator::LessThan, Some(o)) => o == Ordering::Less,
        _ => false,
    }
}
