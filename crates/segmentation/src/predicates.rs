//! Condition rules and groups describing a target audience.

use std::fmt;
use std::str::FromStr;

use campaign_core::CampaignError;
use serde::{Deserialize, Serialize};

/// Customer attribute a rule tests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    TotalSpend,
    TotalPurchases,
    LastPurchase,
    AverageOrderValue,
    OrderFrequency,
    PaymentMethod,
    OrderStatus,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::TotalSpend,
        Field::TotalPurchases,
        Field::LastPurchase,
        Field::AverageOrderValue,
        Field::OrderFrequency,
        Field::PaymentMethod,
        Field::OrderStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::TotalSpend => "totalSpend",
            Field::TotalPurchases => "totalPurchases",
            Field::LastPurchase => "lastPurchase",
            Field::AverageOrderValue => "averageOrderValue",
            Field::OrderFrequency => "orderFrequency",
            Field::PaymentMethod => "paymentMethod",
            Field::OrderStatus => "orderStatus",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::TotalSpend => "Total Spend",
            Field::TotalPurchases => "Total Purchases",
            Field::LastPurchase => "Last Purchase",
            Field::AverageOrderValue => "Average Order Value",
            Field::OrderFrequency => "Order Frequency",
            Field::PaymentMethod => "Payment Method",
            Field::OrderStatus => "Order Status",
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Field::TotalSpend
            | Field::TotalPurchases
            | Field::AverageOrderValue
            | Field::OrderFrequency => FieldType::Numeric,
            Field::LastPurchase => FieldType::Date,
            Field::PaymentMethod | Field::OrderStatus => FieldType::Categorical,
        }
    }
}

/// Comparison a rule applies between the field and its value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    In,
    NotIn,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::Contains,
        Operator::NotContains,
        Operator::In,
        Operator::NotIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::GreaterThan => "greaterThan",
            Operator::LessThan => "lessThan",
            Operator::Contains => "contains",
            Operator::NotContains => "notContains",
            Operator::In => "in",
            Operator::NotIn => "notIn",
        }
    }

    pub fn is_allowed_for(&self, field: Field) -> bool {
        field.field_type().allowed_operators().contains(self)
    }
}

/// Value domain of a field, keying the operator capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Numeric,
    Date,
    Categorical,
}

impl FieldType {
    pub fn allowed_operators(&self) -> &'static [Operator] {
        match self {
            FieldType::Numeric => &[
                Operator::Equals,
                Operator::NotEquals,
                Operator::GreaterThan,
                Operator::LessThan,
            ],
            FieldType::Date => &[
                Operator::Equals,
                Operator::NotEquals,
                Operator::GreaterThan,
                Operator::LessThan,
            ],
            FieldType::Categorical => &[
                Operator::Equals,
                Operator::NotEquals,
                Operator::Contains,
                Operator::NotContains,
                Operator::In,
                Operator::NotIn,
            ],
        }
    }
}

macro_rules! parse_by_name {
    ($ty:ident, $what:literal) => {
        impl FromStr for $ty {
            type Err = CampaignError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| CampaignError::Validation(format!("unknown {} '{}'", $what, s)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

parse_by_name!(Field, "field");
parse_by_name!(Operator, "operator");

/// Boolean combinator inside a single group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => f.write_str("AND"),
            Combinator::Or => f.write_str("OR"),
        }
    }
}

/// Groups of a segment are joined with this combinator. The wire format has no
/// slot for it; a configurable top-level operator would be added beside the
/// group array.
pub const CROSS_GROUP_COMBINATOR: Combinator = Combinator::And;

/// A single `field operator value` test. Unset parts travel as empty strings
/// so a half-edited rule round-trips unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionRule {
    #[serde(with = "blank", default)]
    pub field: Option<Field>,
    #[serde(with = "blank", default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub value: String,
}

impl ConditionRule {
    pub fn new(field: Field, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: Some(field),
            operator: Some(operator),
            value: value.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A rule can be submitted only once field, operator and value are all set.
    pub fn is_complete(&self) -> bool {
        self.field.is_some() && self.operator.is_some() && !self.value.trim().is_empty()
    }

    /// List operands for `in` / `notIn`, split on commas.
    pub fn values(&self) -> Vec<&str> {
        self.value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionGroup {
    #[serde(rename = "operator", default)]
    pub combinator: Combinator,
    pub rules: Vec<ConditionRule>,
}

impl ConditionGroup {
    /// Fresh group: `AND` with one empty rule.
    pub fn new() -> Self {
        Self {
            combinator: Combinator::And,
            rules: vec![ConditionRule::empty()],
        }
    }

    pub fn with_rules(combinator: Combinator, rules: Vec<ConditionRule>) -> Self {
        Self { combinator, rules }
    }
}

impl Default for ConditionGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Serde adapter mapping `None` to and from the empty string.
mod blank {
    use serde::de::value::StringDeserializer;
    use serde::de::IntoDeserializer;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(None);
        }
        let de: StringDeserializer<D::Error> = raw.into_deserializer();
        T::deserialize(de).map(Some)
    }
}
