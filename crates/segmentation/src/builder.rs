//! Editable audience rules: the condition groups behind a segment draft.
//!
//! Every mutation keeps two invariants: the rule set has at least one group,
//! and every group has at least one rule.

use std::fmt;

use campaign_core::{CampaignError, CampaignResult};

use crate::predicates::{Combinator, ConditionGroup, ConditionRule, Field, Operator};

/// Outcome of [`RuleSet::validate_for_save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(InvalidReason),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn into_result(self) -> CampaignResult<()> {
        match self {
            Validation::Valid => Ok(()),
            Validation::Invalid(reason) => Err(CampaignError::Validation(reason.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    NoGroups,
    EmptyGroup {
        group: usize,
    },
    IncompleteRule {
        group: usize,
        rule: usize,
    },
    IncompatibleOperator {
        group: usize,
        rule: usize,
        field: Field,
        operator: Operator,
    },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Positions are reported 1-based, as shown to the user.
        match self {
            InvalidReason::NoGroups => write!(f, "add at least one audience rule"),
            InvalidReason::EmptyGroup { group } => {
                write!(f, "condition group {} has no rules", group + 1)
            }
            InvalidReason::IncompleteRule { group, rule } => write!(
                f,
                "rule {} in condition group {} is incomplete",
                rule + 1,
                group + 1
            ),
            InvalidReason::IncompatibleOperator {
                group,
                rule,
                field,
                operator,
            } => write!(
                f,
                "rule {} in condition group {}: '{}' cannot be applied to '{}'",
                rule + 1,
                group + 1,
                operator,
                field
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    groups: Vec<ConditionGroup>,
}

impl RuleSet {
    /// Starts with a single `AND` group holding one empty rule.
    pub fn new() -> Self {
        Self {
            groups: vec![ConditionGroup::new()],
        }
    }

    /// Adopts externally produced groups (a stored segment, converted natural
    /// language) after checking the structural invariants.
    pub fn from_groups(groups: Vec<ConditionGroup>) -> CampaignResult<Self> {
        if groups.is_empty() {
            return Err(CampaignError::Validation(InvalidReason::NoGroups.to_string()));
        }
        if let Some(group) = groups.iter().position(|g| g.rules.is_empty()) {
            return Err(CampaignError::Validation(
                InvalidReason::EmptyGroup { group }.to_string(),
            ));
        }
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[ConditionGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<ConditionGroup> {
        self.groups
    }

    pub fn add_group(&mut self) -> usize {
        self.groups.push(ConditionGroup::new());
        self.groups.len() - 1
    }

    pub fn remove_group(&mut self, group_index: usize) -> CampaignResult<ConditionGroup> {
        self.group(group_index)?;
        if self.groups.len() == 1 {
            return Err(CampaignError::InvalidOperation(
                "cannot remove the last condition group".to_string(),
            ));
        }
        Ok(self.groups.remove(group_index))
    }

    pub fn add_rule(&mut self, group_index: usize) -> CampaignResult<usize> {
        let group = self.group_mut(group_index)?;
        group.rules.push(ConditionRule::empty());
        Ok(group.rules.len() - 1)
    }

    pub fn remove_rule(
        &mut self,
        group_index: usize,
        rule_index: usize,
    ) -> CampaignResult<ConditionRule> {
        self.rule(group_index, rule_index)?;
        let group = self.group_mut(group_index)?;
        if group.rules.len() < 2 {
            return Err(CampaignError::InvalidOperation(format!(
                "cannot remove the only rule of condition group {group_index}"
            )));
        }
        Ok(group.rules.remove(rule_index))
    }

    pub fn set_group_combinator(
        &mut self,
        group_index: usize,
        combinator: Combinator,
    ) -> CampaignResult<()> {
        self.group_mut(group_index)?.combinator = combinator;
        Ok(())
    }

    pub fn set_rule_field(
        &mut self,
        group_index: usize,
        rule_index: usize,
        field: Field,
    ) -> CampaignResult<()> {
        self.rule_mut(group_index, rule_index)?.field = Some(field);
        Ok(())
    }

    pub fn set_rule_operator(
        &mut self,
        group_index: usize,
        rule_index: usize,
        operator: Operator,
    ) -> CampaignResult<()> {
        self.rule_mut(group_index, rule_index)?.operator = Some(operator);
        Ok(())
    }

    pub fn set_rule_value(
        &mut self,
        group_index: usize,
        rule_index: usize,
        value: impl Into<String>,
    ) -> CampaignResult<()> {
        self.rule_mut(group_index, rule_index)?.value = value.into();
        Ok(())
    }

    /// Gates both preview and save. Reports the first incomplete rule.
    pub fn validate_for_save(&self) -> Validation {
        validate_groups(&self.groups, false)
    }

    /// As [`validate_for_save`](Self::validate_for_save), additionally checking
    /// every rule against the field/operator capability table.
    pub fn validate_strict(&self) -> Validation {
        validate_groups(&self.groups, true)
    }

    fn group(&self, group_index: usize) -> CampaignResult<&ConditionGroup> {
        self.groups
            .get(group_index)
            .ok_or_else(|| group_out_of_range(group_index))
    }

    fn group_mut(&mut self, group_index: usize) -> CampaignResult<&mut ConditionGroup> {
        self.groups
            .get_mut(group_index)
            .ok_or_else(|| group_out_of_range(group_index))
    }

    fn rule(&self, group_index: usize, rule_index: usize) -> CampaignResult<&ConditionRule> {
        self.group(group_index)?
            .rules
            .get(rule_index)
            .ok_or_else(|| rule_out_of_range(group_index, rule_index))
    }

    fn rule_mut(
        &mut self,
        group_index: usize,
        rule_index: usize,
    ) -> CampaignResult<&mut ConditionRule> {
        self.group_mut(group_index)?
            .rules
            .get_mut(rule_index)
            .ok_or_else(|| rule_out_of_range(group_index, rule_index))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Validation over raw groups, for callers holding wire data rather than a
/// [`RuleSet`].
pub fn validate_groups(groups: &[ConditionGroup], strict: bool) -> Validation {
    if groups.is_empty() {
        return Validation::Invalid(InvalidReason::NoGroups);
    }
    for (group_index, group) in groups.iter().enumerate() {
        if group.rules.is_empty() {
            return Validation::Invalid(InvalidReason::EmptyGroup { group: group_index });
        }
        for (rule_index, rule) in group.rules.iter().enumerate() {
            if !rule.is_complete() {
                return Validation::Invalid(InvalidReason::IncompleteRule {
                    group: group_index,
                    rule: rule_index,
                });
            }
            if strict {
                if let (Some(field), Some(operator)) = (rule.field, rule.operator) {
                    if !operator.is_allowed_for(field) {
                        return Validation::Invalid(InvalidReason::IncompatibleOperator {
                            group: group_index,
                            rule: rule_index,
                            field,
                            operator,
                        });
                    }
                }
            }
        }
    }
    Validation::Valid
}

fn group_out_of_range(group_index: usize) -> CampaignError {
    CampaignError::InvalidOperation(format!("no condition group at index {group_index}"))
}

fn rule_out_of_range(group_index: usize, rule_index: usize) -> CampaignError {
    CampaignError::InvalidOperation(format!(
        "no rule at index {rule_index} in condition group {group_index}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(rule_set: &mut RuleSet, group: usize, rule: usize) {
        rule_set.set_rule_field(group, rule, Field::TotalSpend).unwrap();
        rule_set
            .set_rule_operator(group, rule, Operator::GreaterThan)
            .unwrap();
        rule_set.set_rule_value(group, rule, "5000").unwrap();
    }

    #[test]
    fn test_add_group_then_remove_only_rule_is_rejected() {
        let mut rules = RuleSet::new();
        assert_eq!(rules.add_group(), 1);
        assert_eq!(rules.groups().len(), 2);
        for group in rules.groups() {
            assert_eq!(group.combinator, Combinator::And);
            assert_eq!(group.rules, vec![ConditionRule::empty()]);
        }

        let err = rules.remove_rule(0, 0).unwrap_err();
        assert!(matches!(err, CampaignError::InvalidOperation(_)));
        assert_eq!(rules.groups()[0].rules.len(), 1);
    }

    #[test]
    fn test_last_group_cannot_be_removed() {
        let mut rules = RuleSet::new();
        assert!(matches!(
            rules.remove_group(0),
            Err(CampaignError::InvalidOperation(_))
        ));

        rules.add_group();
        rules.set_group_combinator(1, Combinator::Or).unwrap();
        let removed = rules.remove_group(0).unwrap();
        assert_eq!(removed.combinator, Combinator::And);
        assert_eq!(rules.groups().len(), 1);
        assert_eq!(rules.groups()[0].combinator, Combinator::Or);
    }

    #[test]
    fn test_remove_rule_keeps_order() {
        let mut rules = RuleSet::new();
        rules.add_rule(0).unwrap();
        rules.add_rule(0).unwrap();
        rules.set_rule_value(0, 0, "a").unwrap();
        rules.set_rule_value(0, 1, "b").unwrap();
        rules.set_rule_value(0, 2, "c").unwrap();

        let removed = rules.remove_rule(0, 1).unwrap();
        assert_eq!(removed.value, "b");
        let values: Vec<_> = rules.groups()[0].rules.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["a", "c"]);
    }

    #[test]
    fn test_out_of_range_indices() {
        let mut rules = RuleSet::new();
        assert!(rules.add_rule(3).is_err());
        assert!(rules.set_rule_value(0, 5, "x").is_err());
        assert!(rules.remove_rule(0, 5).is_err());
        assert!(rules.remove_group(9).is_err());
        assert_eq!(rules, RuleSet::new());
    }

    #[test]
    fn test_validate_reports_first_incomplete_rule() {
        let mut rules = RuleSet::new();
        assert_eq!(
            rules.validate_for_save(),
            Validation::Invalid(InvalidReason::IncompleteRule { group: 0, rule: 0 })
        );

        filled(&mut rules, 0, 0);
        rules.add_group();
        rules.add_rule(1).unwrap();
        filled(&mut rules, 1, 0);
        rules.set_rule_field(1, 1, Field::OrderStatus).unwrap();

        let validation = rules.validate_for_save();
        assert_eq!(
            validation,
            Validation::Invalid(InvalidReason::IncompleteRule { group: 1, rule: 1 })
        );
        let err = validation.into_result().unwrap_err();
        assert!(err.to_string().contains("rule 2 in condition group 2"));

        rules.set_rule_operator(1, 1, Operator::Equals).unwrap();
        rules.set_rule_value(1, 1, "delivered").unwrap();
        assert!(rules.validate_for_save().is_valid());
    }

    #[test]
    fn test_strict_validation_uses_capability_table() {
        let mut rules = RuleSet::new();
        rules.set_rule_field(0, 0, Field::TotalSpend).unwrap();
        rules.set_rule_operator(0, 0, Operator::Contains).unwrap();
        rules.set_rule_value(0, 0, "50").unwrap();

        assert!(rules.validate_for_save().is_valid());
        assert_eq!(
            rules.validate_strict(),
            Validation::Invalid(InvalidReason::IncompatibleOperator {
                group: 0,
                rule: 0,
                field: Field::TotalSpend,
                operator: Operator::Contains,
            })
        );
    }

    #[test]
    fn test_from_groups_enforces_structure() {
        assert!(RuleSet::from_groups(vec![]).is_err());
        let empty_group = ConditionGroup::with_rules(Combinator::Or, vec![]);
        assert!(RuleSet::from_groups(vec![ConditionGroup::new(), empty_group]).is_err());

        let rules = RuleSet::from_groups(vec![ConditionGroup::new()]).unwrap();
        assert_eq!(rules, RuleSet::new());
    }

    #[test]
    fn test_invariants_hold_under_mutation_sequence() {
        let mut rules = RuleSet::new();
        for step in 0..40usize {
            let groups = rules.groups().len();
            match step % 5 {
                0 => {
                    rules.add_group();
                }
                1 => {
                    let _ = rules.add_rule(step % groups);
                }
                2 => {
                    let _ = rules.remove_rule(step % groups, 0);
                }
                3 => {
                    let _ = rules.remove_group(step % groups);
                }
                _ => {
                    let _ = rules.remove_group(0);
                }
            }
            assert!(!rules.groups().is_empty());
            assert!(rules.groups().iter().all(|g| !g.rules.is_empty()));
        }
    }
}
