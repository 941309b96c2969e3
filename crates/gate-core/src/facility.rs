//! Facilities: protected resources with their own access rules
//!
//! A facility carries per-role requirements, a weekly operating-hours table,
//! an optional capacity with the live occupancy counter, and its lockdown
//! state. Lockdown is a two-state machine (`Normal`, `Lockdown`) mutated only
//! by the emergency lockdown controller; while locked down the facility is
//! inaccessible regardless of any permission.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::credential::{AccessLevel, AccessType, TimeRestriction};
use crate::errors::{GateError, Result};
use crate::identifiers::{FacilityId, SubjectId};
use crate::time::{ClockTime, DayOfWeek, LocalMoment, Timestamp};

/// Extra condition surfaced to the scanner UI on grant; never blocks entry here
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraRequirement {
    EscortRequired,
    SafetyTraining,
    SupervisorPresent,
    PhotoIdCheck,
    Custom(String),
}

/// What a role needs to enter a facility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequirement {
    pub access_type: AccessType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restriction: Option<TimeRestriction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<ExtraRequirement>,
}

impl RoleRequirement {
    /// Full access with no extra requirements
    pub fn full() -> Self {
        Self {
            access_type: AccessType::Full,
            time_restriction: None,
            requirements: Vec::new(),
        }
    }
}

/// Opening state for one weekday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DayHours {
    Closed,
    /// Open from `open` (inclusive) until `close` (exclusive); `open == close` means all day
    Open { open: ClockTime, close: ClockTime },
}

/// Weekly operating-hours table; days missing from the table are closed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatingHours(BTreeMap<DayOfWeek, DayHours>);

impl OperatingHours {
    /// Same opening window on each listed day
    pub fn uniform(
        days: impl IntoIterator<Item = DayOfWeek>,
        open: ClockTime,
        close: ClockTime,
    ) -> Self {
        Self(
            days.into_iter()
                .map(|day| (day, DayHours::Open { open, close }))
                .collect(),
        )
    }

    /// Set the hours for one day
    pub fn set(&mut self, day: DayOfWeek, hours: DayHours) {
        self.0.insert(day, hours);
    }

    /// Hours for a day
    pub fn hours_on(&self, day: DayOfWeek) -> DayHours {
        self.0.get(&day).copied().unwrap_or(DayHours::Closed)
    }

    /// Whether the facility is open at `moment`
    pub fn is_open_at(&self, moment: LocalMoment) -> bool {
        match self.hours_on(moment.day) {
            DayHours::Closed => false,
            DayHours::Open { open, close } if open == close => true,
            DayHours::Open { open, close } if open < close => {
                open <= moment.time && moment.time < close
            }
            DayHours::Open { open, close } => moment.time >= open || moment.time < close,
        }
    }
}

/// Two-state lockdown machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockdownState {
    #[default]
    Normal,
    Lockdown {
        reason: String,
        activated_by: SubjectId,
        activated_at: Timestamp,
    },
}

impl LockdownState {
    /// Whether the facility is locked down
    pub fn is_active(&self) -> bool {
        matches!(self, LockdownState::Lockdown { .. })
    }
}

/// A protected physical resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub access_rules: BTreeMap<AccessLevel, RoleRequirement>,
    /// `None` means always open
    #[serde(default)]
    pub operating_hours: Option<OperatingHours>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub current_occupancy: u32,
    #[serde(default)]
    pub lockdown: LockdownState,
}

impl Facility {
    /// Always-open facility with no capacity limit and no role rules
    pub fn new(id: FacilityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: None,
            access_rules: BTreeMap::new(),
            operating_hours: None,
            capacity: None,
            current_occupancy: 0,
            lockdown: LockdownState::Normal,
        }
    }

    /// Add or replace a role rule
    pub fn with_rule(mut self, level: AccessLevel, rule: RoleRequirement) -> Self {
        self.access_rules.insert(level, rule);
        self
    }

    /// Set operating hours
    pub fn with_hours(mut self, hours: OperatingHours) -> Self {
        self.operating_hours = Some(hours);
        self
    }

    /// Set capacity
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Rule for an access level
    pub fn rule_for(&self, level: AccessLevel) -> Option<&RoleRequirement> {
        self.access_rules.get(&level)
    }

    /// Extra requirements for an access level (empty when the role has no rule)
    pub fn requirements_for(&self, level: AccessLevel) -> &[ExtraRequirement] {
        self.rule_for(level)
            .map(|rule| rule.requirements.as_slice())
            .unwrap_or_default()
    }

    /// Whether the facility is open at `moment`
    pub fn is_open_at(&self, moment: LocalMoment) -> bool {
        self.operating_hours
            .as_ref()
            .map_or(true, |hours| hours.is_open_at(moment))
    }

    /// Whether the facility is at or over capacity
    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.current_occupancy >= capacity)
    }

    /// Check the occupancy invariant
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GateError::invalid(format!("facility {} has no name", self.id)));
        }
        if let Some(capacity) = self.capacity {
            if self.current_occupancy > capacity {
                return Err(GateError::invalid(format!(
                    "facility {} occupancy {} exceeds capacity {capacity}",
                    self.id, self.current_occupancy
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: DayOfWeek, h: u8, m: u8) -> LocalMoment {
        LocalMoment {
            day,
            time: ClockTime::new(h, m).unwrap(),
        }
    }

    #[test]
    fn hours_are_half_open() {
        let hours = OperatingHours::uniform(
            DayOfWeek::WORKDAYS,
            ClockTime::new(8, 0).unwrap(),
            ClockTime::new(22, 0).unwrap(),
        );
        assert!(hours.is_open_at(at(DayOfWeek::Monday, 8, 0)));
        assert!(!hours.is_open_at(at(DayOfWeek::Monday, 22, 0)));
        assert!(!hours.is_open_at(at(DayOfWeek::Saturday, 12, 0)));
    }

    #[test]
    fn equal_open_close_means_all_day() {
        let mut hours = OperatingHours::default();
        hours.set(
            DayOfWeek::Sunday,
            DayHours::Open {
                open: ClockTime::MIDNIGHT,
                close: ClockTime::MIDNIGHT,
            },
        );
        assert!(hours.is_open_at(at(DayOfWeek::Sunday, 3, 30)));
    }

    #[test]
    fn facility_without_hours_is_always_open() {
        let facility = Facility::new(FacilityId::new("GYM").unwrap(), "Gym");
        assert!(facility.is_open_at(at(DayOfWeek::Sunday, 2, 0)));
    }

    #[test]
    fn occupancy_above_capacity_is_invalid() {
        let mut facility = Facility::new(FacilityId::new("LAB").unwrap(), "Lab").with_capacity(2);
        facility.current_occupancy = 2;
        assert!(facility.is_full());
        assert!(facility.validate().is_ok());
        facility.current_occupancy = 3;
        assert!(facility.validate().is_err());
    }

    #[test]
    fn lockdown_state_serializes_tagged() {
        let state = LockdownState::Lockdown {
            reason: "gas leak".into(),
            activated_by: SubjectId::new("admin-1").unwrap(),
            activated_at: Timestamp::from_secs(5),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "lockdown");
        assert!(state.is_active());
        assert!(!LockdownState::Normal.is_active());
    }
}
