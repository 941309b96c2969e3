//! Shared fixtures: a small campus with known hours, roles and subjects

use gate_core::effects::SubjectProfile;
use gate_core::{
    AccessLevel, AccessType, ClockTime, DayOfWeek, DeviceId, DeviceInfo, ExtraRequirement,
    Facility, FacilityId, OperatingHours, RoleRequirement, SubjectId, TimeRestriction, Timestamp,
};
use gate_effects::StaticIdentityDirectory;
use std::time::Duration;

/// 2024-01-02 00:00 UTC, a Tuesday
pub const TUESDAY_MIDNIGHT_UTC: Timestamp = Timestamp::from_millis(1_704_153_600_000);

/// Tuesday 2024-01-02 at `hour:minute` UTC
pub fn tuesday_at(hour: u64, minute: u64) -> Timestamp {
    TUESDAY_MIDNIGHT_UTC.saturating_add(Duration::from_secs(hour * 3_600 + minute * 60))
}

/// Facility id from a literal
pub fn facility_id(id: &str) -> FacilityId {
    FacilityId::new(id).unwrap()
}

/// Subject id from a literal
pub fn subject_id(id: &str) -> SubjectId {
    SubjectId::new(id).unwrap()
}

/// Fixed reader with the given id
pub fn device(id: &str) -> DeviceInfo {
    DeviceInfo::new(DeviceId::new(id).unwrap())
}

/// Identity profile
pub fn profile(id: &str, role: AccessLevel) -> SubjectProfile {
    SubjectProfile {
        subject_id: subject_id(id),
        display_name: format!("Subject {id}"),
        role,
    }
}

/// Library: always open, full access for students and staff, 24/7
pub fn library() -> Facility {
    Facility::new(facility_id("LIB"), "Main Library")
        .with_rule(AccessLevel::Student, RoleRequirement::full())
        .with_rule(AccessLevel::Staff, RoleRequirement::full())
}

/// Research lab: open 08:00-22:00 every day, capacity 2
///
/// Students get time-limited access (Mon-Fri 08:00-20:00) with safety
/// training required; staff get full access.
pub fn research_lab() -> Facility {
    Facility::new(facility_id("LAB"), "Research Lab")
        .with_rule(
            AccessLevel::Student,
            RoleRequirement {
                access_type: AccessType::TimeLimited,
                time_restriction: Some(weekday_daytime()),
                requirements: vec![ExtraRequirement::SafetyTraining],
            },
        )
        .with_rule(AccessLevel::Staff, RoleRequirement::full())
        .with_hours(OperatingHours::uniform(
            DayOfWeek::ALL,
            ClockTime::new(8, 0).unwrap(),
            ClockTime::new(22, 0).unwrap(),
        ))
        .with_capacity(2)
}

/// Mon-Fri 08:00-20:00
pub fn weekday_daytime() -> TimeRestriction {
    TimeRestriction::new(
        ClockTime::new(8, 0).unwrap(),
        ClockTime::new(20, 0).unwrap(),
        DayOfWeek::WORKDAYS,
    )
}

/// Directory with student `s-1`, staff `st-1` and admin `admin-1`
pub fn campus_directory() -> StaticIdentityDirectory {
    StaticIdentityDirectory::with_subjects([
        profile("s-1", AccessLevel::Student),
        profile("st-1", AccessLevel::Staff),
        profile("admin-1", AccessLevel::Admin),
    ])
}
