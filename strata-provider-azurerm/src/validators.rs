//! Validators for Azure-specific attribute values
//!
//! Each validator checks a plain string. The `*_type()` functions wrap them
//! as schema types so resources can declare them directly.

use regex::Regex;
use strata_core::resource::Value;
use strata_core::schema::AttributeType;

const ISO8601_DURATION: &str =
    r"^P([0-9]+Y)?([0-9]+M)?([0-9]+W)?([0-9]+D)?(T([0-9]+H)?([0-9]+M)?([0-9]+(\.?[0-9]+)?S)?)?$";

const COLLATION: &str = r"^[A-Za-z0-9_. ]+$";

const RESOURCE_GROUP_NAME: &str = r"^[-\w\._\(\)]+$";

/// Time zones accepted by virtual machines; the empty string means "unset"
pub const VM_TIME_ZONES: &[&str] = &[
    "",
    "Afghanistan Standard Time",
    "Alaskan Standard Time",
    "Arab Standard Time",
    "Arabian Standard Time",
    "Arabic Standard Time",
    "Argentina Standard Time",
    "Atlantic Standard Time",
    "AUS Central Standard Time",
    "AUS Eastern Standard Time",
    "Azerbaijan Standard Time",
    "Azores Standard Time",
    "Bahia Standard Time",
    "Bangladesh Standard Time",
    "Belarus Standard Time",
    "Canada Central Standard Time",
    "Cape Verde Standard Time",
    "Caucasus Standard Time",
    "Cen. Australia Standard Time",
    "Central America Standard Time",
    "Central Asia Standard Time",
    "Central Brazilian Standard Time",
    "Central Europe Standard Time",
    "Central European Standard Time",
    "Central Pacific Standard Time",
    "Central Standard Time (Mexico)",
    "Central Standard Time",
    "China Standard Time",
    "Dateline Standard Time",
    "E. Africa Standard Time",
    "E. Australia Standard Time",
    "E. Europe Standard Time",
    "E. South America Standard Time",
    "Eastern Standard Time (Mexico)",
    "Eastern Standard Time",
    "Egypt Standard Time",
    "Ekaterinburg Standard Time",
    "Fiji Standard Time",
    "FLE Standard Time",
    "Georgian Standard Time",
    "GMT Standard Time",
    "Greenland Standard Time",
    "Greenwich Standard Time",
    "GTB Standard Time",
    "Hawaiian Standard Time",
    "India Standard Time",
    "Iran Standard Time",
    "Israel Standard Time",
    "Jordan Standard Time",
    "Kaliningrad Standard Time",
    "Korea Standard Time",
    "Libya Standard Time",
    "Line Islands Standard Time",
    "Magadan Standard Time",
    "Mauritius Standard Time",
    "Middle East Standard Time",
    "Montevideo Standard Time",
    "Morocco Standard Time",
    "Mountain Standard Time (Mexico)",
    "Mountain Standard Time",
    "Myanmar Standard Time",
    "N. Central Asia Standard Time",
    "Namibia Standard Time",
    "Nepal Standard Time",
    "New Zealand Standard Time",
    "Newfoundland Standard Time",
    "North Asia East Standard Time",
    "North Asia Standard Time",
    "Pacific SA Standard Time",
    "Pacific Standard Time (Mexico)",
    "Pacific Standard Time",
    "Pakistan Standard Time",
    "Paraguay Standard Time",
    "Romance Standard Time",
    "Russia Time Zone 10",
    "Russia Time Zone 11",
    "Russia Time Zone 3",
    "Russian Standard Time",
    "SA Eastern Standard Time",
    "SA Pacific Standard Time",
    "SA Western Standard Time",
    "Samoa Standard Time",
    "SE Asia Standard Time",
    "Singapore Standard Time",
    "South Africa Standard Time",
    "Sri Lanka Standard Time",
    "Syria Standard Time",
    "Taipei Standard Time",
    "Tasmania Standard Time",
    "Tokyo Standard Time",
    "Tonga Standard Time",
    "Turkey Standard Time",
    "Ulaanbaatar Standard Time",
    "US Eastern Standard Time",
    "US Mountain Standard Time",
    "UTC",
    "UTC+12",
    "UTC-02",
    "UTC-11",
    "Venezuela Standard Time",
    "Vladivostok Standard Time",
    "W. Australia Standard Time",
    "W. Central Africa Standard Time",
    "W. Europe Standard Time",
    "West Asia Standard Time",
    "West Pacific Standard Time",
    "Yakutsk Standard Time",
];

fn matches(pattern: &str, value: &str) -> Result<bool, String> {
    Regex::new(pattern)
        .map(|re| re.is_match(value))
        .map_err(|e| format!("invalid pattern {:?}: {}", pattern, e))
}

pub fn validate_rfc3339_date(value: &str) -> Result<(), String> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|e| format!("{:?} is an invalid RFC3339 date: {}", value, e))
}

pub fn validate_uuid(value: &str) -> Result<(), String> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|e| format!("{:?} is an invalid UUID: {}", value, e))
}

pub fn validate_iso8601_duration(value: &str) -> Result<(), String> {
    if matches(ISO8601_DURATION, value)? {
        Ok(())
    } else {
        Err(format!(
            "expected value to be in ISO 8601 duration format, got {}",
            value
        ))
    }
}

pub fn validate_vm_time_zone(value: &str) -> Result<(), String> {
    if VM_TIME_ZONES.iter().any(|tz| tz.eq_ignore_ascii_case(value)) {
        Ok(())
    } else {
        Err(format!("{:?} is not a supported virtual machine time zone", value))
    }
}

pub fn validate_collation(value: &str) -> Result<(), String> {
    if matches(COLLATION, value)? {
        Ok(())
    } else {
        Err(format!(
            "collation contains invalid characters, only underscores are supported, got {}",
            value
        ))
    }
}

pub fn validate_file_path(value: &str) -> Result<(), String> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(format!("{:?} must start with `/`", value))
    }
}

pub fn validate_resource_group_name(value: &str) -> Result<(), String> {
    if value.len() > 90 {
        return Err("resource group name must be no longer than 90 characters".to_string());
    }
    if !matches(RESOURCE_GROUP_NAME, value)? {
        return Err(
            "resource group name may only contain alphanumeric characters, dash, underscores, \
             parentheses and periods"
                .to_string(),
        );
    }
    if value.ends_with('.') {
        return Err("resource group name cannot end with a period".to_string());
    }
    Ok(())
}

fn string_of(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "Expected string".to_string())
}

pub fn rfc3339_date_type() -> AttributeType {
    AttributeType::Custom {
        name: "Rfc3339Date".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| validate_rfc3339_date(string_of(value)?),
    }
}

pub fn uuid_type() -> AttributeType {
    AttributeType::Custom {
        name: "Uuid".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| validate_uuid(string_of(value)?),
    }
}

pub fn iso8601_duration_type() -> AttributeType {
    AttributeType::Custom {
        name: "Iso8601Duration".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| validate_iso8601_duration(string_of(value)?),
    }
}

pub fn vm_time_zone_type() -> AttributeType {
    AttributeType::Custom {
        name: "TimeZone".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| validate_vm_time_zone(string_of(value)?),
    }
}

pub fn collation_type() -> AttributeType {
    AttributeType::Custom {
        name: "Collation".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| validate_collation(string_of(value)?),
    }
}

pub fn file_path_type() -> AttributeType {
    AttributeType::Custom {
        name: "FilePath".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| validate_file_path(string_of(value)?),
    }
}

pub fn resource_group_name_type() -> AttributeType {
    AttributeType::Custom {
        name: "ResourceGroupName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| validate_resource_group_name(string_of(value)?),
    }
}
