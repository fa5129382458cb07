//! Resource type configurations for Azure Resource Manager
//!
//! This module defines:
//! - Resource type definitions (implementing ResourceType trait)
//! - Mapping between resource types and their ARM namespace, type segment
//!   and API version

use strata_core::provider::ResourceType;
use strata_core::schema::ResourceSchema;

use crate::schemas;

// =============================================================================
// Resource Type Definitions
// =============================================================================

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        define_resource_type!($name, $type_name, $schema, false);
    };
    ($name:ident, $type_name:expr, $schema:path, $data_source:expr) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
            fn is_data_source(&self) -> bool {
                $data_source
            }
        }
    };
}

pub const DDOS_PROTECTION_PLAN: &str = "azurerm_ddos_protection_plan";
pub const AUTOMATION_ACCOUNT: &str = "azurerm_automation_account";
pub const MANAGED_DISK: &str = "azurerm_managed_disk";
pub const VIRTUAL_NETWORK: &str = "azurerm_virtual_network";

define_resource_type!(
    DdosProtectionPlanType,
    DDOS_PROTECTION_PLAN,
    schemas::ddos_protection_plan::schema
);
define_resource_type!(
    AutomationAccountType,
    AUTOMATION_ACCOUNT,
    schemas::automation_account::schema
);
define_resource_type!(
    ManagedDiskDataSource,
    MANAGED_DISK,
    schemas::managed_disk::data_source_schema,
    true
);

/// Returns all resource types and data sources supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(DdosProtectionPlanType),
        Box::new(AutomationAccountType),
        Box::new(ManagedDiskDataSource),
    ]
}

// =============================================================================
// Resource Configuration
// =============================================================================

/// Resource type configuration
pub struct ResourceConfig {
    /// Resource provider namespace (e.g., "Microsoft.Network")
    pub namespace: &'static str,
    /// Type segment in the resource ID (e.g., "ddosProtectionPlans")
    pub type_segment: &'static str,
    pub api_version: &'static str,
    /// Display name used in log lines and errors
    pub display_name: &'static str,
}

impl ResourceConfig {
    /// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`
    pub fn resource_id(&self, subscription_id: &str, resource_group: &str, name: &str) -> String {
        crate::resource_id::resource_group_scoped_id(
            subscription_id,
            resource_group,
            self.namespace,
            self.type_segment,
            name,
        )
    }
}

pub const DDOS_PROTECTION_PLAN_CONFIG: ResourceConfig = ResourceConfig {
    namespace: "Microsoft.Network",
    type_segment: "ddosProtectionPlans",
    api_version: "2018-12-01",
    display_name: "DDoS Protection Plan",
};

pub const AUTOMATION_ACCOUNT_CONFIG: ResourceConfig = ResourceConfig {
    namespace: "Microsoft.Automation",
    type_segment: "automationAccounts",
    api_version: "2015-10-31",
    display_name: "Automation Account",
};

pub const MANAGED_DISK_CONFIG: ResourceConfig = ResourceConfig {
    namespace: "Microsoft.Compute",
    type_segment: "disks",
    api_version: "2018-06-01",
    display_name: "Managed Disk",
};

pub const VIRTUAL_NETWORK_CONFIG: ResourceConfig = ResourceConfig {
    namespace: "Microsoft.Network",
    type_segment: "virtualNetworks",
    api_version: "2018-12-01",
    display_name: "Virtual Network",
};

// =============================================================================
// Config Lookup
// =============================================================================

pub fn get_resource_config(resource_type: &str) -> Option<&'static ResourceConfig> {
    match resource_type {
        DDOS_PROTECTION_PLAN => Some(&DDOS_PROTECTION_PLAN_CONFIG),
        AUTOMATION_ACCOUNT => Some(&AUTOMATION_ACCOUNT_CONFIG),
        MANAGED_DISK => Some(&MANAGED_DISK_CONFIG),
        VIRTUAL_NETWORK => Some(&VIRTUAL_NETWORK_CONFIG),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_resource_config() {
        assert!(get_resource_config(DDOS_PROTECTION_PLAN).is_some());
        assert!(get_resource_config(MANAGED_DISK).is_some());
        assert!(get_resource_config("azurerm_unknown").is_none());
    }

    #[test]
    fn test_resource_id() {
        assert_eq!(
            AUTOMATION_ACCOUNT_CONFIG.resource_id("sub", "rg", "acct"),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Automation/automationAccounts/acct"
        );
    }

    #[test]
    fn test_only_managed_disk_is_a_data_source() {
        let data_sources: Vec<&str> = resource_types()
            .iter()
            .filter(|t| t.is_data_source())
            .map(|t| t.name())
            .collect();
        assert_eq!(data_sources, vec![MANAGED_DISK]);
    }
}
