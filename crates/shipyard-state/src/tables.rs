//! redb table definitions for the Shipyard state store.
//!
//! Record tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). The router names table stores plain strings.

use redb::TableDefinition;

/// Application records keyed by app name.
pub const APPS: TableDefinition<&str, &[u8]> = TableDefinition::new("apps");

/// Service instances keyed by instance name.
pub const SERVICE_INSTANCES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("service_instances");

/// Application name → routing backend name.
pub const ROUTER_NAMES: TableDefinition<&str, &str> = TableDefinition::new("router_names");
