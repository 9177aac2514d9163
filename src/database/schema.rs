// Table catalogue used by backup, restore and the integrity checker.

/// Data tables in foreign-key dependency order (parents first).
///
/// Sessions, the migration ledger and the backup registry are not
/// practice data and are never dumped or restored.
pub const DATA_TABLES: &[&str] = &[
    "roles",
    "permissions",
    "role_permissions",
    "users",
    "owners",
    "patients",
    "appointments",
    "treatments",
    "invoices",
    "invoice_items",
    "notes",
    "documents",
    "settings",
    "activity_log",
    "cron_jobs",
    "cron_logs",
    "email_templates",
    "modules",
];

pub fn is_data_table(name: &str) -> bool {
    DATA_TABLES.contains(&name)
}
