//! Known columns of the asset register export, their groups and presets.

use crate::columns::{ColumnGroup, Preset};

pub const ID_KEY: &str = "id";
pub const NAME_KEY: &str = "name";
pub const DEPARTMENT_KEY: &str = "departmentName";
pub const QUANTITY_KEY: &str = "quantity";

const ASSET_COLUMNS: &[(&str, &str)] = &[
    (ID_KEY, "Asset ID"),
    (NAME_KEY, "Asset name"),
    ("size", "Size / spec"),
    ("description", "Description"),
    (DEPARTMENT_KEY, "Department"),
    ("departmentId", "Department ID"),
    ("unit", "Unit"),
    (QUANTITY_KEY, "Quantity"),
    ("reserved", "Reserved"),
    ("availableQuantity", "Available"),
    ("lastChecked", "Last checked"),
    ("notes", "Notes"),
];

/// Display label of a known register column.
pub fn label_for(key: &str) -> Option<&'static str> {
    ASSET_COLUMNS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, label)| *label)
}

pub fn groups() -> Vec<ColumnGroup> {
    vec![
        ColumnGroup::new("identification", "Identification", &[ID_KEY, NAME_KEY, "size", "description"]),
        ColumnGroup::new("location", "Location", &[DEPARTMENT_KEY, "departmentId"]),
        ColumnGroup::new(
            "inventory",
            "Inventory",
            &["unit", QUANTITY_KEY, "reserved", "availableQuantity", "lastChecked"],
        ),
        ColumnGroup::new("remarks", "Remarks", &["notes", "description"]),
    ]
}

pub fn presets() -> Vec<Preset> {
    vec![
        Preset::all("All columns"),
        Preset::with_keys("Labels", &[NAME_KEY, DEPARTMENT_KEY, QUANTITY_KEY]),
        Preset::with_keys(
            "Inventory check",
            &[NAME_KEY, "size", "unit", QUANTITY_KEY, "reserved", "availableQuantity", "lastChecked"],
        ),
        Preset::with_keys("Compact", &[NAME_KEY, DEPARTMENT_KEY]),
    ]
}
