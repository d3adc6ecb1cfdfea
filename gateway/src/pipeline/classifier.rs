//! Vendor classifier
//!
//! Reads the `deviceVendor` field of a raw record and resolves it against the
//! vendor registry. Records without a tag, or with a tag the registry does
//! not know, are misses: the caller drops them, they are never errors.

use crate::record::{DEVICE_VENDOR, RawRecord};
use crate::registry::{VendorEntry, VendorRegistry};
use serde_json::Value;

/// Why a record could not be classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationMiss {
    /// No `deviceVendor` field, or not a non-empty string
    MissingVendor,
    /// Tag not declared in the registry
    UnknownVendor(String),
}

impl ClassificationMiss {
    /// Label used for drop metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ClassificationMiss::MissingVendor => "missing_vendor",
            ClassificationMiss::UnknownVendor(_) => "unknown_vendor",
        }
    }
}

/// Classifies records by vendor using a registry
#[derive(Debug, Clone, Copy)]
pub struct VendorClassifier<'a> {
    registry: &'a VendorRegistry,
}

impl<'a> VendorClassifier<'a> {
    pub fn new(registry: &'a VendorRegistry) -> Self {
        Self { registry }
    }

    /// Registry entry for the record's vendor, if recognized
    pub fn classify(&self, record: &RawRecord) -> Option<&'a VendorEntry> {
        self.resolve(record).ok()
    }

    /// Like [`classify`](Self::classify), but says why a record missed
    pub fn resolve(&self, record: &RawRecord) -> Result<&'a VendorEntry, ClassificationMiss> {
        let tag = match record.get(DEVICE_VENDOR) {
            Some(Value::String(tag)) if !tag.is_empty() => tag,
            _ => return Err(ClassificationMiss::MissingVendor),
        };
        self.registry
            .get(tag)
            .ok_or_else(|| ClassificationMiss::UnknownVendor(tag.clone()))
    }
}
