//! Vendor registry
//!
//! Declarative table of recognized vendor tags. Each entry names the output
//! channel its records are bound to and the vendor-specific enrichment rules
//! (where the native asset id lives, which unbounded fields get stripped).
//! Adding a vendor is one entry here, not a new code path.
//!
//! The registry is built once at startup and shared read-only.

use crate::error::{GatewayError, Result};
use crate::record::{RawRecord, pointer_token};
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

/// One recognized vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorEntry {
    tag: String,
    channel: String,
    /// JSON pointer to the native asset id in pull-path payloads
    native_id_pointer: Option<String>,
    /// JSON pointers removed from every record of this vendor
    strip_pointers: Vec<String>,
}

impl VendorEntry {
    /// Entry bound to the conventional `output<CamelCaseTag>` channel
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            channel: channel_name_for(&tag),
            tag,
            native_id_pointer: None,
            strip_pointers: Vec::new(),
        }
    }

    /// Entry with the built-in profile for vendors the gateway knows about
    ///
    /// Unknown tags get a plain entry, which is all the push path needs.
    pub fn builtin(tag: impl Into<String>) -> Self {
        let entry = Self::new(tag);
        match entry.tag.as_str() {
            "mts_smart" => entry.native_id_at("/AssetID"),
            "vemcon" => entry
                .native_id_at("/tooltracker/ttid")
                .strip("/motion/history"),
            _ => entry,
        }
    }

    /// Bind to an explicit channel name
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Declare where pull-path payloads carry the native asset id
    pub fn native_id_at(mut self, pointer: impl Into<String>) -> Self {
        self.native_id_pointer = Some(pointer.into());
        self
    }

    /// Declare a field to strip before the record leaves the gateway
    pub fn strip(mut self, pointer: impl Into<String>) -> Self {
        self.strip_pointers.push(pointer.into());
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn channel_name(&self) -> &str {
        &self.channel
    }

    pub fn strip_pointers(&self) -> &[String] {
        &self.strip_pointers
    }

    /// Native asset id of a pull-path record
    ///
    /// Strings are used verbatim, numbers in their JSON rendering. Returns
    /// `None` if the vendor declares no id field or the record lacks it.
    pub fn native_asset_id(&self, record: &RawRecord) -> Option<String> {
        let pointer = self.native_id_pointer.as_deref()?;
        let value = lookup(record, pointer)?;
        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Conventional channel name for a vendor tag: `mts_smart` → `outputMtsSmart`
pub fn channel_name_for(tag: &str) -> String {
    let mut name = String::from("output");
    for segment in tag.split(['_', '-', ' ', '.']).filter(|s| !s.is_empty()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

fn lookup<'a>(record: &'a RawRecord, pointer: &str) -> Option<&'a Value> {
    let rest = pointer.strip_prefix('/')?;
    let (head, tail) = match rest.split_once('/') {
        Some((head, tail)) => (head, Some(tail)),
        None => (rest, None),
    };
    let value = record.get(pointer_token(head).as_ref())?;
    match tail {
        Some(tail) => value.pointer(&format!("/{tail}")),
        None => Some(value),
    }
}

/// Registry of recognized vendors, in declaration order
#[derive(Debug, Clone, Default)]
pub struct VendorRegistry {
    entries: Vec<VendorEntry>,
    by_tag: HashMap<String, usize>,
}

impl VendorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the vendors the gateway ships profiles for
    pub fn with_builtin_vendors() -> Self {
        let mut registry = Self::new();
        for tag in DEFAULT_VENDORS {
            registry.register(VendorEntry::builtin(*tag));
        }
        registry
    }

    /// Parse a registry declaration: comma-separated `tag` or `tag=channel`
    ///
    /// ```
    /// use telemetry_gateway::registry::VendorRegistry;
    ///
    /// let registry = VendorRegistry::parse("vemcon, mts_smart=assets").unwrap();
    /// assert_eq!(registry.get("vemcon").unwrap().channel_name(), "outputVemcon");
    /// assert_eq!(registry.get("mts_smart").unwrap().channel_name(), "assets");
    /// ```
    pub fn parse(declaration: &str) -> Result<Self> {
        let mut registry = Self::new();
        for item in declaration.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let entry = match item.split_once('=') {
                Some((tag, channel)) => {
                    let (tag, channel) = (tag.trim(), channel.trim());
                    if tag.is_empty() || channel.is_empty() {
                        return Err(GatewayError::Config(format!(
                            "invalid vendor declaration '{item}'"
                        )));
                    }
                    VendorEntry::builtin(tag).channel(channel)
                }
                None => VendorEntry::builtin(item),
            };
            registry.register(entry);
        }
        if registry.is_empty() {
            return Err(GatewayError::Config(
                "vendor registry declares no vendors".to_string(),
            ));
        }
        Ok(registry)
    }

    /// Register a vendor
    ///
    /// Re-registering a tag replaces its entry in place.
    pub fn register(&mut self, entry: VendorEntry) {
        info!(vendor = %entry.tag, channel = %entry.channel, "Registered vendor");
        match self.by_tag.get(&entry.tag) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.by_tag.insert(entry.tag.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Look up a vendor by tag
    pub fn get(&self, tag: &str) -> Option<&VendorEntry> {
        self.by_tag.get(tag).map(|&idx| &self.entries[idx])
    }

    /// Position of a vendor in declaration order
    pub fn position(&self, tag: &str) -> Option<usize> {
        self.by_tag.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vendors in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &VendorEntry> {
        self.entries.iter()
    }

    /// Distinct channel names, in declaration order
    pub fn channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !channels.contains(&entry.channel.as_str()) {
                channels.push(&entry.channel);
            }
        }
        channels
    }
}

/// Vendors enabled when no registry is configured
pub const DEFAULT_VENDORS: &[&str] = &["vemcon", "mts_smart", "exelonix", "test_vendor"];
