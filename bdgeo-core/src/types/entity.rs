//! Entities of the administrative hierarchy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Common accessors over the four entity levels.
pub trait Named {
    /// Stable identifier, unique within the level.
    fn id(&self) -> &str;
    /// English name.
    fn name(&self) -> &str;
    /// Bangla name.
    fn local_name(&self) -> &str;
    /// Identifier of the parent entity, if the level has one.
    fn parent_id(&self) -> Option<&str>;
}

/// A division, the top level of the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division {
    /// Division id
    pub id: String,
    /// English name
    pub name: String,
    /// Bangla name
    #[serde(rename = "bn_name")]
    pub local_name: String,
    /// Official website
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Division {
    /// Creates a division without a website.
    pub fn new(id: impl Into<String>, name: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            local_name: local_name.into(),
            url: None,
        }
    }
}

/// A district (zila), child of a division.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    /// District id
    pub id: String,
    /// Parent division id
    pub division_id: String,
    /// English name
    pub name: String,
    /// Bangla name
    #[serde(rename = "bn_name")]
    pub local_name: String,
    /// Latitude, as published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    /// Longitude, as published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    /// Official website
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl District {
    /// Creates a district without coordinates or website.
    pub fn new(
        id: impl Into<String>,
        division_id: impl Into<String>,
        name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            division_id: division_id.into(),
            name: name.into(),
            local_name: local_name.into(),
            lat: None,
            lon: None,
            url: None,
        }
    }

    /// Sets the coordinates.
    pub fn with_coords(mut self, lat: impl Into<String>, lon: impl Into<String>) -> Self {
        self.lat = Some(lat.into());
        self.lon = Some(lon.into());
        self
    }
}

/// An upazila (sub-district), child of a district.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upazila {
    /// Upazila id
    pub id: String,
    /// Parent district id
    pub district_id: String,
    /// English name
    pub name: String,
    /// Bangla name
    #[serde(rename = "bn_name")]
    pub local_name: String,
    /// Official website
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Upazila {
    /// Creates an upazila without a website.
    pub fn new(
        id: impl Into<String>,
        district_id: impl Into<String>,
        name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            district_id: district_id.into(),
            name: name.into(),
            local_name: local_name.into(),
            url: None,
        }
    }
}

/// A union parishad, the lowest level of the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Union {
    /// Union id
    pub id: String,
    /// Parent upazila id
    pub upazila_id: String,
    /// English name
    pub name: String,
    /// Bangla name
    #[serde(rename = "bn_name")]
    pub local_name: String,
    /// Official website
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Union {
    /// Creates a union without a website.
    pub fn new(
        id: impl Into<String>,
        upazila_id: impl Into<String>,
        name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            upazila_id: upazila_id.into(),
            name: name.into(),
            local_name: local_name.into(),
            url: None,
        }
    }
}

macro_rules! impl_named {
    ($ty:ty, root) => {
        impl Named for $ty {
            fn id(&self) -> &str { &self.id }
            fn name(&self) -> &str { &self.name }
            fn local_name(&self) -> &str { &self.local_name }
            fn parent_id(&self) -> Option<&str> { None }
        }
    };
    ($ty:ty, $parent:ident) => {
        impl Named for $ty {
            fn id(&self) -> &str { &self.id }
            fn name(&self) -> &str { &self.name }
            fn local_name(&self) -> &str { &self.local_name }
            fn parent_id(&self) -> Option<&str> { Some(&self.$parent) }
        }
    };
}

impl_named!(Division, root);
impl_named!(District, division_id);
impl_named!(Upazila, district_id);
impl_named!(Union, upazila_id);

/// The four hierarchy levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Top level
    Division,
    /// Second level
    District,
    /// Third level
    Upazila,
    /// Lowest level
    Union,
}

impl EntityKind {
    /// Singular lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Division => "division",
            EntityKind::District => "district",
            EntityKind::Upazila => "upazila",
            EntityKind::Union => "union",
        }
    }

    /// Plural lowercase label, as used in routes and search results.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Division => "divisions",
            EntityKind::District => "districts",
            EntityKind::Upazila => "upazilas",
            EntityKind::Union => "unions",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Levels that have children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParentKind {
    /// Parent of districts
    Division,
    /// Parent of upazilas
    District,
    /// Parent of unions
    Upazila,
}

impl ParentKind {
    /// The parent's own level.
    pub fn kind(&self) -> EntityKind {
        match self {
            ParentKind::Division => EntityKind::Division,
            ParentKind::District => EntityKind::District,
            ParentKind::Upazila => EntityKind::Upazila,
        }
    }

    /// The level of its children.
    pub fn child_kind(&self) -> EntityKind {
        match self {
            ParentKind::Division => EntityKind::District,
            ParentKind::District => EntityKind::Upazila,
            ParentKind::Upazila => EntityKind::Union,
        }
    }
}
