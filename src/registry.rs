//! ==============================================================================
//! registry.rs - static controller registry
//! ==============================================================================
//!
//! purpose:
//!     the ordered, immutable mapping group -> (display name -> identifier).
//!     built once from config at start-up and shared behind an Arc.
//!     a malformed registry is a start-up failure, never a partial one.
//!
//! ==============================================================================

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::config::GroupConfig;
use crate::domain::{DashboardSnapshot, GroupSnapshot};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Controller {
    pub name: String,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub name: String,
    pub controllers: Vec<Controller>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    groups: Vec<Group>,
}

impl Registry {
    pub fn from_groups(groups: Vec<GroupConfig>) -> Result<Self, ConfigError> {
        let mut seen_groups = HashSet::new();
        let mut out = Vec::with_capacity(groups.len());

        for group in groups {
            if group.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    name: "groups.name",
                    reason: "group name must not be empty".into(),
                });
            }
            if !seen_groups.insert(group.name.clone()) {
                return Err(ConfigError::DuplicateGroup(group.name));
            }

            let mut seen_names = HashSet::new();
            let mut controllers = Vec::with_capacity(group.controllers.len());
            for controller in group.controllers {
                if controller.name.trim().is_empty() || controller.mac.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        name: "groups.controllers",
                        reason: format!("controller in {} needs a name and a mac", group.name),
                    });
                }
                if !seen_names.insert(controller.name.clone()) {
                    return Err(ConfigError::DuplicateController {
                        group: group.name,
                        controller: controller.name,
                    });
                }
                controllers.push(Controller { name: controller.name, mac: controller.mac });
            }

            out.push(Group { name: group.name, controllers });
        }

        Ok(Self { groups: out })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    /// Number of controllers across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.controllers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Group selector: every group, or one group by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupFilter {
    #[default]
    All,
    Group(String),
}

impl GroupFilter {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "all" => GroupFilter::All,
            name => GroupFilter::Group(name.to_string()),
        }
    }

    pub fn matches(&self, group_name: &str) -> bool {
        match self {
            GroupFilter::All => true,
            GroupFilter::Group(name) => name == group_name,
        }
    }

    /// Groups of `snapshot` selected by this filter, in snapshot (registry) order.
    pub fn apply<'a>(&self, snapshot: &'a DashboardSnapshot) -> Vec<&'a GroupSnapshot> {
        snapshot.groups.iter().filter(|g| self.matches(&g.name)).collect()
    }
}

impl fmt::Display for GroupFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupFilter::All => f.write_str("all"),
            GroupFilter::Group(name) => f.write_str(name),
        }
    }
}

/// `flower_room` -> `Flower Room`, `veg-room` -> `Veg-Room`.
/// every `_` becomes a space (runs are kept), then each ascii
/// letter/digit that starts a word is uppercased.
pub fn display_label(group_name: &str) -> String {
    let mut label = String::with_capacity(group_name.len());
    let mut in_word = false;

    for c in group_name.chars() {
        let c = if c == '_' { ' ' } else { c };
        let word_char = c.is_ascii_alphanumeric();
        if word_char && !in_word {
            label.push(c.to_ascii_uppercase());
        } else {
            label.push(c);
        }
        in_word = word_char;
    }

    label
}
