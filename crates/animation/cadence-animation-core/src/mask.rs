//! Name-based filter deciding which targets of a group play.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaskMode {
    /// Only the listed targets play.
    #[default]
    Include,
    /// Every target except the listed ones plays.
    Exclude,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationGroupMask {
    names: HashSet<String>,
    pub mode: MaskMode,
    /// A disabled mask retains every target.
    #[serde(default)]
    pub disabled: bool,
}

impl AnimationGroupMask {
    pub fn new<I, S>(names: I, mode: MaskMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            mode,
            disabled: false,
        }
    }

    pub fn add_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    pub fn remove_names<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.names.remove(name);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn retains_target(&self, name: &str) -> bool {
        if self.disabled {
            return true;
        }
        let listed = self.names.contains(name);
        match self.mode {
            MaskMode::Include => listed,
            MaskMode::Exclude => !listed,
        }
    }
}
