use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{AdapterKind, UnitId};

pub const NO_REWARD_LABEL: &str = "";
pub const NO_REWARD_AMOUNT: i64 = 0;

/// Reward terms either advertised by the backend or reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    successful: bool,
    label: String,
    amount: i64,
}

impl Reward {
    pub fn success(label: impl Into<String>, amount: i64) -> Self {
        Self {
            successful: true,
            label: label.into(),
            amount,
        }
    }

    pub fn failure() -> Self {
        Self {
            successful: false,
            label: NO_REWARD_LABEL.to_string(),
            amount: NO_REWARD_AMOUNT,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Parses backend currency terms. The amount arrives as a decimal string;
    /// missing or unparsable terms yield `None`.
    pub fn from_terms(name: Option<&str>, amount: Option<&str>) -> Option<Self> {
        let name = name?;
        let amount = amount?.trim().parse::<i64>().ok()?;
        Some(Self::success(name, amount))
    }
}

/// Picks the reward to pay out for a completion.
///
/// An unsuccessful report always wins so a network's explicit failure is never
/// overridden. Otherwise the terms captured when playback began are preferred,
/// because some adapters report generic terms on completion.
pub fn choose_reward(last_shown: Option<&Reward>, reported: &Reward) -> Reward {
    if !reported.is_successful() {
        return reported.clone();
    }
    last_shown.cloned().unwrap_or_else(|| reported.clone())
}

/// Per-unit reward terms, completion URLs and the last-shown snapshot per kind.
#[derive(Debug, Default)]
pub struct RewardBook {
    unit_rewards: HashMap<UnitId, Reward>,
    completion_urls: HashMap<UnitId, String>,
    last_shown: HashMap<AdapterKind, Reward>,
}

impl RewardBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_unit_terms(&mut self, unit: &str, name: Option<&str>, amount: Option<&str>) {
        match Reward::from_terms(name, amount) {
            Some(reward) => {
                self.unit_rewards.insert(unit.to_string(), reward);
            }
            None => {
                self.unit_rewards.remove(unit);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn unit_reward(&self, unit: &str) -> Option<&Reward> {
        self.unit_rewards.get(unit)
    }

    pub fn update_completion_url(&mut self, unit: &str, url: Option<&str>) {
        match url.filter(|u| !u.is_empty()) {
            Some(url) => {
                self.completion_urls.insert(unit.to_string(), url.to_string());
            }
            None => {
                self.completion_urls.remove(unit);
            }
        }
    }

    pub fn completion_url(&self, unit: &str) -> Option<&str> {
        self.completion_urls.get(unit).map(String::as_str)
    }

    /// Records the unit's current terms as the last shown reward for `kind`.
    /// A unit without terms clears the snapshot.
    pub fn capture_last_shown(&mut self, kind: &AdapterKind, unit: &str) {
        match self.unit_rewards.get(unit).cloned() {
            Some(reward) => {
                self.last_shown.insert(kind.clone(), reward);
            }
            None => {
                self.last_shown.remove(kind);
            }
        }
    }

    pub fn last_shown(&self, kind: &AdapterKind) -> Option<&Reward> {
        self.last_shown.get(kind)
    }
}
