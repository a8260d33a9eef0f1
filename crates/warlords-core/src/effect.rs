//! Effects: data-only descriptions of world mutations.
//!
//! A resolver never writes to an entity other than its own acting general.
//! Everything else is expressed as a patch addressed by the target's id and
//! applied by the caller in one pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use warlords_protocol::{CityId, GeneralId, NationId, TroopId};

use crate::entities::{City, Diplomacy, DiplomacyState, General, Nation, Troop};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    GeneralPatch { id: GeneralId, patch: GeneralPatch },
    CityPatch { id: CityId, patch: CityPatch },
    NationPatch { id: NationId, patch: NationPatch },
    DiplomacyPatch {
        src: NationId,
        dest: NationId,
        patch: DiplomacyPatch,
    },
    Log(LogEntry),
}

impl Effect {
    pub fn general(id: GeneralId, patch: GeneralPatch) -> Self {
        Self::GeneralPatch { id, patch }
    }

    pub fn city(id: CityId, patch: CityPatch) -> Self {
        Self::CityPatch { id, patch }
    }

    pub fn nation(id: NationId, patch: NationPatch) -> Self {
        Self::NationPatch { id, patch }
    }

    pub fn diplomacy(src: NationId, dest: NationId, patch: DiplomacyPatch) -> Self {
        Self::DiplomacyPatch { src, dest, patch }
    }

    pub fn log(entry: LogEntry) -> Self {
        Self::Log(entry)
    }

    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log(_))
    }
}

/// Merge `updates` into `meta`; a `null` value removes the key.
fn merge_meta(meta: &mut BTreeMap<String, Value>, updates: &BTreeMap<String, Value>) {
    for (key, value) in updates {
        if value.is_null() {
            meta.remove(key);
        } else {
            meta.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralPatch {
    pub nation_id: Option<NationId>,
    pub city_id: Option<CityId>,
    /// `Some(None)` clears the troop
    pub troop_id: Option<Option<TroopId>>,
    pub officer_level: Option<u8>,
    pub experience: Option<i64>,
    pub dedication: Option<i64>,
    pub gold: Option<i64>,
    pub rice: Option<i64>,
    pub crew: Option<i64>,
    pub train: Option<i32>,
    pub atmos: Option<i32>,
    pub meta: BTreeMap<String, Value>,
}

impl GeneralPatch {
    pub fn apply(&self, general: &mut General) {
        if let Some(value) = self.nation_id {
            general.nation_id = value;
        }
        if let Some(value) = self.city_id {
            general.city_id = value;
        }
        if let Some(value) = self.troop_id {
            general.troop_id = value;
        }
        if let Some(value) = self.officer_level {
            general.officer_level = value;
        }
        if let Some(value) = self.experience {
            general.experience = value;
        }
        if let Some(value) = self.dedication {
            general.dedication = value;
        }
        if let Some(value) = self.gold {
            general.gold = value;
        }
        if let Some(value) = self.rice {
            general.rice = value;
        }
        if let Some(value) = self.crew {
            general.crew = value;
        }
        if let Some(value) = self.train {
            general.train = value;
        }
        if let Some(value) = self.atmos {
            general.atmos = value;
        }
        merge_meta(&mut general.meta, &self.meta);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CityPatch {
    pub nation_id: Option<NationId>,
    pub pop: Option<i64>,
    pub agri: Option<i64>,
    pub comm: Option<i64>,
    pub secu: Option<i64>,
    pub def: Option<i64>,
    pub wall: Option<i64>,
    pub trust: Option<i32>,
    pub supply: Option<bool>,
    pub meta: BTreeMap<String, Value>,
}

impl CityPatch {
    pub fn apply(&self, city: &mut City) {
        if let Some(value) = self.nation_id {
            city.nation_id = value;
        }
        if let Some(value) = self.pop {
            city.pop = value.min(city.pop_max);
        }
        if let Some(value) = self.agri {
            city.agri = value.min(city.agri_max);
        }
        if let Some(value) = self.comm {
            city.comm = value.min(city.comm_max);
        }
        if let Some(value) = self.secu {
            city.secu = value.min(city.secu_max);
        }
        if let Some(value) = self.def {
            city.def = value.min(city.def_max);
        }
        if let Some(value) = self.wall {
            city.wall = value.min(city.wall_max);
        }
        if let Some(value) = self.trust {
            city.trust = value.clamp(0, 100);
        }
        if let Some(value) = self.supply {
            city.supply = value;
        }
        merge_meta(&mut city.meta, &self.meta);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NationPatch {
    pub capital_city_id: Option<Option<CityId>>,
    pub gold: Option<i64>,
    pub rice: Option<i64>,
    pub tech: Option<i64>,
    pub level: Option<u8>,
    pub meta: BTreeMap<String, Value>,
}

impl NationPatch {
    pub fn apply(&self, nation: &mut Nation) {
        if let Some(value) = self.capital_city_id {
            nation.capital_city_id = value;
        }
        if let Some(value) = self.gold {
            nation.gold = value;
        }
        if let Some(value) = self.rice {
            nation.rice = value;
        }
        if let Some(value) = self.tech {
            nation.tech = value;
        }
        if let Some(value) = self.level {
            nation.level = value;
        }
        merge_meta(&mut nation.meta, &self.meta);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiplomacyPatch {
    pub state: Option<DiplomacyState>,
    pub term: Option<u32>,
    pub meta: BTreeMap<String, Value>,
}

impl DiplomacyPatch {
    pub fn apply(&self, diplomacy: &mut Diplomacy) {
        if let Some(value) = self.state {
            diplomacy.state = value;
        }
        if let Some(value) = self.term {
            diplomacy.term = value;
        }
        merge_meta(&mut diplomacy.meta, &self.meta);
    }
}

/// Entities brought into existence by a resolution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NewEntity {
    Nation(Nation),
    City(City),
    Diplomacy(Diplomacy),
    Troop(Troop),
}

/// Whose log a message lands in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogScope {
    General,
    Nation,
    Global,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogCategory {
    Action,
    Battle,
    Diplomacy,
    History,
}

/// Date prefix applied when the entry is rendered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogFormat {
    #[default]
    Plain,
    Month,
    YearMonth,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub scope: LogScope,
    pub category: LogCategory,
    #[serde(default)]
    pub format: LogFormat,
    pub text: String,
    /// General or nation id the entry is addressed to, depending on scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u32>,
}

impl LogEntry {
    pub fn new(scope: LogScope, category: LogCategory, text: impl Into<String>) -> Self {
        Self {
            scope,
            category,
            format: LogFormat::default(),
            text: text.into(),
            target_id: None,
        }
    }

    pub fn general_action(general: GeneralId, text: impl Into<String>) -> Self {
        Self::new(LogScope::General, LogCategory::Action, text)
            .with_format(LogFormat::Month)
            .with_target(general.0)
    }

    pub fn nation_history(nation: NationId, text: impl Into<String>) -> Self {
        Self::new(LogScope::Nation, LogCategory::History, text)
            .with_format(LogFormat::YearMonth)
            .with_target(nation.0)
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_target(mut self, target_id: u32) -> Self {
        self.target_id = Some(target_id);
        self
    }

    pub fn render(&self, year: i32, month: u8) -> String {
        match self.format {
            LogFormat::Plain => self.text.clone(),
            LogFormat::Month => format!("<{month:02}> {}", self.text),
            LogFormat::YearMonth => format!("<{year}-{month:02}> {}", self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn general_patch_touches_only_named_fields() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut general = General::new(GeneralId(1), "Cao Cao", NationId(1), CityId(1), at);
        general.meta.insert("stale".into(), Value::from(3));

        let mut patch = GeneralPatch {
            gold: Some(42),
            troop_id: Some(None),
            ..Default::default()
        };
        patch.meta.insert("stale".into(), Value::Null);
        patch.meta.insert("fresh".into(), Value::from("yes"));
        patch.apply(&mut general);

        assert_eq!(general.gold, 42);
        assert_eq!(general.rice, 1_000);
        assert_eq!(general.troop_id, None);
        assert!(!general.meta.contains_key("stale"));
        assert_eq!(general.meta["fresh"], "yes");
    }

    #[test]
    fn city_patch_respects_caps() {
        let mut city = City::new(CityId(1), "Xuchang", NationId(1));
        CityPatch {
            agri: Some(99_999),
            trust: Some(130),
            ..Default::default()
        }
        .apply(&mut city);
        assert_eq!(city.agri, city.agri_max);
        assert_eq!(city.trust, 100);
    }

    #[test]
    fn log_rendering_prefixes_date() {
        let entry = LogEntry::general_action(GeneralId(3), "Trained troops");
        assert_eq!(entry.render(184, 3), "<03> Trained troops");

        let entry = LogEntry::nation_history(NationId(2), "Declared war");
        assert_eq!(entry.render(184, 11), "<184-11> Declared war");
        assert_eq!(entry.target_id, Some(2));
    }
}
