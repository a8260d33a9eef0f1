//! The single-writer world model.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warlords_protocol::{CityId, GeneralId, NationId, TroopId};

use crate::action::Resolution;
use crate::effect::{Effect, LogEntry, NewEntity};
use crate::entities::{City, Diplomacy, General, Nation, Troop};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("unknown general {0}")]
    UnknownGeneral(GeneralId),
    #[error("unknown city {0}")]
    UnknownCity(CityId),
    #[error("unknown nation {0}")]
    UnknownNation(NationId),
    #[error("unknown diplomacy {src} -> {dest}")]
    UnknownDiplomacy { src: NationId, dest: NationId },
    #[error("unknown troop {0}")]
    UnknownTroop(TroopId),
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("general {general} already belongs to troop {troop}")]
    AlreadyInTroop { general: GeneralId, troop: TroopId },
    #[error("general {general} and troop {troop} serve different nations")]
    TroopNationMismatch { general: GeneralId, troop: TroopId },
}

/// Read-only lookup capability handed to constraints, context builders and
/// resolvers.
pub trait WorldRef {
    fn get_general_by_id(&self, id: GeneralId) -> Option<&General>;
    fn get_city_by_id(&self, id: CityId) -> Option<&City>;
    fn get_nation_by_id(&self, id: NationId) -> Option<&Nation>;
    fn get_diplomacy(&self, src: NationId, dest: NationId) -> Option<&Diplomacy>;
    fn get_troop_by_id(&self, id: TroopId) -> Option<&Troop>;
    fn list_generals(&self) -> Vec<&General>;
    fn list_cities(&self) -> Vec<&City>;
    fn list_nations(&self) -> Vec<&Nation>;
    fn list_diplomacy(&self) -> Vec<&Diplomacy>;
}

/// Indexed entity collections, owned by the daemon.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WorldSnapshot", into = "WorldSnapshot")]
pub struct World {
    generals: BTreeMap<GeneralId, General>,
    cities: BTreeMap<CityId, City>,
    nations: BTreeMap<NationId, Nation>,
    diplomacy: BTreeMap<(NationId, NationId), Diplomacy>,
    troops: BTreeMap<TroopId, Troop>,
}

/// Serialized shape of a world: flat lists, friendlier to hand-edited fixtures
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct WorldSnapshot {
    generals: Vec<General>,
    cities: Vec<City>,
    nations: Vec<Nation>,
    diplomacy: Vec<Diplomacy>,
    troops: Vec<Troop>,
}

impl From<WorldSnapshot> for World {
    fn from(snapshot: WorldSnapshot) -> Self {
        let mut world = Self {
            generals: snapshot.generals.into_iter().map(|g| (g.id, g)).collect(),
            cities: snapshot.cities.into_iter().map(|c| (c.id, c)).collect(),
            nations: snapshot.nations.into_iter().map(|n| (n.id, n)).collect(),
            diplomacy: snapshot.diplomacy.into_iter().map(|d| (d.key(), d)).collect(),
            troops: snapshot.troops.into_iter().map(|t| (t.id, t)).collect(),
        };
        world.fill_neutral_relations();
        world
    }
}

impl From<World> for WorldSnapshot {
    fn from(world: World) -> Self {
        Self {
            generals: world.generals.into_values().collect(),
            cities: world.cities.into_values().collect(),
            nations: world.nations.into_values().collect(),
            diplomacy: world.diplomacy.into_values().collect(),
            troops: world.troops.into_values().collect(),
        }
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_general(&mut self, general: General) {
        self.generals.insert(general.id, general);
    }

    pub fn insert_city(&mut self, city: City) {
        self.cities.insert(city.id, city);
    }

    /// Insert a nation along with neutral relations towards every other nation.
    pub fn insert_nation(&mut self, nation: Nation) {
        let id = nation.id;
        let others: Vec<NationId> = self.nations.keys().copied().filter(|n| *n != id).collect();
        self.nations.insert(id, nation);
        for other in others {
            self.diplomacy
                .entry((id, other))
                .or_insert_with(|| Diplomacy::neutral(id, other));
            self.diplomacy
                .entry((other, id))
                .or_insert_with(|| Diplomacy::neutral(other, id));
        }
    }

    /// Every ordered pair of distinct nations gets a relation, neutral when missing.
    fn fill_neutral_relations(&mut self) {
        let ids: Vec<NationId> = self.nations.keys().copied().collect();
        for &src in &ids {
            for &dest in &ids {
                if src != dest {
                    self.diplomacy
                        .entry((src, dest))
                        .or_insert_with(|| Diplomacy::neutral(src, dest));
                }
            }
        }
    }

    pub fn insert_diplomacy(&mut self, diplomacy: Diplomacy) {
        self.diplomacy.insert(diplomacy.key(), diplomacy);
    }

    pub fn insert_troop(&mut self, troop: Troop) {
        self.troops.insert(troop.id, troop);
    }

    /// Found a troop led by `leader`; the troop id is the leader's id.
    pub fn create_troop(
        &mut self,
        leader: GeneralId,
        name: impl Into<String>,
    ) -> Result<TroopId, WorldError> {
        let troop_id = TroopId(leader.0);
        let general = self
            .generals
            .get_mut(&leader)
            .ok_or(WorldError::UnknownGeneral(leader))?;
        if let Some(current) = general.troop_id {
            return Err(WorldError::AlreadyInTroop {
                general: leader,
                troop: current,
            });
        }
        if self.troops.contains_key(&troop_id) {
            return Err(WorldError::DuplicateEntity(format!("troop {troop_id}")));
        }
        general.troop_id = Some(troop_id);
        self.troops.insert(
            troop_id,
            Troop {
                id: troop_id,
                nation_id: general.nation_id,
                name: name.into(),
            },
        );
        Ok(troop_id)
    }

    pub fn general_mut(&mut self, id: GeneralId) -> Option<&mut General> {
        self.generals.get_mut(&id)
    }

    pub fn generals(&self) -> impl Iterator<Item = &General> {
        self.generals.values()
    }

    /// Earliest scheduled turn of any general, `None` for an empty world.
    pub fn next_actor_turn_time(&self) -> Option<DateTime<Utc>> {
        self.generals.values().map(|g| g.turn_time).min()
    }

    /// `(turn_time, id)` of every general due strictly before `before`.
    pub fn due_generals(&self, before: DateTime<Utc>) -> BTreeSet<(DateTime<Utc>, GeneralId)> {
        self.generals
            .values()
            .filter(|g| g.turn_time < before)
            .map(|g| (g.turn_time, g.id))
            .collect()
    }

    /// Apply a resolution as one unit.
    ///
    /// Every target is validated before anything is written, so an error
    /// leaves the world untouched. Returns the log entries in emission order.
    pub fn commit(&mut self, resolution: Resolution) -> Result<Vec<LogEntry>, WorldError> {
        self.validate(&resolution)?;

        let Resolution {
            general,
            effects,
            mut logs,
            created,
        } = resolution;

        for entity in created {
            match entity {
                NewEntity::Nation(nation) => self.insert_nation(nation),
                NewEntity::City(city) => self.insert_city(city),
                NewEntity::Diplomacy(diplomacy) => self.insert_diplomacy(diplomacy),
                NewEntity::Troop(troop) => self.insert_troop(troop),
            }
        }

        self.generals.insert(general.id, general);

        // Targets were validated above; a miss here cannot happen.
        for effect in effects {
            match effect {
                Effect::GeneralPatch { id, patch } => {
                    if let Some(target) = self.generals.get_mut(&id) {
                        patch.apply(target);
                    }
                }
                Effect::CityPatch { id, patch } => {
                    if let Some(target) = self.cities.get_mut(&id) {
                        patch.apply(target);
                    }
                }
                Effect::NationPatch { id, patch } => {
                    if let Some(target) = self.nations.get_mut(&id) {
                        patch.apply(target);
                    }
                }
                Effect::DiplomacyPatch { src, dest, patch } => {
                    if let Some(target) = self.diplomacy.get_mut(&(src, dest)) {
                        patch.apply(target);
                    }
                }
                Effect::Log(entry) => logs.push(entry),
            }
        }

        Ok(logs)
    }

    fn validate(&self, resolution: &Resolution) -> Result<(), WorldError> {
        if !self.generals.contains_key(&resolution.general.id) {
            return Err(WorldError::UnknownGeneral(resolution.general.id));
        }

        let mut new_nations = BTreeSet::new();
        let mut new_cities = BTreeSet::new();
        let mut new_diplomacy = BTreeSet::new();
        let mut new_troops = BTreeSet::new();
        for entity in &resolution.created {
            let fresh = match entity {
                NewEntity::Nation(n) => {
                    !self.nations.contains_key(&n.id) && new_nations.insert(n.id)
                }
                NewEntity::City(c) => !self.cities.contains_key(&c.id) && new_cities.insert(c.id),
                NewEntity::Diplomacy(d) => {
                    !self.diplomacy.contains_key(&d.key()) && new_diplomacy.insert(d.key())
                }
                NewEntity::Troop(t) => !self.troops.contains_key(&t.id) && new_troops.insert(t.id),
            };
            if !fresh {
                return Err(WorldError::DuplicateEntity(describe(entity)));
            }
        }

        for effect in &resolution.effects {
            match effect {
                Effect::GeneralPatch { id, .. } => {
                    if !self.generals.contains_key(id) {
                        return Err(WorldError::UnknownGeneral(*id));
                    }
                }
                Effect::CityPatch { id, .. } => {
                    if !self.cities.contains_key(id) && !new_cities.contains(id) {
                        return Err(WorldError::UnknownCity(*id));
                    }
                }
                Effect::NationPatch { id, .. } => {
                    if !self.nations.contains_key(id) && !new_nations.contains(id) {
                        return Err(WorldError::UnknownNation(*id));
                    }
                }
                Effect::DiplomacyPatch { src, dest, .. } => {
                    let key = (*src, *dest);
                    // A new nation brings neutral relations with every existing one.
                    let implied = (new_nations.contains(src) || new_nations.contains(dest))
                        && src != dest
                        && (self.nations.contains_key(src) || new_nations.contains(src))
                        && (self.nations.contains_key(dest) || new_nations.contains(dest));
                    if !self.diplomacy.contains_key(&key) && !new_diplomacy.contains(&key) && !implied
                    {
                        return Err(WorldError::UnknownDiplomacy {
                            src: *src,
                            dest: *dest,
                        });
                    }
                }
                Effect::Log(_) => {}
            }
        }
        Ok(())
    }

    /// Put `general_id` into `troop_id`. Joining the same troop twice is a no-op.
    pub fn join_troop(&mut self, general_id: GeneralId, troop_id: TroopId) -> Result<(), WorldError> {
        let troop = self
            .troops
            .get(&troop_id)
            .ok_or(WorldError::UnknownTroop(troop_id))?;
        let general = self
            .generals
            .get_mut(&general_id)
            .ok_or(WorldError::UnknownGeneral(general_id))?;

        match general.troop_id {
            Some(current) if current == troop_id => return Ok(()),
            Some(current) => {
                return Err(WorldError::AlreadyInTroop {
                    general: general_id,
                    troop: current,
                })
            }
            None => {}
        }
        if general.nation_id != troop.nation_id {
            return Err(WorldError::TroopNationMismatch {
                general: general_id,
                troop: troop_id,
            });
        }
        general.troop_id = Some(troop_id);
        Ok(())
    }

    /// Take `general_id` out of its troop; a leader leaving disbands the troop.
    ///
    /// Returns false when the general was not in a troop.
    pub fn exit_troop(&mut self, general_id: GeneralId) -> Result<bool, WorldError> {
        let general = self
            .generals
            .get_mut(&general_id)
            .ok_or(WorldError::UnknownGeneral(general_id))?;
        let Some(troop_id) = general.troop_id.take() else {
            return Ok(false);
        };

        if troop_id.leader() == general_id {
            self.troops.remove(&troop_id);
            for member in self.generals.values_mut() {
                if member.troop_id == Some(troop_id) {
                    member.troop_id = None;
                }
            }
        }
        Ok(true)
    }
}

fn describe(entity: &NewEntity) -> String {
    match entity {
        NewEntity::Nation(n) => format!("nation {}", n.id),
        NewEntity::City(c) => format!("city {}", c.id),
        NewEntity::Diplomacy(d) => format!("diplomacy {} -> {}", d.src_nation_id, d.dest_nation_id),
        NewEntity::Troop(t) => format!("troop {}", t.id),
    }
}

impl WorldRef for World {
    fn get_general_by_id(&self, id: GeneralId) -> Option<&General> {
        self.generals.get(&id)
    }

    fn get_city_by_id(&self, id: CityId) -> Option<&City> {
        self.cities.get(&id)
    }

    fn get_nation_by_id(&self, id: NationId) -> Option<&Nation> {
        self.nations.get(&id)
    }

    fn get_diplomacy(&self, src: NationId, dest: NationId) -> Option<&Diplomacy> {
        self.diplomacy.get(&(src, dest))
    }

    fn get_troop_by_id(&self, id: TroopId) -> Option<&Troop> {
        self.troops.get(&id)
    }

    fn list_generals(&self) -> Vec<&General> {
        self.generals.values().collect()
    }

    fn list_cities(&self) -> Vec<&City> {
        self.cities.values().collect()
    }

    fn list_nations(&self) -> Vec<&Nation> {
        self.nations.values().collect()
    }

    fn list_diplomacy(&self) -> Vec<&Diplomacy> {
        self.diplomacy.values().collect()
    }
}
