//! Requirement lookups against a live world.

use serde_json::{Map, Value};

use super::{Fact, RequirementKey, StateView};
use crate::world::WorldRef;

/// [`StateView`] over a live world plus the attempt's env and raw args.
pub struct WorldStateView<'a> {
    world: &'a dyn WorldRef,
    env: &'a Map<String, Value>,
    args: &'a Value,
}

impl<'a> WorldStateView<'a> {
    pub fn new(world: &'a dyn WorldRef, env: &'a Map<String, Value>, args: &'a Value) -> Self {
        Self { world, env, args }
    }
}

impl StateView for WorldStateView<'_> {
    fn get(&self, key: &RequirementKey) -> Option<Fact<'_>> {
        match key {
            RequirementKey::General(id) | RequirementKey::DestGeneral(id) => {
                self.world.get_general_by_id(*id).map(Fact::General)
            }
            RequirementKey::City(id) | RequirementKey::DestCity(id) => {
                self.world.get_city_by_id(*id).map(Fact::City)
            }
            RequirementKey::Nation(id) | RequirementKey::DestNation(id) => {
                self.world.get_nation_by_id(*id).map(Fact::Nation)
            }
            RequirementKey::Diplomacy { src, dest } => {
                self.world.get_diplomacy(*src, *dest).map(Fact::Diplomacy)
            }
            RequirementKey::DiplomacyList => Some(Fact::DiplomacyList(self.world.list_diplomacy())),
            RequirementKey::GeneralList => Some(Fact::Generals(self.world.list_generals())),
            RequirementKey::NationList => Some(Fact::Nations(self.world.list_nations())),
            RequirementKey::Env(name) => self.env.get(name).map(Fact::Value),
            RequirementKey::Arg(name) => self.args.get(name.as_str()).map(Fact::Value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{City, Nation};
    use crate::world::World;
    use serde_json::json;
    use warlords_protocol::{CityId, NationId};

    #[test]
    fn resolves_entities_env_and_args() {
        let mut world = World::new();
        world.insert_nation(Nation::new(NationId(1), "Wei"));
        world.insert_nation(Nation::new(NationId(2), "Wu"));
        world.insert_city(City::new(CityId(3), "Ye", NationId(1)));
        let mut env = Map::new();
        env.insert("warAllowed".into(), json!(true));
        let args = json!({ "destCityId": 3 });
        let view = WorldStateView::new(&world, &env, &args);

        assert_eq!(view.dest_city(CityId(3)).map(|c| c.name.as_str()), Some("Ye"));
        assert!(view.city(CityId(4)).is_none());
        assert!(view.diplomacy(NationId(1), NationId(2)).is_some());
        assert_eq!(view.env("warAllowed"), Some(&json!(true)));
        assert!(!view.has(&RequirementKey::Env("missing".into())));
        assert_eq!(view.arg("destCityId"), Some(&json!(3)));
        match view.get(&RequirementKey::NationList) {
            Some(Fact::Nations(nations)) => assert_eq!(nations.len(), 2),
            other => panic!("unexpected fact {other:?}"),
        }
    }
}
