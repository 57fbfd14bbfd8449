//! Pokémon by name, backed by PokéAPI.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use super::{EntityLookup, LookupDescriptor};

pub static POKEMON_LOOKUP: LookupDescriptor = LookupDescriptor {
    handler_name: "pokemon_info",
    path: "/pokemon-info",
    field: "name",
    entity: "Pokemon",
    upstream: "PokéAPI",
    default_url_template: "https://pokeapi.co/api/v2/pokemon/{name}",
};

const UNKNOWN: &str = "unknown";

/// The subset of a PokéAPI `/pokemon/{name}` body this service reads.
#[derive(Debug, Deserialize)]
pub struct PokemonPayload {
    pub name: Option<String>,
    pub height: Option<Number>,
    pub weight: Option<Number>,
    pub types: Option<Vec<Option<TypeSlot>>>,
    pub abilities: Option<Vec<Option<AbilitySlot>>>,
}

#[derive(Debug, Deserialize)]
pub struct TypeSlot {
    #[serde(rename = "type")]
    pub kind: Option<NamedResource>,
}

#[derive(Debug, Deserialize)]
pub struct AbilitySlot {
    pub ability: Option<NamedResource>,
}

#[derive(Debug, Deserialize)]
pub struct NamedResource {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub height: Number,
    pub weight: Number,
    pub first_ability: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PokemonLookup;

impl EntityLookup for PokemonLookup {
    type Payload = PokemonPayload;
    type Entity = PokemonInfo;

    fn descriptor(&self) -> &'static LookupDescriptor {
        &POKEMON_LOOKUP
    }

    fn transform(&self, _key: &str, payload: PokemonPayload) -> Option<PokemonInfo> {
        let name = payload.name?;
        let kind = payload
            .types
            .and_then(|slots| slots.into_iter().next().flatten())
            .and_then(|slot| slot.kind)
            .and_then(|kind| kind.name)
            .unwrap_or_else(|| UNKNOWN.to_string());
        let first_ability = payload
            .abilities
            .and_then(|slots| slots.into_iter().next().flatten())
            .and_then(|slot| slot.ability)
            .and_then(|ability| ability.name)
            .unwrap_or_else(|| UNKNOWN.to_string());
        Some(PokemonInfo {
            name,
            kind,
            height: payload.height.unwrap_or_else(|| Number::from(0)),
            weight: payload.weight.unwrap_or_else(|| Number::from(0)),
            first_ability,
        })
    }
}
