use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{Entity, EntityId};

const EPSILON: f64 = 1e-9;

/// Result of spreading a strength increase over the other entities.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Redistribution {
    pub requested: f64,
    pub absorbed: f64,
    /// Portion nobody had headroom for; total strength rose by this much.
    pub leftover: f64,
    pub touched: Vec<EntityId>,
}

impl Redistribution {
    pub fn is_conserving(&self) -> bool {
        self.leftover <= EPSILON
    }
}

/// Subtracts `amount` from every entity except `source`, evenly, flooring each
/// at zero and passing any shortfall on to entities that still have strength.
pub(crate) fn redistribute(
    entities: &mut BTreeMap<EntityId, Entity>,
    source: EntityId,
    amount: f64,
) -> Redistribution {
    let mut outcome = Redistribution {
        requested: amount,
        ..Redistribution::default()
    };
    if amount <= EPSILON {
        return outcome;
    }

    let mut remaining = amount;
    let max_passes = entities.len().max(1);
    for _ in 0..max_passes {
        let donors = entities
            .values()
            .filter(|entity| entity.id != source && entity.strength > EPSILON)
            .count();
        if donors == 0 || remaining <= EPSILON {
            break;
        }

        let share = remaining / donors as f64;
        for entity in entities.values_mut() {
            if entity.id == source || entity.strength <= EPSILON {
                continue;
            }
            let taken = share.min(entity.strength);
            entity.strength -= taken;
            if entity.strength < EPSILON {
                entity.strength = 0.0;
            }
            remaining -= taken;
            if !outcome.touched.contains(&entity.id) {
                outcome.touched.push(entity.id);
            }
        }
    }

    if remaining <= EPSILON {
        remaining = 0.0;
    } else {
        debug!(leftover = remaining, %source, "strength redistribution exhausted");
    }

    outcome.absorbed = amount - remaining;
    outcome.leftover = remaining;
    outcome
}
