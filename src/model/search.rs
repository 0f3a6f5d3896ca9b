use super::{EntityId, SearchId};

const GOLDEN_ANGLE_DEGREES: f32 = 137.507_76;

#[derive(Clone, Debug)]
pub struct Search {
    pub id: SearchId,
    pub query: String,
    /// Visual identity, 0..360.
    pub hue: f32,
    pub result_count: usize,
    pub entity: EntityId,
}

impl Search {
    /// Highlight code painted on nodes that match this search. Codes 0 and 1
    /// are reserved for "none" and "generic".
    pub fn highlight_code(&self) -> u16 {
        u16::try_from(self.id.0)
            .unwrap_or(u16::MAX - 2)
            .saturating_add(2)
    }
}

/// Spreads successive search hues around the colour wheel.
pub fn hue_for_ordinal(ordinal: usize) -> f32 {
    (ordinal as f32 * GOLDEN_ANGLE_DEGREES).rem_euclid(360.0)
}
