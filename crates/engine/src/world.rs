use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared distance on the ground plane; height is ignored.
    pub fn planar_distance_sq(self, other: Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rarity {
    #[default]
    Normal,
    Magic,
    Rare,
    Unique,
}

impl Rarity {
    pub const ALL: [Rarity; 4] = [Rarity::Normal, Rarity::Magic, Rarity::Rare, Rarity::Unique];

    pub(crate) const fn index(self) -> usize {
        match self {
            Rarity::Normal => 0,
            Rarity::Magic => 1,
            Rarity::Rare => 2,
            Rarity::Unique => 3,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Rarity::Normal => "normal",
            Rarity::Magic => "magic",
            Rarity::Rare => "rare",
            Rarity::Unique => "unique",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("{what} is not readable: {reason}")]
    Read { what: &'static str, reason: String },
    #[error("entity {0:?} is no longer backed by world memory")]
    StaleEntity(EntityId),
}

/// A game object living in the external world.
///
/// Implementations are owned by the world; the engine only ever holds weak
/// references to them through [`crate::EntityRegistry`].
pub trait WorldEntity: Send + Sync {
    fn id(&self) -> EntityId;
    fn is_monster(&self) -> bool;
    fn position(&self) -> Result<Vec3, WorldError>;
    fn rarity(&self) -> Rarity;
    fn is_alive(&self) -> bool;
    fn is_targetable(&self) -> bool;
    fn is_hostile(&self) -> bool;
    fn is_hidden(&self) -> bool;
    fn is_valid(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AreaInfo {
    pub is_town: bool,
    pub is_hideout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub current_life: i32,
    pub hp_percent: f32,
    pub mp_percent: f32,
    pub position: Vec3,
    pub is_moving: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buff {
    pub name: String,
    pub charges: u32,
}

impl Buff {
    pub fn new(name: impl Into<String>, charges: u32) -> Self {
        Self {
            name: name.into(),
            charges,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub internal_name: String,
    pub can_be_used: bool,
}

impl Skill {
    pub fn new(name: impl Into<String>, internal_name: impl Into<String>, can_be_used: bool) -> Self {
        Self {
            name: name.into(),
            internal_name: internal_name.into(),
            can_be_used,
        }
    }
}

/// Read access to the live game state, queried once per frame by the
/// pre-check. `Ok(None)` means the value is currently unavailable.
pub trait WorldState {
    fn area(&self) -> Result<AreaInfo, WorldError>;
    fn local_player(&self) -> Result<Option<PlayerState>, WorldError>;
    fn buffs(&self) -> Result<Option<Vec<Buff>>, WorldError>;
    fn skills(&self) -> Result<Option<Vec<Skill>>, WorldError>;
}
