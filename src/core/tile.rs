use serde::{Deserialize, Serialize};

/// What occupies a generated cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum TileKind {
    #[default]
    Floor,
    Wall,
}

impl TileKind {
    pub fn is_solid(&self) -> bool {
        matches!(self, TileKind::Wall)
    }

    pub fn glyph(&self) -> char {
        match self {
            TileKind::Floor => '.',
            TileKind::Wall => '#',
        }
    }
}

/// Visual wall piece, picked from the wall's orthogonal neighbours.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShapeId {
    #[default]
    Full = 1,
    Wedge = 2,
    Sided = 3,
    Tube = 4,
    Pointy = 5,
    Pillar = 6,
}

impl ShapeId {
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// A shape plus its quarter-turn rotation (`0..4`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub rotation: u8,
}

impl Shape {
    /// Fallback for walls and the fixed metadata carried by floors.
    pub const FULL: Shape = Shape::new(ShapeId::Full, 0);

    pub const fn new(id: ShapeId, rotation: u8) -> Self {
        Self { id, rotation }
    }

    /// `(shape id, rotation)` as consumed by renderers.
    pub fn code(self) -> (u8, u8) {
        (self.id.id(), self.rotation)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    /// Only meaningful for walls.
    pub shape: Shape,
}

impl Tile {
    pub const FLOOR: Tile = Tile {
        kind: TileKind::Floor,
        shape: Shape::FULL,
    };

    pub const fn wall(shape: Shape) -> Self {
        Self {
            kind: TileKind::Wall,
            shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_codes() {
        assert_eq!(Shape::FULL.code(), (1, 0));
        assert_eq!(Shape::new(ShapeId::Pillar, 0).code(), (6, 0));
        assert_eq!(Shape::new(ShapeId::Pointy, 3).code(), (5, 3));
    }

    #[test]
    fn test_floor_metadata_is_fixed() {
        assert_eq!(Tile::FLOOR.kind, TileKind::Floor);
        assert_eq!(Tile::FLOOR.shape, Shape::FULL);
        assert!(!Tile::FLOOR.kind.is_solid());
        assert!(Tile::wall(Shape::FULL).kind.is_solid());
    }
}
