//! Spatial bounds of a predicate
//!
//! The envelope a predicate constrains its results to, used to size the
//! geohash grid. Spatial literals bound their subtree; AND intersects and OR
//! unions child bounds; anything else leaves the world open.

use geo::BoundingRect;
use geo_types::{coord, Rect};

use super::ast::{operands, DistanceOp, Literal, Predicate, SpatialOp};
use crate::geo::sanitize::world;
use crate::geo::units::to_meters;

/// Meters per degree of latitude, used to widen distance buffers
const METERS_PER_DEGREE: f64 = 111_319.49;

/// Bounds of a predicate's result set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bounds {
    /// No spatial constraint
    World,
    /// Nothing can match
    Empty,
    Envelope(Rect<f64>),
}

impl Bounds {
    /// Concrete envelope for precision resolution
    ///
    /// An empty result set falls back to the world.
    pub fn envelope(&self) -> Rect<f64> {
        match self {
            Bounds::Envelope(rect) => *rect,
            Bounds::World | Bounds::Empty => world(),
        }
    }

    fn intersect(self, other: Bounds) -> Bounds {
        match (self, other) {
            (Bounds::Empty, _) | (_, Bounds::Empty) => Bounds::Empty,
            (Bounds::World, b) | (b, Bounds::World) => b,
            (Bounds::Envelope(a), Bounds::Envelope(b)) => {
                let min_x = a.min().x.max(b.min().x);
                let min_y = a.min().y.max(b.min().y);
                let max_x = a.max().x.min(b.max().x);
                let max_y = a.max().y.min(b.max().y);
                if min_x > max_x || min_y > max_y {
                    Bounds::Empty
                } else {
                    Bounds::Envelope(Rect::new(
                        coord! { x: min_x, y: min_y },
                        coord! { x: max_x, y: max_y },
                    ))
                }
            }
        }
    }

    fn union(self, other: Bounds) -> Bounds {
        match (self, other) {
            (Bounds::World, _) | (_, Bounds::World) => Bounds::World,
            (Bounds::Empty, b) | (b, Bounds::Empty) => b,
            (Bounds::Envelope(a), Bounds::Envelope(b)) => Bounds::Envelope(Rect::new(
                coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )),
        }
    }
}

fn literal_bounds(literal: &Literal) -> Bounds {
    match literal {
        Literal::Geometry(g) => match g.geometry().bounding_rect() {
            Some(rect) => Bounds::Envelope(rect),
            None => Bounds::Empty,
        },
        _ => Bounds::World,
    }
}

/// Compute the spatial bounds of a predicate tree
pub fn bounds(predicate: &Predicate) -> Bounds {
    match predicate {
        Predicate::Exclude => Bounds::Empty,
        Predicate::And { children } => children
            .iter()
            .map(bounds)
            .fold(Bounds::World, Bounds::intersect),
        Predicate::Or { children } => {
            let mut iter = children.iter().map(bounds);
            match iter.next() {
                Some(first) => iter.fold(first, Bounds::union),
                None => Bounds::World,
            }
        }
        Predicate::Spatial {
            operator,
            left,
            right,
        } if *operator != SpatialOp::Disjoint => match operands(left, right) {
            Some(ops) => literal_bounds(ops.literal),
            None => Bounds::World,
        },
        Predicate::Distance {
            operator: DistanceOp::DWithin,
            left,
            right,
            distance,
            units,
        } => match operands(left, right).map(|ops| literal_bounds(ops.literal)) {
            Some(Bounds::Envelope(rect)) => {
                let pad = (to_meters(*distance, units, true) / METERS_PER_DEGREE).max(0.0);
                Bounds::Envelope(Rect::new(
                    coord! { x: rect.min().x - pad, y: rect.min().y - pad },
                    coord! { x: rect.max().x + pad, y: rect.max().y + pad },
                ))
            }
            Some(other) => other,
            None => Bounds::World,
        },
        _ => Bounds::World,
    }
}
