use serde::{Deserialize, Serialize};

/// Axis-aligned 2D bounding box.
///
/// Nodes carry an optional envelope of the record they point to; buckets carry
/// the union of everything below them so readers can skip whole subtrees that
/// do not intersect a query window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Build an envelope from two corners given in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Degenerate envelope covering a single point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow this envelope to also cover `other`.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Returns `true` if the two envelopes share at least one point.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    /// Union of an iterator of optional envelopes; `None` if none were present.
    pub fn union_of<'a, I>(envelopes: I) -> Option<Envelope>
    where
        I: IntoIterator<Item = Option<&'a Envelope>>,
    {
        envelopes.into_iter().flatten().fold(None, |acc, env| {
            let mut acc = acc.unwrap_or(*env);
            acc.expand_to_include(env);
            Some(acc)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_corners() {
        let env = Envelope::new(10.0, 5.0, -2.0, 1.0);
        assert_eq!(env, Envelope::new(-2.0, 1.0, 10.0, 5.0));
        assert_eq!(env.width(), 12.0);
        assert_eq!(env.height(), 4.0);
    }

    #[test]
    fn expand_and_contains() {
        let mut env = Envelope::point(0.0, 0.0);
        env.expand_to_include(&Envelope::new(1.0, 1.0, 2.0, 3.0));
        assert!(env.contains(&Envelope::point(1.5, 2.0)));
        assert!(!env.contains(&Envelope::point(-1.0, 0.0)));
    }

    #[test]
    fn intersection_touching_edges() {
        let a = Envelope::new(0.0, 0.0, 1.0, 1.0);
        assert!(a.intersects(&Envelope::new(1.0, 1.0, 2.0, 2.0)));
        assert!(!a.intersects(&Envelope::new(1.1, 0.0, 2.0, 1.0)));
    }

    #[test]
    fn union_skips_missing() {
        let a = Envelope::point(1.0, 1.0);
        let b = Envelope::point(-1.0, 4.0);
        let union = Envelope::union_of([Some(&a), None, Some(&b)]).unwrap();
        assert_eq!(union, Envelope::new(-1.0, 1.0, 1.0, 4.0));
        assert!(Envelope::union_of([None, None]).is_none());
    }
}
