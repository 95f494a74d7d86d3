use std::borrow::Borrow;
use std::ops::Sub;

use nalgebra::{ClosedAddAssign, ClosedDivAssign, Point, Point2, Point3, RealField, Scalar};
use num_traits::One;

use super::Axis;

/// Axis aligned box, closed on both ends.
/// All constructors except `new` keep `min[i] <= max[i]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> AABB<Point2> {
        AABB {
            min: f(&self.min),
            max: f(&self.max),
        }
    }
}

impl<T: Scalar + Copy + PartialOrd, const D: usize> AABB<Point<T, D>> {
    /// Degenerate box containing a single point.
    pub fn from_point(point: Point<T, D>) -> Self {
        AABB {
            min: point,
            max: point,
        }
    }

    /// Smallest box containing all the points, None if the iterator is empty.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator,
        I::Item: Borrow<Point<T, D>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut ret = Self::from_point(*Borrow::<Point<T, D>>::borrow(&first));
        for point in iter {
            ret.extend_to(Borrow::<Point<T, D>>::borrow(&point));
        }
        Some(ret)
    }

    pub fn extend_to(&mut self, point: &Point<T, D>) {
        for i in 0..D {
            if point[i] < self.min[i] {
                self.min[i] = point[i];
            }
            if point[i] > self.max[i] {
                self.max[i] = point[i];
            }
        }
    }

    pub fn extend_to_box(&mut self, other: &Self) {
        self.extend_to(&other.min);
        self.extend_to(&other.max);
    }

    pub fn contains_point(&self, point: &Point<T, D>) -> bool {
        (0..D).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    pub fn contains_box(&self, other: &Self) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// True if the two closed boxes share at least one point.
    pub fn overlaps(&self, other: &Self) -> bool {
        (0..D).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Cuts the box with a plane perpendicular to `axis`.
    /// Returns the lower and upper part, both contain the plane.
    pub fn split(&self, axis: usize, position: T) -> (Self, Self) {
        let mut lower = self.clone();
        let mut upper = self.clone();
        lower.max[axis] = position;
        upper.min[axis] = position;
        (lower, upper)
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + Copy + Sub> AABB<Point2<T>> {
    pub fn width(&self) -> T::Output {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> T::Output {
        self.max[1] - self.min[1]
    }
}

impl<T: Scalar + Copy + Sub> AABB<Point3<T>> {
    /// Extent along X
    pub fn width(&self) -> T::Output {
        self.max[0] - self.min[0]
    }

    /// Extent along Y
    pub fn height(&self) -> T::Output {
        self.max[1] - self.min[1]
    }

    /// Extent along Z
    pub fn length(&self) -> T::Output {
        self.max[2] - self.min[2]
    }
}

impl<T: RealField + Copy> AABB<Point3<T>> {
    /// Length of the box diagonal, a scalar measure of the box size.
    pub fn diagonal(&self) -> T {
        self.size().norm()
    }

    /// Axis along which the box is the longest. Ties go to the lower axis.
    pub fn widest_axis(&self) -> Axis {
        let size = self.size();
        Axis::ALL
            .into_iter()
            .fold(Axis::X, |best, axis| {
                if size[axis.index()] > size[best.index()] {
                    axis
                } else {
                    best
                }
            })
    }
}

impl<T: Scalar + ClosedAddAssign + ClosedDivAssign + One, const D: usize> AABB<Point<T, D>> {
    pub fn center(&self) -> Point<T, D> {
        let two = T::one() + T::one();
        let avg_coords = (&self.min.coords + &self.max.coords) / two;
        Point::from(avg_coords)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{WorldBox, WorldPoint, test::WorldPointWrapper};

    use assert2::{assert, let_assert};
    use proptest::collection::vec;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test]
    fn from_point_is_degenerate() {
        let p = WorldPoint::new(1.0, -2.0, 3.0);
        let b = WorldBox::from_point(p);
        assert!(b.min == p);
        assert!(b.max == p);
        assert!(b.diagonal() == 0.0);
    }

    #[test]
    fn extend_to_grows_each_axis_independently() {
        let mut b = WorldBox::from_point(WorldPoint::new(0.0, 0.0, 0.0));
        b.extend_to(&WorldPoint::new(1.0, -1.0, 0.5));
        b.extend_to(&WorldPoint::new(-2.0, 3.0, 0.25));

        assert!(b.min == WorldPoint::new(-2.0, -1.0, 0.0));
        assert!(b.max == WorldPoint::new(1.0, 3.0, 0.5));
        assert!(b.width() == 3.0);
        assert!(b.height() == 4.0);
        assert!(b.length() == 0.5);
    }

    #[test]
    fn from_points_empty() {
        assert!(WorldBox::from_points(std::iter::empty::<WorldPoint>()).is_none());
    }

    #[proptest]
    fn from_points_contains_all_points(
        #[strategy(vec(proptest::arbitrary::any::<WorldPointWrapper>(), 1..50))] points: Vec<
            WorldPointWrapper,
        >,
    ) {
        let_assert!(Some(b) = WorldBox::from_points(points.iter().map(|p| p.0)));
        for p in &points {
            assert!(b.contains_point(p));
        }
        for i in 0..3 {
            assert!(b.min[i] <= b.max[i]);
        }
    }

    #[proptest]
    fn split_parts_are_contained(
        a: WorldPointWrapper,
        b: WorldPointWrapper,
        #[strategy(0.0f32..=1.0)] fraction: f32,
        #[strategy(0usize..3)] axis: usize,
    ) {
        let mut bb = WorldBox::from_point(*a);
        bb.extend_to(&b);
        let position = bb.min[axis] + fraction * (bb.max[axis] - bb.min[axis]);
        let position = position.clamp(bb.min[axis], bb.max[axis]);

        let (lower, upper) = bb.split(axis, position);

        assert!(bb.contains_box(&lower));
        assert!(bb.contains_box(&upper));
        assert!(lower.max[axis] == upper.min[axis]);
    }

    #[test_case([4.0, 1.0, 1.0], Axis::X ; "x")]
    #[test_case([1.0, 4.0, 1.0], Axis::Y ; "y")]
    #[test_case([1.0, 1.0, 4.0], Axis::Z ; "z")]
    #[test_case([2.0, 2.0, 1.0], Axis::X ; "tie_x_y")]
    #[test_case([1.0, 2.0, 2.0], Axis::Y ; "tie_y_z")]
    #[test_case([0.0, 0.0, 0.0], Axis::X ; "degenerate")]
    fn widest_axis(max: [f32; 3], expected: Axis) {
        let b = WorldBox::new(WorldPoint::origin(), max.into());
        assert!(b.widest_axis() == expected);
    }

    #[test]
    fn overlaps_touching_boxes() {
        let a = WorldBox::new([0.0, 0.0, 0.0].into(), [1.0, 1.0, 1.0].into());
        let b = WorldBox::new([1.0, 0.0, 0.0].into(), [2.0, 1.0, 1.0].into());
        let c = WorldBox::new([1.5, 0.0, 0.0].into(), [2.0, 1.0, 1.0].into());

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn diagonal_and_center() {
        let b = WorldBox::new([0.0, 0.0, 0.0].into(), [2.0, 3.0, 6.0].into());
        assert!(b.diagonal() == 7.0);
        assert!(b.center() == WorldPoint::new(1.0, 1.5, 3.0));
    }
}
