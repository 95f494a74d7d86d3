use std::ops::{Add, Index, IndexMut, Mul, Sub};

use nalgebra::{
    ClosedAddAssign, ClosedDivAssign, ClosedMulAssign, ClosedSubAssign, DefaultAllocator, DimName,
    OPoint, OVector, Scalar, allocator::Allocator,
};
use num_traits::{One, Zero};

/// Three things forming a triangle.
/// Used both for index triples into a vertex array and for triangles of positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a Point> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        3
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self[0]), f(&self[1]), f(&self[2])])
    }
}

impl<Point: Default> Default for Triangle<Point> {
    fn default() -> Self {
        Triangle([Default::default(), Default::default(), Default::default()])
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<Point> IndexMut<usize> for Triangle<Point> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<T: Scalar, D: DimName> Triangle<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
    T: ClosedAddAssign + ClosedDivAssign + Zero + From<u16>,
{
    /// Barycenter of the three vertices.
    pub fn centroid(&self) -> OPoint<T, D> {
        OPoint {
            coords: self.0.iter().map(|p| &p.coords).sum::<OVector<T, D>>()
                / T::from(self.0.len() as u16),
        }
    }
}

impl<T: Scalar, D: DimName> Triangle<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
    for<'a> &'a OPoint<T, D>: Sub<Output = OVector<T, D>>,
{
    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [OVector<T, D>; 2] {
        [&self.0[1] - &self.0[0], &self.0[2] - &self.0[0]]
    }
}

impl<T: Scalar, D: DimName> Triangle<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
    for<'a> &'a OPoint<T, D>: Sub<Output = OVector<T, D>>,
    T: ClosedAddAssign + ClosedSubAssign + ClosedMulAssign,
{
    /// Returns a normal vector of the triangle, not normalized.
    pub fn normal(&self) -> OVector<T, D> {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }
}

/// Position inside a triangle.
/// `u` is the weight of the second vertex, `v` the weight of the third one,
/// the first vertex gets the rest.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates<T> {
    pub u: T,
    pub v: T,
}

impl<T> BarycentricCoordinates<T>
where
    T: One + Copy + Sub<Output = T>,
{
    pub fn interpolate<T2>(&self, a: &T2, b: &T2, c: &T2) -> T2
    where
        T2: Copy + Mul<T, Output = T2> + Add<Output = T2>,
    {
        let w = T::one() - self.u - self.v;
        *a * w + *b * self.u + *c * self.v
    }

    pub fn interpolate_triangle<T2>(&self, triangle: &Triangle<T2>) -> T2
    where
        T2: Copy + Mul<T, Output = T2> + Add<Output = T2>,
    {
        self.interpolate(&triangle[0], &triangle[1], &triangle[2])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{WorldPoint, WorldVector};

    use assert2::assert;

    fn unit_triangle() -> Triangle<WorldPoint> {
        Triangle::new(
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn centroid() {
        let t = Triangle::new(
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(3.0, 0.0, 0.0),
            WorldPoint::new(0.0, 3.0, 6.0),
        );
        assert!(t.centroid() == WorldPoint::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn normal_follows_winding() {
        let t = unit_triangle();
        assert!(t.normal() == WorldVector::new(0.0, 0.0, 1.0));
        let flipped = Triangle::new(t[0], t[2], t[1]);
        assert!(flipped.normal() == WorldVector::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn interpolate_corners() {
        let values = Triangle::new(
            WorldVector::new(1.0, 0.0, 0.0),
            WorldVector::new(0.0, 1.0, 0.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );
        let first = BarycentricCoordinates { u: 0.0f32, v: 0.0 };
        let second = BarycentricCoordinates { u: 1.0f32, v: 0.0 };
        let third = BarycentricCoordinates { u: 0.0f32, v: 1.0 };

        assert!(first.interpolate_triangle(&values) == values[0]);
        assert!(second.interpolate_triangle(&values) == values[1]);
        assert!(third.interpolate_triangle(&values) == values[2]);
    }

    #[test]
    fn interpolate_middle() {
        let uv = BarycentricCoordinates { u: 0.25f32, v: 0.25 };
        assert!(uv.interpolate(&4.0f32, &8.0, &12.0) == 7.0);
    }

    #[test]
    fn map_indices_to_positions() {
        let positions = [
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        ];
        let indices = Triangle::new(2usize, 0, 1);
        let mapped = indices.map(|i| positions[*i]);
        assert!(mapped[0] == positions[2]);
        assert!(mapped.iter().count() == 3);
    }
}
