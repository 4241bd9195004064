// geometry.rs
// Description: 2D points and pen strokes, with distance, angle and averaging helpers used to
//              describe handwriting strokes.
// History:
// - 2026-10-06: Add point and stroke types with distance and angle helpers.

use std::iter::Sum;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{MlpError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean norm of the point seen as a vector from the origin.
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Sum for Point {
    fn sum<I: Iterator<Item = Point>>(iter: I) -> Point {
        iter.fold(Point::default(), |acc, p| acc + p)
    }
}

impl<'a> Sum<&'a Point> for Point {
    fn sum<I: Iterator<Item = &'a Point>>(iter: I) -> Point {
        iter.copied().sum()
    }
}

/// A pen-down trace with its timing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub start_time: f64,
    pub end_time: f64,
    pub coordinates: Vec<Point>,
    pub horizontal: bool,
}

impl Stroke {
    pub fn new(start_time: f64, end_time: f64, coordinates: Vec<Point>) -> Self {
        Self {
            start_time,
            end_time,
            coordinates,
            horizontal: false,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

pub fn point_to_point(a: &Point, b: &Point) -> f64 {
    (*a - *b).length()
}

/// Distance of `p` from the infinite line through `a` and `b`.
pub fn point_to_line(a: &Point, b: &Point, p: &Point) -> Result<f64> {
    let d_dx = b.x - a.x;
    let d_dy = b.y - a.y;
    let d_len = d_dx.hypot(d_dy);
    if d_len == 0.0 {
        return Err(MlpError::DegenerateLine);
    }
    Ok((-d_dy * p.x + d_dx * p.y + d_dy * a.x - d_dx * a.y).abs() / d_len)
}

/// Smallest distance between `p` and any point of `points`.
pub fn point_to_set(p: &Point, points: &[Point]) -> Result<f64> {
    points
        .iter()
        .map(|q| point_to_point(p, q))
        .min_by(f64::total_cmp)
        .ok_or(MlpError::EmptyInput("point_set"))
}

/// Included angle in degrees, in [0, 90], between the vector a->b and the horizontal.
pub fn calculate_angle(a: &Point, b: &Point) -> Result<f64> {
    let v = *b - *a;
    let d_len = v.length();
    if d_len == 0.0 {
        return Err(MlpError::DegenerateLine);
    }
    let d_cos = (v.x / d_len).abs().min(1.0);
    Ok(d_cos.acos().to_degrees())
}

pub fn average_point(points: &[Point]) -> Result<Point> {
    if points.is_empty() {
        return Err(MlpError::EmptyInput("point_set"));
    }
    let total: Point = points.iter().sum();
    let d_n = points.len() as f64;
    Ok(Point::new(total.x / d_n, total.y / d_n))
}

/// Distances between every pair (i, j) with i < j, in row-major order.
pub fn set_distances(points: &[Point]) -> Vec<f64> {
    let mut v_out = Vec::with_capacity(points.len() * points.len().saturating_sub(1) / 2);
    for (i, a) in points.iter().enumerate() {
        for b in points[i + 1..].iter() {
            v_out.push(point_to_point(a, b));
        }
    }
    v_out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_point_ops() {
        let p = Point::new(3.0, 4.0);
        assert!(close(p.length(), 5.0));
        assert_eq!(p + Point::new(1.0, -1.0), Point::new(4.0, 3.0));
        let total: Point = vec![p, p, Point::new(-6.0, 0.0)].into_iter().sum();
        assert_eq!(total, Point::new(0.0, 8.0));
    }

    #[test]
    fn test_point_to_point() {
        assert!(close(point_to_point(&Point::new(1.0, 1.0), &Point::new(4.0, 5.0)), 5.0));
    }

    #[test]
    fn test_point_to_line() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!(close(point_to_line(&a, &b, &Point::new(3.0, 2.0)).unwrap(), 2.0));
        // the line is infinite, beyond the segment still counts
        assert!(close(point_to_line(&a, &b, &Point::new(-7.0, -1.5)).unwrap(), 1.5));

        let diag = point_to_line(&a, &Point::new(1.0, 1.0), &Point::new(0.0, 2.0)).unwrap();
        assert!(close(diag, 2.0_f64.sqrt()));

        assert!(matches!(point_to_line(&a, &a, &b), Err(MlpError::DegenerateLine)));
    }

    #[test]
    fn test_point_to_set() {
        let v = vec![Point::new(5.0, 0.0), Point::new(1.0, 1.0), Point::new(-3.0, 0.0)];
        assert!(close(point_to_set(&Point::new(0.0, 0.0), &v).unwrap(), 2.0_f64.sqrt()));
        assert!(point_to_set(&Point::new(0.0, 0.0), &[]).is_err());
    }

    #[test]
    fn test_calculate_angle() {
        let o = Point::new(0.0, 0.0);
        assert!(close(calculate_angle(&o, &Point::new(5.0, 0.0)).unwrap(), 0.0));
        assert!(close(calculate_angle(&o, &Point::new(-5.0, 0.0)).unwrap(), 0.0));
        assert!(close(calculate_angle(&o, &Point::new(0.0, -2.0)).unwrap(), 90.0));
        assert!(close(calculate_angle(&o, &Point::new(-1.0, 1.0)).unwrap(), 45.0));
        assert!(calculate_angle(&o, &o).is_err());
    }

    #[test]
    fn test_average_point() {
        let v = vec![Point::new(0.0, 0.0), Point::new(2.0, 4.0), Point::new(4.0, 2.0)];
        assert_eq!(average_point(&v).unwrap(), Point::new(2.0, 2.0));
        assert!(average_point(&[]).is_err());
    }

    #[test]
    fn test_set_distances_pair_order() {
        let v = vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0), Point::new(0.0, 1.0)];
        let d = set_distances(&v);
        assert_eq!(d.len(), 3);
        assert!(close(d[0], 5.0));
        assert!(close(d[1], 1.0));
        assert!(close(d[2], 18.0_f64.sqrt()));
        assert!(set_distances(&v[..1]).is_empty());
        assert!(set_distances(&[]).is_empty());
    }

    #[test]
    fn test_stroke() {
        let s = Stroke::new(1.5, 4.0, vec![Point::new(0.0, 0.0)]);
        assert!(close(s.duration(), 2.5));
        assert!(!s.is_empty());
        assert!(!s.horizontal);
    }
}
