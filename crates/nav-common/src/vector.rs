//! Vector utilities
//!
//! The navigation space is Z-up, so "2D" helpers operate on the X/Y plane.

use glam::{Vec2, Vec3};

/// Calculates the squared distance between two points
#[inline]
pub fn distance_squared(a: &Vec3, b: &Vec3) -> f32 {
    (*b - *a).length_squared()
}

/// Distance between two points on the X/Y plane
#[inline]
pub fn distance_2d(a: &Vec3, b: &Vec3) -> f32 {
    distance_2d_squared(a, b).sqrt()
}

/// Squared distance between two points on the X/Y plane
#[inline]
pub fn distance_2d_squared(a: &Vec3, b: &Vec3) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dx * dx + dy * dy
}

/// Length of a vector's X/Y component
#[inline]
pub fn length_2d(v: &Vec3) -> f32 {
    v.truncate().length()
}

/// Drops the Z component
#[inline]
pub fn flatten(v: &Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, 0.0)
}

/// Normalizes the X/Y component, returning zero for degenerate input
#[inline]
pub fn normalize_2d_or_zero(v: &Vec3) -> Vec3 {
    let flat: Vec2 = v.truncate();
    let len = flat.length();
    if len <= f32::EPSILON {
        Vec3::ZERO
    } else {
        Vec3::new(flat.x / len, flat.y / len, 0.0)
    }
}

/// Right-hand perpendicular of a horizontal direction
#[inline]
pub fn right_2d(dir: &Vec3) -> Vec3 {
    Vec3::new(dir.y, -dir.x, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_2d_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 100.0);
        assert_eq!(distance_2d(&a, &b), 5.0);
        assert_eq!(distance_2d_squared(&a, &b), 25.0);
    }

    #[test]
    fn test_normalize_2d_degenerate() {
        assert_eq!(normalize_2d_or_zero(&Vec3::new(0.0, 0.0, 5.0)), Vec3::ZERO);
        let n = normalize_2d_or_zero(&Vec3::new(10.0, 0.0, 3.0));
        assert_eq!(n, Vec3::X);
    }
}
