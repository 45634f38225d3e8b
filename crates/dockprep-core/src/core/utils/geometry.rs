use nalgebra::{Point3, Rotation3, Unit, Vector3};

/// Half of the tetrahedral angle, in degrees.
const HALF_TETRAHEDRAL: f64 = 109.47 / 2.0;

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Any unit vector perpendicular to `v`.
pub fn perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let helper = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (helper - v * v.dot(&helper)).normalize()
}

/// Point at `distance` from `anchor`, continuing the direction `from -> anchor`.
pub fn extend_bond(anchor: &Point3<f64>, from: &Point3<f64>, distance: f64) -> Point3<f64> {
    anchor + (anchor - from).normalize() * distance
}

/// Point at `distance` from `anchor`, opposite to the mean direction of its neighbours.
pub fn opposite_of_neighbors(
    anchor: &Point3<f64>,
    neighbors: &[Point3<f64>],
    distance: f64,
) -> Option<Point3<f64>> {
    let sum: Vector3<f64> = neighbors.iter().map(|p| (p - anchor).normalize()).sum();
    if neighbors.is_empty() || sum.norm() < 1e-6 {
        return None;
    }
    Some(anchor - sum.normalize() * distance)
}

/// The two in-plane lone-pair directions of an sp2 acceptor bonded to a single
/// atom (e.g. a carbonyl oxygen), 120 degrees from the bond.
///
/// `plane_ref` is any third atom defining the molecular plane, usually a
/// substituent of the neighbour.
pub fn trigonal_lone_pairs(
    anchor: &Point3<f64>,
    neighbor: &Point3<f64>,
    plane_ref: Option<&Point3<f64>>,
    distance: f64,
) -> [Point3<f64>; 2] {
    let axis = (anchor - neighbor).normalize();
    let normal = match plane_ref {
        Some(r) => {
            let n = (r - neighbor).cross(&axis);
            if n.norm() < 1e-6 {
                perpendicular(&axis)
            } else {
                n.normalize()
            }
        }
        None => perpendicular(&axis),
    };
    let up = rotation_from_axis_angle(&normal, 60.0) * axis;
    let down = rotation_from_axis_angle(&normal, -60.0) * axis;
    [anchor + up * distance, anchor + down * distance]
}

/// The two lone-pair directions of an sp3 acceptor with two neighbours
/// (ethers, hydroxyls, thioethers), pointing out of the neighbour plane.
pub fn tetrahedral_lone_pairs(
    anchor: &Point3<f64>,
    n1: &Point3<f64>,
    n2: &Point3<f64>,
    distance: f64,
) -> Option<[Point3<f64>; 2]> {
    let v1 = (n1 - anchor).normalize();
    let v2 = (n2 - anchor).normalize();
    let bisector = -(v1 + v2);
    if bisector.norm() < 1e-6 {
        return None;
    }
    let bisector = bisector.normalize();
    let normal = v1.cross(&v2);
    if normal.norm() < 1e-6 {
        return None;
    }
    let normal = normal.normalize();
    let angle = HALF_TETRAHEDRAL.to_radians();
    let a = bisector * angle.cos() + normal * angle.sin();
    let b = bisector * angle.cos() - normal * angle.sin();
    Some([anchor + a * distance, anchor + b * distance])
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn extend_bond_continues_direction() {
        let p = extend_bond(&Point3::new(1.0, 0.0, 0.0), &Point3::origin(), 3.0);
        assert!((p - Point3::new(4.0, 0.0, 0.0)).norm() < EPS);
    }

    #[test]
    fn perpendicular_is_orthogonal_unit() {
        for v in [Vector3::x(), Vector3::new(0.3, -0.2, 0.9).normalize()] {
            let p = perpendicular(&v);
            assert!(p.dot(&v).abs() < EPS);
            assert!((p.norm() - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn opposite_of_neighbors_points_away() {
        let anchor = Point3::origin();
        let neighbors = [Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        let p = opposite_of_neighbors(&anchor, &neighbors, 2.0).unwrap();
        assert!((p.coords.norm() - 2.0).abs() < EPS);
        assert!(p.x < 0.0 && p.y < 0.0);
        assert!(opposite_of_neighbors(&anchor, &[], 2.0).is_none());
    }

    #[test]
    fn trigonal_lone_pairs_are_120_degrees_from_bond() {
        let anchor = Point3::new(1.2, 0.0, 0.0);
        let carbon = Point3::origin();
        let substituent = Point3::new(-0.6, 1.0, 0.0);
        let pairs = trigonal_lone_pairs(&anchor, &carbon, Some(&substituent), 3.0);
        let bond = (carbon - anchor).normalize();
        for p in pairs {
            let dir = (p - anchor).normalize();
            assert!((dir.dot(&bond) - (120.0f64).to_radians().cos()).abs() < 1e-6);
            assert!(((p - anchor).norm() - 3.0).abs() < EPS);
            assert!(p.z.abs() < EPS);
        }
    }

    #[test]
    fn tetrahedral_lone_pairs_leave_the_plane() {
        let anchor = Point3::origin();
        let n1 = Point3::new(1.0, 0.3, 0.0);
        let n2 = Point3::new(-1.0, 0.3, 0.0);
        let [a, b] = tetrahedral_lone_pairs(&anchor, &n1, &n2, 3.0).unwrap();
        assert!(a.z * b.z < 0.0);
        assert!(a.y < 0.0 && b.y < 0.0);
        assert!(((a - anchor).norm() - 3.0).abs() < EPS);
    }

    #[test]
    fn tetrahedral_lone_pairs_reject_linear_neighbors() {
        let anchor = Point3::origin();
        let n1 = Point3::new(1.0, 0.0, 0.0);
        let n2 = Point3::new(-1.0, 0.0, 0.0);
        assert!(tetrahedral_lone_pairs(&anchor, &n1, &n2, 3.0).is_none());
    }
}
