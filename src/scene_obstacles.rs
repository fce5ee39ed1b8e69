//! Obstacles from a static collision scene. For every tracked link and every body of the
//! scene, the point of the body closest to the link origin becomes an obstacle sample if
//! it is within the safety distance. A link origin inside a body is reported as touching
//! an obstacle just behind it, so the repulsion points towards the nearest surface.

use nalgebra::{Isometry3, Point3, Vector3};
use parry3d::query::PointQuery;
use parry3d::shape::SharedShape;
use rayon::prelude::*;

use crate::kinematic_traits::Pose;
use crate::obstacles::{ObstacleSample, ObstacleSource};

/// How far behind a penetrating link origin its obstacle sample is placed. Far below any
/// sensible minimum obstacle distance, so the link gets the repulsion of a contact.
const PENETRATION_OFFSET: f32 = 1e-4;

/// Static object the robot should keep away from. Unlike robot links, it has the global
/// transform placing it where desired.
#[derive(Clone)]
pub struct ObstacleBody {
    pub shape: SharedShape,
    /// Global transform of this object.
    pub pose: Isometry3<f32>,
}

#[derive(Clone)]
pub struct SceneObstacles {
    bodies: Vec<ObstacleBody>,
    safety_distance: f64,
}

impl SceneObstacles {
    pub fn new(safety_distance: f64) -> Self {
        Self { bodies: Vec::new(), safety_distance }
    }

    pub fn add_body(&mut self, shape: SharedShape, pose: Isometry3<f32>) -> &mut Self {
        self.bodies.push(ObstacleBody { shape, pose });
        self
    }

    pub fn add_sphere(&mut self, center: Point3<f64>, radius: f64) -> &mut Self {
        let pose = Isometry3::translation(center.x as f32, center.y as f32, center.z as f32);
        self.add_body(SharedShape::ball(radius as f32), pose)
    }

    pub fn add_cuboid(&mut self, pose: &Pose, half_extents: Vector3<f64>) -> &mut Self {
        let half_extents: Vector3<f32> = half_extents.cast();
        self.add_body(SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z), pose.cast())
    }

    pub fn bodies(&self) -> &[ObstacleBody] {
        &self.bodies
    }

    fn closest(&self, link: usize, origin: &Point3<f32>) -> Vec<ObstacleSample> {
        self.bodies
            .iter()
            .filter_map(|body| {
                let projection = body.shape.project_point(&body.pose, origin, false);
                let surface = projection.point;
                if projection.is_inside {
                    let behind = match (surface - origin).try_normalize(f32::EPSILON) {
                        Some(exit) => origin - exit * PENETRATION_OFFSET,
                        None => surface,
                    };
                    return Some(ObstacleSample::new(link, behind.cast()));
                }
                let distance = nalgebra::distance(origin, &surface) as f64;
                (distance < self.safety_distance).then(|| ObstacleSample::new(link, surface.cast()))
            })
            .collect()
    }
}

impl ObstacleSource for SceneObstacles {
    fn sample(&mut self, link_poses: &[Pose]) -> Vec<ObstacleSample> {
        let scene = &*self;
        link_poses
            .par_iter()
            .enumerate()
            .flat_map_iter(|(link, pose)| {
                let origin: Point3<f32> = Point3::from(pose.translation.vector).cast();
                scene.closest(link, &origin)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::RepulsiveField;

    #[test]
    fn test_sphere_near_one_link() {
        let mut scene = SceneObstacles::new(0.15);
        scene.add_sphere(Point3::new(1.0, 0.0, 0.0), 0.1);
        let poses = [Isometry3::translation(0.0, 0.0, 0.0), Isometry3::translation(0.8, 0.0, 0.0)];
        let samples = scene.sample(&poses);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].link, 1);
        assert!((samples[0].position.x - 0.9).abs() < 1e-5);
    }

    fn repulsion(link: &Vector3<f64>, obstacle: &Point3<f64>) -> Vector3<f64> {
        let field = RepulsiveField { eta: 0.002, alfa: 2.0, safety_distance: 0.15, min_distance: 0.005 };
        field.force(link, &obstacle.coords)
    }

    #[test]
    fn test_link_inside_body() {
        let mut scene = SceneObstacles::new(0.15);
        scene.add_cuboid(&Isometry3::translation(0.0, 0.0, 1.0), Vector3::new(0.5, 0.5, 0.5));
        let link = Vector3::new(0.0, 0.0, 1.2);
        let samples = scene.sample(&[Isometry3::translation(0.0, 0.0, 1.2)]);
        assert_eq!(samples.len(), 1, "Penetration is reported regardless of depth");

        // Nearest face is the top one at z = 1.5, the sample sits just below the link
        let position = samples[0].position;
        assert!(position.x.abs() < 1e-5 && position.y.abs() < 1e-5);
        assert!(position.z < 1.2 && position.z > 1.199);
        let force = repulsion(&link, &position);
        assert!(force.z > 0.0);
        assert!(force.x.abs() < 1e-6 * force.z && force.y.abs() < 1e-6 * force.z);
    }

    #[test]
    fn test_link_inside_body_pushed_to_nearest_face() {
        let mut scene = SceneObstacles::new(0.15);
        scene.add_cuboid(&Isometry3::translation(0.0, 0.0, 1.0), Vector3::new(0.5, 0.5, 0.5));
        for z in [0.52, 0.55, 0.6, 0.7, 0.8] {
            let link = Vector3::new(0.0, 0.0, z);
            let samples = scene.sample(&[Isometry3::translation(0.0, 0.0, z)]);
            assert_eq!(samples.len(), 1);
            let force = repulsion(&link, &samples[0].position);
            assert!(force.z < 0.0, "At z = {} the link must be pushed down, got {:?}", z, force);
        }
    }

    #[test]
    fn test_empty_scene() {
        let mut scene = SceneObstacles::new(0.15);
        assert!(scene.sample(&[Isometry3::identity()]).is_empty());
        assert!(scene.bodies().is_empty());
    }
}
