//! Obstacle samples and the sources supplying them every cycle.

use nalgebra::Point3;

use crate::kinematic_traits::Pose;

/// Obstacle point threatening one tracked link, in the planning frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleSample {
    /// Index of the threatened link among the tracked links.
    pub link: usize,
    pub position: Point3<f64>,
}

impl ObstacleSample {
    pub fn new(link: usize, position: Point3<f64>) -> Self {
        Self { link, position }
    }
}

/// Supplies the obstacle samples of one cycle, given the current poses of the tracked
/// links. An empty result is valid and means nothing is near.
pub trait ObstacleSource: Send {
    fn sample(&mut self, link_poses: &[Pose]) -> Vec<ObstacleSample>;
}

/// Source for an empty scene.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObstacles;

impl ObstacleSource for NoObstacles {
    fn sample(&mut self, _link_poses: &[Pose]) -> Vec<ObstacleSample> {
        Vec::new()
    }
}

/// Fixed set of samples, returned unchanged every cycle.
impl ObstacleSource for Vec<ObstacleSample> {
    fn sample(&mut self, _link_poses: &[Pose]) -> Vec<ObstacleSample> {
        self.clone()
    }
}

/// Adapts a closure, for example one reading a perception pipeline.
pub struct ObstacleFn<F>(pub F);

impl<F> ObstacleSource for ObstacleFn<F>
where
    F: FnMut(&[Pose]) -> Vec<ObstacleSample> + Send,
{
    fn sample(&mut self, link_poses: &[Pose]) -> Vec<ObstacleSample> {
        (self.0)(link_poses)
    }
}

/// Samples, for each link, the given points that lie within `radius` of its origin.
/// Useful for point clouds that are not yet associated with links.
pub fn associate_points(points: &[Point3<f64>], link_poses: &[Pose], radius: f64) -> Vec<ObstacleSample> {
    let mut samples = Vec::new();
    for (link, pose) in link_poses.iter().enumerate() {
        let origin = Point3::from(pose.translation.vector);
        for point in points {
            if nalgebra::distance(&origin, point) < radius {
                samples.push(ObstacleSample::new(link, *point));
            }
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Isometry3;

    #[test]
    fn test_associate_points() {
        let poses = [Isometry3::translation(0.0, 0.0, 0.0), Isometry3::translation(1.0, 0.0, 0.0)];
        let points = [Point3::new(0.05, 0.0, 0.0), Point3::new(0.9, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)];
        let samples = associate_points(&points, &poses, 0.2);
        assert_eq!(samples, vec![
            ObstacleSample::new(0, Point3::new(0.05, 0.0, 0.0)),
            ObstacleSample::new(1, Point3::new(0.9, 0.0, 0.0)),
        ]);
    }

    #[test]
    fn test_closure_source() {
        let mut source = ObstacleFn(|poses: &[Pose]| associate_points(&[Point3::origin()], poses, 0.1));
        let samples = source.sample(&[Isometry3::identity()]);
        assert_eq!(samples.len(), 1);
        assert!(NoObstacles.sample(&[Isometry3::identity()]).is_empty());
    }
}
