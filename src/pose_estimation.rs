//! Head pose estimation from facial landmarks.
//!
//! The six pose-reference landmarks give both the object points (rescaled
//! x/y plus the detector's relative depth) and the image points (the same
//! x/y), so the recovered rotation reflects how the depth profile of the
//! face tilts against its projection. The rotation is found with an
//! iterative Perspective-n-Point solve, decomposed RQ-style into three
//! angles, and rescaled onto the shared threshold scale.

use crate::{
    constants::{EPSILON, POSE_ANGLE_SCALE},
    detection::{FrameGeometry, LandmarkSet, POSE_REFERENCE_LANDMARKS},
    Error, Result,
};
use log::info;
use nalgebra::{Matrix3, Matrix6, Point2, Point3, Rotation3, SMatrix, SVector, Vector3, Vector6};

/// Number of pose-reference landmarks
const POSE_POINT_COUNT: usize = 6;

/// Two residuals (x and y) per pose-reference landmark
const RESIDUAL_DIM: usize = 2 * POSE_POINT_COUNT;

const MAX_ITERATIONS: usize = 40;
const LAMBDA_INITIAL: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;
const JACOBIAN_STEP: f64 = 1e-6;
const COST_TOLERANCE: f64 = 1e-14;

/// Head rotation angles on the shared threshold scale.
///
/// Positive pitch means the head is turned up, positive yaw means it is
/// turned right; roll is the in-plane tilt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseAngles {
    /// Vertical rotation component
    pub pitch: f64,
    /// Horizontal rotation component
    pub yaw: f64,
    /// In-plane rotation component
    pub roll: f64,
}

/// Head pose estimator using an iterative `PnP` solve
pub struct PoseEstimator {
    geometry: FrameGeometry,
    camera_matrix: Matrix3<f64>,
    distortion: [f64; 4],
}

impl PoseEstimator {
    /// Create a pose estimator for the session's working-frame geometry
    #[must_use]
    pub fn new(geometry: FrameGeometry) -> Self {
        info!(
            "Initializing PoseEstimator for {}x{} working frames",
            geometry.width, geometry.height
        );
        Self {
            geometry,
            camera_matrix: geometry.camera_matrix(),
            distortion: geometry.distortion(),
        }
    }

    /// The working-frame geometry this estimator was built for
    #[must_use]
    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// Estimate head pose angles from a landmark set.
    ///
    /// # Errors
    ///
    /// Returns an error if the solve is numerically degenerate (for
    /// example, collinear pose-reference points); the caller should treat
    /// the tick as having no usable direction.
    pub fn estimate(&self, landmarks: &LandmarkSet) -> Result<PoseAngles> {
        let mut object_points = [Point3::new(0.0, 0.0, 0.0); POSE_POINT_COUNT];
        let mut image_points = [Point2::new(0.0, 0.0); POSE_POINT_COUNT];
        for (slot, &index) in POSE_REFERENCE_LANDMARKS.iter().enumerate() {
            let rescaled = self.geometry.rescale(&landmarks.point(index));
            object_points[slot] = rescaled;
            image_points[slot] = Point2::new(rescaled.x, rescaled.y);
        }

        let rotation_vector = self.solve_pnp(&object_points, &image_points)?;
        let rotation = Rotation3::from_scaled_axis(rotation_vector);
        let (pitch, yaw, roll) = rq_euler_degrees(rotation.matrix());

        Ok(PoseAngles {
            pitch: pitch * POSE_ANGLE_SCALE,
            yaw: yaw * POSE_ANGLE_SCALE,
            roll: roll * POSE_ANGLE_SCALE,
        })
    }

    /// Recover the rotation vector mapping object points onto image points
    /// under the synthetic camera, via Levenberg-Marquardt over the six
    /// rotation/translation parameters.
    fn solve_pnp(
        &self,
        object: &[Point3<f64>; POSE_POINT_COUNT],
        image: &[Point2<f64>; POSE_POINT_COUNT],
    ) -> Result<Vector3<f64>> {
        check_not_collinear(object)?;

        let mut params = self.initial_params(object, image);
        let mut residual = self.residuals(&params, object, image).ok_or_else(|| {
            Error::PoseSolve("initial projection is behind the camera".to_string())
        })?;
        let mut cost = residual.norm_squared();
        let mut lambda = LAMBDA_INITIAL;

        for _ in 0..MAX_ITERATIONS {
            if cost < COST_TOLERANCE {
                break;
            }
            let Some(jacobian) = self.numeric_jacobian(&params, object, image) else {
                return Err(Error::PoseSolve("projection degenerate during solve".to_string()));
            };
            let jtj = jacobian.transpose() * jacobian;
            let jtr = jacobian.transpose() * residual;
            let mut damping = jtj.diagonal();
            for value in damping.iter_mut() {
                *value = value.max(EPSILON);
            }

            // Escalate damping until a step actually reduces the cost
            let mut improved = false;
            while lambda <= LAMBDA_MAX {
                let damped = jtj + Matrix6::from_diagonal(&damping) * lambda;
                let Some(step) = damped.cholesky().map(|factor| factor.solve(&jtr)) else {
                    lambda *= 10.0;
                    continue;
                };
                let candidate = params - step;
                let Some(candidate_residual) = self.residuals(&candidate, object, image) else {
                    lambda *= 10.0;
                    continue;
                };
                let candidate_cost = candidate_residual.norm_squared();
                if candidate_cost.is_finite() && candidate_cost < cost {
                    params = candidate;
                    residual = candidate_residual;
                    cost = candidate_cost;
                    lambda = (lambda * 0.1).max(1e-12);
                    improved = true;
                    break;
                }
                lambda *= 10.0;
            }
            if !improved {
                // No damping level improves the fit; the current estimate
                // is the local minimum
                break;
            }
        }

        let rotation_vector = Vector3::new(params[0], params[1], params[2]);
        if !cost.is_finite() || !rotation_vector.iter().all(|v| v.is_finite()) {
            return Err(Error::PoseSolve("solve produced non-finite rotation".to_string()));
        }
        Ok(rotation_vector)
    }

    /// Zero rotation, with the translation placing the object centroid on
    /// its own image projection at unit magnification
    fn initial_params(
        &self,
        object: &[Point3<f64>; POSE_POINT_COUNT],
        image: &[Point2<f64>; POSE_POINT_COUNT],
    ) -> Vector6<f64> {
        let count = POSE_POINT_COUNT as f64;
        let object_centroid = object
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / count;
        let (image_cx, image_cy) = image
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));

        let fx = self.camera_matrix[(0, 0)];
        let fy = self.camera_matrix[(1, 1)];
        let cx = self.camera_matrix[(0, 2)];
        let cy = self.camera_matrix[(1, 2)];

        let tz = fx;
        let tx = (image_cx / count - cx) * tz / fx - object_centroid.x;
        let ty = (image_cy / count - cy) * tz / fy - object_centroid.y;
        Vector6::new(0.0, 0.0, 0.0, tx, ty, tz)
    }

    fn residuals(
        &self,
        params: &Vector6<f64>,
        object: &[Point3<f64>; POSE_POINT_COUNT],
        image: &[Point2<f64>; POSE_POINT_COUNT],
    ) -> Option<SVector<f64, RESIDUAL_DIM>> {
        let rotation = Rotation3::from_scaled_axis(Vector3::new(params[0], params[1], params[2]));
        let translation = Vector3::new(params[3], params[4], params[5]);
        let mut residual = SVector::<f64, RESIDUAL_DIM>::zeros();
        for (i, (object_point, image_point)) in object.iter().zip(image.iter()).enumerate() {
            let projected = self.project(&rotation, &translation, object_point)?;
            residual[2 * i] = projected.x - image_point.x;
            residual[2 * i + 1] = projected.y - image_point.y;
        }
        Some(residual)
    }

    /// Pinhole projection with the (identically zero) distortion model
    /// applied. `None` when the point lands on the camera plane.
    fn project(
        &self,
        rotation: &Rotation3<f64>,
        translation: &Vector3<f64>,
        point: &Point3<f64>,
    ) -> Option<Point2<f64>> {
        let camera_point = rotation * point + translation;
        if camera_point.z.abs() < EPSILON {
            return None;
        }
        let x = camera_point.x / camera_point.z;
        let y = camera_point.y / camera_point.z;

        let [k1, k2, p1, p2] = self.distortion;
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
        let x_distorted = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_distorted = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

        let fx = self.camera_matrix[(0, 0)];
        let fy = self.camera_matrix[(1, 1)];
        let cx = self.camera_matrix[(0, 2)];
        let cy = self.camera_matrix[(1, 2)];
        Some(Point2::new(fx * x_distorted + cx, fy * y_distorted + cy))
    }

    /// Central-difference Jacobian of the residual vector
    fn numeric_jacobian(
        &self,
        params: &Vector6<f64>,
        object: &[Point3<f64>; POSE_POINT_COUNT],
        image: &[Point2<f64>; POSE_POINT_COUNT],
    ) -> Option<SMatrix<f64, RESIDUAL_DIM, 6>> {
        let mut jacobian = SMatrix::<f64, RESIDUAL_DIM, 6>::zeros();
        for column in 0..6 {
            let h = JACOBIAN_STEP * params[column].abs().max(1.0);
            let mut forward = *params;
            forward[column] += h;
            let mut backward = *params;
            backward[column] -= h;
            let forward_residual = self.residuals(&forward, object, image)?;
            let backward_residual = self.residuals(&backward, object, image)?;
            jacobian.set_column(column, &((forward_residual - backward_residual) / (2.0 * h)));
        }
        Some(jacobian)
    }
}

/// Reject object-point sets whose scatter collapses onto a line; the
/// normal equations are rank-deficient there and no pose is recoverable.
fn check_not_collinear(points: &[Point3<f64>; POSE_POINT_COUNT]) -> Result<()> {
    let centroid = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords)
        / POSE_POINT_COUNT as f64;
    let mut scatter = Matrix3::zeros();
    for point in points {
        let offset = point.coords - centroid;
        scatter += offset * offset.transpose();
    }

    let eigenvalues = scatter.symmetric_eigen().eigenvalues;
    let mut sorted = [eigenvalues[0], eigenvalues[1], eigenvalues[2]];
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    if sorted[1] <= sorted[0] * 1e-10 + EPSILON {
        return Err(Error::PoseSolve(
            "pose-reference points are collinear".to_string(),
        ));
    }
    Ok(())
}

/// Decompose a rotation matrix into three Givens angles (degrees),
/// following the classic RQ convention: rotate about x to zero M(2,1),
/// about y to zero M(2,0), about z to zero M(1,0).
fn rq_euler_degrees(matrix: &Matrix3<f64>) -> (f64, f64, f64) {
    let (sin_x, cos_x) = normalize_pair(matrix[(2, 1)], matrix[(2, 2)]);
    let qx = Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, cos_x, sin_x, //
        0.0, -sin_x, cos_x,
    );
    let m = matrix * qx;

    let (sin_y, cos_y) = normalize_pair(-m[(2, 0)], m[(2, 2)]);
    let qy = Matrix3::new(
        cos_y, 0.0, -sin_y, //
        0.0, 1.0, 0.0, //
        sin_y, 0.0, cos_y,
    );
    let m = m * qy;

    let (sin_z, cos_z) = normalize_pair(m[(1, 0)], m[(1, 1)]);

    (
        sin_x.atan2(cos_x).to_degrees(),
        sin_y.atan2(cos_y).to_degrees(),
        sin_z.atan2(cos_z).to_degrees(),
    )
}

fn normalize_pair(s: f64, c: f64) -> (f64, f64) {
    let norm = (s * s + c * c).sqrt();
    if norm < EPSILON {
        (0.0, 1.0)
    } else {
        (s / norm, c / norm)
    }
}
