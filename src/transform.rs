use nalgebra::{Isometry3, Matrix6, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// A rigid-body pose with an optional 6x6 covariance.
///
/// The covariance is ordered translation block first, rotation block second.
/// An absent covariance means "unknown" and is absorbing under composition.
///
/// Invalid poses are represented by NaN poisoning: [`Self::invalid`] produces
/// a pose whose scalars are NaN, and [`Self::is_valid`] checks that every
/// scalar is finite. Composing anything with an invalid pose yields an
/// invalid pose, which lets a whole chain be validated once at the end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransformWithCovariance {
    pose: Isometry3<f64>,
    covariance: Option<Matrix6<f64>>,
}

impl TransformWithCovariance {
    pub fn new(translation: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        TransformWithCovariance {
            pose: Isometry3::from_parts(Translation3::from(translation), orientation),
            covariance: None,
        }
    }

    pub fn with_covariance(
        translation: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
        covariance: Matrix6<f64>,
    ) -> Self {
        TransformWithCovariance {
            pose: Isometry3::from_parts(Translation3::from(translation), orientation),
            covariance: Some(covariance),
        }
    }

    pub fn identity() -> Self {
        TransformWithCovariance {
            pose: Isometry3::identity(),
            covariance: None,
        }
    }

    /// A pose that fails [`Self::is_valid`]. Freshly constructed edge
    /// payloads start out like this until a real pose is assigned.
    pub fn invalid() -> Self {
        TransformWithCovariance {
            pose: Isometry3::from_parts(
                Translation3::new(f64::NAN, f64::NAN, f64::NAN),
                UnitQuaternion::identity(),
            ),
            covariance: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.pose.translation.vector.iter().all(|v| v.is_finite())
            && self.pose.rotation.coords.iter().all(|v| v.is_finite())
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.pose.translation.vector
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.pose.rotation
    }

    pub fn covariance(&self) -> Option<&Matrix6<f64>> {
        self.covariance.as_ref()
    }

    pub fn set_covariance(&mut self, covariance: Option<Matrix6<f64>>) {
        self.covariance = covariance;
    }

    pub fn pose(&self) -> &Isometry3<f64> {
        &self.pose
    }

    /// Composition `self * other`: the result maps through `other` first,
    /// then `self`. Not commutative.
    ///
    /// Covariance propagates first order: the right operand's blocks are
    /// rotated into the left frame and added. An unknown covariance on either
    /// side makes the result unknown.
    pub fn compose(&self, other: &TransformWithCovariance) -> Self {
        let covariance = match (&self.covariance, &other.covariance) {
            (Some(left), Some(right)) => {
                let rot = self.pose.rotation.to_rotation_matrix();
                let mut jacobian = Matrix6::zeros();
                jacobian
                    .fixed_view_mut::<3, 3>(0, 0)
                    .copy_from(rot.matrix());
                jacobian
                    .fixed_view_mut::<3, 3>(3, 3)
                    .copy_from(rot.matrix());
                Some(left + jacobian * right * jacobian.transpose())
            }
            _ => None,
        };
        TransformWithCovariance {
            pose: self.pose * other.pose,
            covariance,
        }
    }

    pub fn inverse(&self) -> Self {
        let inverse_pose = self.pose.inverse();
        let covariance = self.covariance.map(|cov| {
            let rot = inverse_pose.rotation.to_rotation_matrix();
            let mut jacobian = Matrix6::zeros();
            jacobian
                .fixed_view_mut::<3, 3>(0, 0)
                .copy_from(rot.matrix());
            jacobian
                .fixed_view_mut::<3, 3>(3, 3)
                .copy_from(rot.matrix());
            jacobian * cov * jacobian.transpose()
        });
        TransformWithCovariance {
            pose: inverse_pose,
            covariance,
        }
    }
}

impl Default for TransformWithCovariance {
    fn default() -> Self {
        TransformWithCovariance::invalid()
    }
}

/// The payload of a directed edge: a timestamped rigid-body pose.
///
/// Every edge in the graph is paired with its reverse edge, whose payload is
/// the [`Self::inverse`] of this one. The graph maintains that pairing; user
/// code never inserts the reverse direction itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transform {
    pub time: OffsetDateTime,
    pub transform: TransformWithCovariance,
}

impl Transform {
    pub fn new(time: OffsetDateTime, transform: TransformWithCovariance) -> Self {
        Transform { time, transform }
    }

    /// A transform stamped with the current wall-clock time.
    pub fn now(transform: TransformWithCovariance) -> Self {
        Transform {
            time: OffsetDateTime::now_utc(),
            transform,
        }
    }

    pub fn identity() -> Self {
        Transform {
            time: OffsetDateTime::UNIX_EPOCH,
            transform: TransformWithCovariance::identity(),
        }
    }

    /// Convenience constructor for a pure translation with identity rotation.
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Transform::now(TransformWithCovariance::new(
            Vector3::new(x, y, z),
            UnitQuaternion::identity(),
        ))
    }

    pub fn set_transform(&mut self, transform: TransformWithCovariance) {
        self.transform = transform;
    }

    /// Composition; the timestamp of the result is the later of the two
    /// input timestamps.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            time: self.time.max(other.time),
            transform: self.transform.compose(&other.transform),
        }
    }

    /// The inverse transform, carrying the same timestamp.
    pub fn inverse(&self) -> Transform {
        Transform {
            time: self.time,
            transform: self.transform.inverse(),
        }
    }
}

impl crate::graph::EdgeProperty for Transform {
    fn inverse(&self) -> Self {
        Transform::inverse(self)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.transform.translation();
        let q = self.transform.orientation().coords;
        write!(
            f,
            "t: ({:.2} {:.2} {:.2}) r: ({:.2} {:.2} {:.2} {:.2})",
            t.x, t.y, t.z, q.w, q.x, q.y, q.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn compose_translations_adds() {
        let a = Transform::translation(1.0, 0.0, 0.0);
        let b = Transform::translation(0.0, 1.0, 0.0);
        let c = a.compose(&b);
        assert_relative_eq!(c.transform.translation(), Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn compose_applies_rotation_to_right_operand() {
        let rot = TransformWithCovariance::new(
            Vector3::zeros(),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
        );
        let step = TransformWithCovariance::new(Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity());
        let composed = rot.compose(&step);
        assert_relative_eq!(
            composed.translation(),
            Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn inverse_round_trips_to_identity() {
        let tf = Transform::translation(3.0, -2.0, 0.5);
        let round = tf.compose(&tf.inverse());
        assert_relative_eq!(round.transform.translation(), Vector3::zeros(), epsilon = 1e-9);
        assert_relative_eq!(round.transform.orientation().angle(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn inverse_keeps_the_timestamp() {
        let tf = Transform::translation(1.0, 2.0, 3.0);
        assert_eq!(tf.inverse().time, tf.time);
    }

    #[test]
    fn compose_takes_the_later_timestamp() {
        let mut early = Transform::translation(1.0, 0.0, 0.0);
        let late = Transform::translation(0.0, 1.0, 0.0);
        early.time = late.time - time::Duration::seconds(10);
        assert_eq!(early.compose(&late).time, late.time);
        assert_eq!(late.compose(&early).time, late.time);
    }

    #[test]
    fn invalid_poisons_composition() {
        let valid = Transform::translation(1.0, 0.0, 0.0);
        let invalid = Transform::new(OffsetDateTime::UNIX_EPOCH, TransformWithCovariance::invalid());
        assert!(!valid.compose(&invalid).transform.is_valid());
        assert!(!invalid.compose(&valid).transform.is_valid());
    }

    #[test]
    fn unknown_covariance_is_absorbing() {
        let mut with_cov = TransformWithCovariance::new(
            Vector3::new(1.0, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        with_cov.set_covariance(Some(Matrix6::identity()));
        let without = TransformWithCovariance::new(Vector3::zeros(), UnitQuaternion::identity());
        assert!(with_cov.compose(&without).covariance().is_none());
        let other = with_cov.clone();
        assert!(with_cov.compose(&other).covariance().is_some());
    }
}
