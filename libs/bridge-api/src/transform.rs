use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Wall-clock stamp, seconds + nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    pub fn new(sec: i32, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    /// Latest representable stamp; `sec` is an `int32` as on the ROS wire.
    pub const MAX: Time = Time {
        sec: i32::MAX,
        nanosec: 999_999_999,
    };

    /// Earliest representable stamp.
    pub const MIN: Time = Time {
        sec: i32::MIN,
        nanosec: 0,
    };

    /// Split `nanos` into seconds and nanoseconds, saturating at
    /// [`Time::MAX`] and [`Time::MIN`] outside the `int32` seconds range.
    pub fn from_nanos(nanos: i64) -> Self {
        let sec = nanos.div_euclid(NANOS_PER_SEC);
        match i32::try_from(sec) {
            Ok(sec) => Self {
                sec,
                nanosec: nanos.rem_euclid(NANOS_PER_SEC) as u32,
            },
            Err(_) if sec > 0 => Self::MAX,
            Err(_) => Self::MIN,
        }
    }

    pub fn as_nanos(&self) -> i64 {
        i64::from(self.sec) * NANOS_PER_SEC + i64::from(self.nanosec)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn cross(&self, o: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    fn scale(&self, k: f64) -> Vector3 {
        Vector3::new(self.x * k, self.y * k, self.z * k)
    }

    fn add(&self, o: &Vector3) -> Vector3 {
        Vector3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

/// Rotation as a unit quaternion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about the z axis.
    pub fn from_yaw(angle: f64) -> Self {
        let half = angle / 2.0;
        Self::new(0.0, 0.0, half.sin(), half.cos())
    }

    /// Scale to unit length. A zero quaternion becomes the identity.
    pub fn normalized(&self) -> Self {
        let n = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if n == 0.0 || !n.is_finite() {
            return Self::IDENTITY;
        }
        Self::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }

    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Hamilton product `self * rhs`.
    pub fn mul(&self, rhs: &Quaternion) -> Self {
        let (a, b) = (self, rhs);
        Self::new(
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }

    pub fn rotate(&self, v: &Vector3) -> Vector3 {
        let u = Vector3::new(self.x, self.y, self.z);
        let t = u.cross(v).scale(2.0);
        v.add(&t.scale(self.w)).add(&u.cross(&t))
    }
}

/// Rigid transform mapping child-frame coordinates into the parent frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vector3,
    pub rotation: Quaternion,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vector3 { x: 0.0, y: 0.0, z: 0.0 },
        rotation: Quaternion::IDENTITY,
    };

    pub fn new(translation: Vector3, rotation: Quaternion) -> Self {
        Self { translation, rotation }
    }

    /// `self * rhs`: if `self` is parent←mid and `rhs` is mid←child, the result is parent←child.
    pub fn compose(&self, rhs: &Transform) -> Transform {
        Transform {
            translation: self.translation.add(&self.rotation.rotate(&rhs.translation)),
            rotation: self.rotation.mul(&rhs.rotation).normalized(),
        }
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        Transform {
            translation: rotation.rotate(&self.translation).scale(-1.0),
            rotation,
        }
    }

    pub fn apply(&self, point: &Vector3) -> Vector3 {
        self.translation.add(&self.rotation.rotate(point))
    }
}

// ---------------------------------------------------------------------------
// Frame-tree messages (tf2_msgs/TFMessage layout)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    /// Parent frame.
    pub frame_id: String,
}

/// One stamped parent←child transform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

impl TransformStamped {
    pub fn new(
        parent: impl Into<String>,
        child: impl Into<String>,
        stamp: Time,
        transform: Transform,
    ) -> Self {
        Self {
            header: Header {
                stamp,
                frame_id: parent.into(),
            },
            child_frame_id: child.into(),
            transform,
        }
    }

    pub fn parent(&self) -> &str {
        &self.header.frame_id
    }

    pub fn child(&self) -> &str {
        &self.child_frame_id
    }
}

/// A batch of stamped transforms; also the snapshot batch sent on the frame-tree topic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TfMessage {
    pub transforms: Vec<TransformStamped>,
}
