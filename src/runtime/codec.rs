//! Compact delimited value codec
//!
//! Script arguments carry angles, block positions and world locations as
//! comma-separated text (`"world,1.5,64,-3,90,0"`). Missing trailing fields
//! default to zero; a field that is present but not a finite number of the
//! expected type is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{CodecError, CodecResult};

/// Rotation triple (pitch-like axes, radians)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngle {
    /// Rotation around the x axis
    pub x: f64,
    /// Rotation around the y axis
    pub y: f64,
    /// Rotation around the z axis
    pub z: f64,
}

impl EulerAngle {
    /// Create a new angle triple
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Integer grid (block) position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Grid x
    pub x: i32,
    /// Grid y
    pub y: i32,
    /// Grid z
    pub z: i32,
}

impl Position {
    /// Create a new grid position
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// A point in a named world with an orientation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    /// World name; resolving it is the host's concern
    pub world: String,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
    /// Horizontal rotation in degrees
    pub yaw: f32,
    /// Vertical rotation in degrees
    pub pitch: f32,
}

impl Location {
    /// Create a location without orientation
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Copy of this location with a new orientation
    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    /// Euclidean distance, or `None` across worlds
    pub fn distance(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let (dx, dy, dz) = (other.x - self.x, other.y - self.y, other.z - self.z);
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    /// Grid position containing this location
    pub fn block(&self) -> Position {
        Position::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.world, self.x, self.y, self.z, self.yaw, self.pitch
        )
    }
}

/// Parse `"x,y,z"` into an [`EulerAngle`]
pub fn to_euler_angle(text: &str) -> CodecResult<EulerAngle> {
    let fields = Fields::split(text, 3)?;
    Ok(EulerAngle::new(
        fields.number(0, "f64")?,
        fields.number(1, "f64")?,
        fields.number(2, "f64")?,
    ))
}

/// Parse `"x,y,z"` into a grid [`Position`]
pub fn to_position(text: &str) -> CodecResult<Position> {
    let fields = Fields::split(text, 3)?;
    Ok(Position::new(
        fields.number(0, "i32")?,
        fields.number(1, "i32")?,
        fields.number(2, "i32")?,
    ))
}

/// Parse `"world,x,y,z,yaw,pitch"` into a [`Location`]
pub fn to_location(text: &str) -> CodecResult<Location> {
    let fields = Fields::split(text, 6)?;
    let world = fields.get(0).ok_or(CodecError::MissingWorld)?;
    Ok(Location {
        world: world.to_string(),
        x: fields.number(1, "f64")?,
        y: fields.number(2, "f64")?,
        z: fields.number(3, "f64")?,
        yaw: fields.number(4, "f32")?,
        pitch: fields.number(5, "f32")?,
    })
}

/// Split fields; blank entries count as absent
struct Fields<'a> {
    parts: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    fn split(text: &'a str, max: usize) -> CodecResult<Self> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        // Trailing blanks ("1,2,") are tolerated; only real fields count.
        let found = parts
            .iter()
            .rposition(|part| !part.is_empty())
            .map_or(0, |last| last + 1);
        if found > max {
            return Err(CodecError::TooManyFields { max, found });
        }
        Ok(Self { parts })
    }

    fn get(&self, index: usize) -> Option<&'a str> {
        self.parts
            .get(index)
            .copied()
            .filter(|part| !part.is_empty())
    }

    fn number<T: Numeric>(&self, index: usize, expected: &'static str) -> CodecResult<T> {
        match self.get(index) {
            None => Ok(T::ZERO),
            Some(text) => T::parse_finite(text).ok_or_else(|| CodecError::InvalidNumber {
                index,
                text: text.to_string(),
                expected,
            }),
        }
    }
}

trait Numeric: Sized {
    const ZERO: Self;
    fn parse_finite(text: &str) -> Option<Self>;
}

impl Numeric for i32 {
    const ZERO: Self = 0;
    fn parse_finite(text: &str) -> Option<Self> {
        i32::from_str(text).ok()
    }
}

impl Numeric for f64 {
    const ZERO: Self = 0.0;
    fn parse_finite(text: &str) -> Option<Self> {
        f64::from_str(text).ok().filter(|v| v.is_finite())
    }
}

impl Numeric for f32 {
    const ZERO: Self = 0.0;
    fn parse_finite(text: &str) -> Option<Self> {
        f32::from_str(text).ok().filter(|v| v.is_finite())
    }
}
