use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

use serde::de::Visitor;
use serde::{Deserialize, Serialize};

use super::{DEVICE_PATH_SEP, DEVICE_PATH_SEP_CHAR};

/// DevicePaths represent paths as they are on the actual Android device.
///
/// Device paths always use `/` as the separator regardless of the host and
/// may be relative, in which case the device shell resolves them against its
/// working directory (`/` for `adb shell`).
#[derive(Clone, Eq, PartialOrd, Ord)]
pub struct DevicePath {
    raw_path: String,
}

impl Serialize for DevicePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw_path)
    }
}

impl<'de> Deserialize<'de> for DevicePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = DevicePath;
            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a device path")
            }
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(DevicePath::new(v))
            }
        }

        deserializer.deserialize_str(V)
    }
}

impl AsRef<DevicePath> for DevicePath {
    fn as_ref(&self) -> &DevicePath {
        self
    }
}

impl From<&str> for DevicePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl DevicePath {
    pub fn new<T: Into<String>>(value: T) -> Self {
        Self {
            raw_path: value.into(),
        }
    }

    /// Append `child` to this path, inserting a separator only if needed
    pub fn join(&self, child: &str) -> Self {
        let child = child.trim_start_matches(DEVICE_PATH_SEP_CHAR);
        if self.raw_path.is_empty() {
            return Self::new(child);
        }
        if self.raw_path.ends_with(DEVICE_PATH_SEP_CHAR) {
            Self::new(format!("{}{}", self.raw_path, child))
        } else {
            Self::new(format!("{}{}{}", self.raw_path, DEVICE_PATH_SEP, child))
        }
    }

    /// The containing directory, if the path has one
    pub fn parent(&self) -> Option<DevicePath> {
        let trimmed = self.raw_path.trim_end_matches(DEVICE_PATH_SEP_CHAR);
        let (parent, _) = trimmed.rsplit_once(DEVICE_PATH_SEP_CHAR)?;
        if parent.is_empty() {
            Some(Self::new(DEVICE_PATH_SEP))
        } else {
            Some(Self::new(parent))
        }
    }

    /// Returns the file extension without the preceding `.`.
    pub fn extension(&self) -> Option<&str> {
        let fname = self.device_file_name();
        let (_, ext) = fname.rsplit_once('.')?;
        Some(ext)
    }

    /// Retrieve just the file name of the path
    pub fn device_file_name(&self) -> &str {
        match self.raw_path.rsplit_once(DEVICE_PATH_SEP_CHAR) {
            Some((_, fname)) => fname,
            None => &self.raw_path,
        }
    }

    /// Returns the path with [DEVICE_PATH_SEP_CHAR] as the path separator
    pub fn as_device_str(&self) -> &str {
        &self.raw_path
    }

    pub fn get_device_string(&self) -> String {
        self.as_device_str().to_string()
    }
}

impl AsRef<str> for DevicePath {
    fn as_ref(&self) -> &str {
        self.as_device_str()
    }
}

impl Debug for DevicePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DevicePath(\"{}\")", self.raw_path)
    }
}

impl Display for DevicePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw_path)
    }
}

impl Hash for DevicePath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw_path.hash(state)
    }
}

impl PartialEq for DevicePath {
    fn eq(&self, other: &Self) -> bool {
        self.raw_path == other.raw_path
    }
}
