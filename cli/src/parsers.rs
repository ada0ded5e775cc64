use std::fmt::Display;

use clap::builder::{NonEmptyStringValueParser, TypedValueParser};
use clap::error::ErrorKind;

use prefman::discovery::PREFERENCES_SUFFIX;
use prefman::DevicePath;

pub fn simple_error(err: impl Display) -> clap::Error {
    clap::Error::raw(ErrorKind::InvalidValue, format!("{}\n", err))
}

/// Device path of an XML preference file
#[derive(Clone)]
pub struct PreferenceFileValueParser;

impl TypedValueParser for PreferenceFileValueParser {
    type Value = DevicePath;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let val = NonEmptyStringValueParser::new().parse_ref(cmd, arg, value)?;
        parse_preference_file(&val).map_err(simple_error)
    }
}

fn parse_preference_file(val: &str) -> Result<DevicePath, String> {
    if !val.ends_with(PREFERENCES_SUFFIX) {
        return Err(format!("{} is not an XML file", val));
    }
    let path = DevicePath::new(val);
    if path.device_file_name() == PREFERENCES_SUFFIX {
        return Err(format!("{} has no file name", val));
    }
    Ok(path)
}

/// An application package name such as `com.example.app`
#[derive(Clone)]
pub struct PackageNameValueParser;

impl TypedValueParser for PackageNameValueParser {
    type Value = String;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let val = NonEmptyStringValueParser::new().parse_ref(cmd, arg, value)?;
        if !is_package_name(&val) {
            return Err(simple_error(format!("invalid package name {}", val)));
        }
        Ok(val)
    }
}

fn is_package_name(val: &str) -> bool {
    !val.is_empty()
        && val.split('.').all(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
                _ => return false,
            }
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
