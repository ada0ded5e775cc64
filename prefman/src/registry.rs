use std::collections::HashSet;

use serde::Serialize;

use crate::adb::{device_error, Adb, ExecAdb};
use crate::config::DeviceAccessConfig;
use crate::dump::DumpPackageRegistry;
use crate::utils::DevicePath;
use crate::Context;

/// What the platform knows about an installed application
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApplicationInfo {
    pub package_name: String,
    pub label: String,
    /// The base APK, which also holds the launcher icon
    pub source_dir: Option<DevicePath>,
    pub system: bool,
    pub enabled: bool,
    /// `false` for packages uninstalled for the user but still present
    pub installed: bool,
}

impl ApplicationInfo {
    pub fn new<T: Into<String>>(package_name: T) -> Self {
        let package_name = package_name.into();
        Self {
            label: package_name.clone(),
            package_name,
            source_dir: None,
            system: false,
            enabled: true,
            installed: true,
        }
    }
}

/// The platform's package registry
pub trait PackageRegistry: Send + Sync {
    /// Every application, including disabled ones and ones that were
    /// uninstalled but kept their data
    fn installed_applications(&self) -> crate::Result<Vec<ApplicationInfo>>;

    fn get_application(&self, package: &str) -> crate::Result<Option<ApplicationInfo>> {
        Ok(self
            .installed_applications()?
            .into_iter()
            .find(|it| it.package_name == package))
    }
}

impl<T> PackageRegistry for Box<T>
where
    T: PackageRegistry + ?Sized,
{
    fn installed_applications(&self) -> crate::Result<Vec<ApplicationInfo>> {
        self.as_ref().installed_applications()
    }

    fn get_application(&self, package: &str) -> crate::Result<Option<ApplicationInfo>> {
        self.as_ref().get_application(package)
    }
}

/// [PackageRegistry] backed by `pm list packages`
///
/// `pm` doesn't report labels so the package name doubles as the label.
pub struct AdbPackageRegistry<T: Adb> {
    adb: T,
}

impl<T> AdbPackageRegistry<T>
where
    T: Adb,
{
    pub fn new(adb: T) -> Self {
        Self { adb }
    }

    fn pm_list(&self, flags: &str) -> crate::Result<String> {
        let cmd = format!("pm list packages {}", flags);
        let output = self.adb.shell(cmd.trim_end())?;
        if !output.ok() {
            let stderr = output.stderr_utf8_lossy();
            if let Some(e) = device_error(&stderr) {
                return Err(e);
            }
            return Err(crate::Error::CommandError(
                output.status.code().unwrap_or(-1),
                stderr.into_owned(),
            ));
        }
        Ok(output.stdout_utf8_lossy().into_owned())
    }

    fn pm_package_set(&self, flags: &str) -> crate::Result<HashSet<String>> {
        let out = self.pm_list(flags)?;
        Ok(out
            .lines()
            .filter_map(|it| parse_pm_line(it).map(|(pkg, _)| String::from(pkg)))
            .collect())
    }
}

impl<T> PackageRegistry for AdbPackageRegistry<T>
where
    T: Adb,
{
    fn installed_applications(&self) -> crate::Result<Vec<ApplicationInfo>> {
        let all = self.pm_list("-f -u")?;
        let installed = self.pm_package_set("")?;
        let system = self.pm_package_set("-s -u")?;
        let disabled = self.pm_package_set("-d")?;

        let apps = all
            .lines()
            .filter_map(parse_pm_line)
            .map(|(pkg, apk)| ApplicationInfo {
                package_name: pkg.into(),
                label: pkg.into(),
                source_dir: apk.map(DevicePath::new),
                system: system.contains(pkg),
                enabled: !disabled.contains(pkg),
                installed: installed.contains(pkg),
            })
            .collect::<Vec<ApplicationInfo>>();

        log::debug!("pm reported {} applications", apps.len());
        Ok(apps)
    }
}

/// The registry of the configured device
pub fn get_package_registry(ctx: &dyn Context) -> crate::Result<Box<dyn PackageRegistry>> {
    let config = match ctx.get_config()? {
        Some(v) => v,
        None => return Ok(Box::new(AdbPackageRegistry::new(ExecAdb::new(ctx)?))),
    };

    match &config.device_access {
        DeviceAccessConfig::Adb(adb) => {
            if !config.can_adb {
                return Err(crate::Error::AdbDisabled);
            }
            let adb = ExecAdb::try_from_adb_config(ctx, adb)?;
            Ok(Box::new(AdbPackageRegistry::new(adb)))
        }
        DeviceAccessConfig::Dump(dump) => Ok(Box::new(DumpPackageRegistry::new(
            dump.base.clone(),
            &config.data_base,
        ))),
    }
}

/// Parse `package:/path/base.apk=com.example` or `package:com.example`
/// into the package name and the optional APK path
pub(crate) fn parse_pm_line(line: &str) -> Option<(&str, Option<&str>)> {
    let rest = line.trim().strip_prefix("package:")?;
    if rest.is_empty() {
        return None;
    }
    match rest.rsplit_once('=') {
        Some((apk, pkg)) if !pkg.is_empty() => {
            let apk = if apk.is_empty() { None } else { Some(apk) };
            Some((pkg, apk))
        }
        Some(_) => {
            log::warn!("invalid output for list packages: {}", line);
            None
        }
        None => Some((rest, None)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{cmd_output, mock_adb, tmp_context, MockAdb, TestContext};
    use mockall::predicate::eq;
    use rstest::*;

    #[test]
    fn test_parse_pm_line() {
        assert_eq!(
            parse_pm_line("package:/data/app/~~abc==/com.example.app-xyz==/base.apk=com.example.app"),
            Some((
                "com.example.app",
                Some("/data/app/~~abc==/com.example.app-xyz==/base.apk")
            ))
        );
        assert_eq!(
            parse_pm_line("package:com.android.settings"),
            Some(("com.android.settings", None))
        );
        assert_eq!(parse_pm_line("package:/system/app/x.apk="), None);
        assert_eq!(parse_pm_line("garbage"), None);
        assert_eq!(parse_pm_line(""), None);
    }

    #[rstest]
    fn test_installed_applications(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .with(eq("pm list packages -f -u"))
            .returning(|_| {
                Ok(cmd_output(
                    0,
                    "package:/data/app/com.example.app-1/base.apk=com.example.app\n\
                     package:/system/priv-app/Settings/Settings.apk=com.android.settings\n\
                     package:/data/app/com.gone-1/base.apk=com.gone\n",
                    "",
                ))
            });
        mock_adb
            .expect_shell()
            .with(eq("pm list packages"))
            .returning(|_| {
                Ok(cmd_output(
                    0,
                    "package:com.example.app\npackage:com.android.settings\n",
                    "",
                ))
            });
        mock_adb
            .expect_shell()
            .with(eq("pm list packages -s -u"))
            .returning(|_| Ok(cmd_output(0, "package:com.android.settings\n", "")));
        mock_adb
            .expect_shell()
            .with(eq("pm list packages -d"))
            .returning(|_| Ok(cmd_output(0, "package:com.example.app\n", "")));

        let registry = AdbPackageRegistry::new(mock_adb);
        let apps = registry.installed_applications().expect("apps");
        assert_eq!(apps.len(), 3);

        assert_eq!(apps[0].package_name, "com.example.app");
        assert_eq!(apps[0].label, "com.example.app");
        assert!(!apps[0].system);
        assert!(!apps[0].enabled);
        assert!(apps[0].installed);
        assert_eq!(
            apps[0].source_dir,
            Some(DevicePath::new("/data/app/com.example.app-1/base.apk"))
        );

        assert!(apps[1].system);
        assert!(apps[1].enabled);

        assert!(!apps[2].installed);

        let settings = registry
            .get_application("com.android.settings")
            .expect("lookup");
        assert!(settings.map_or(false, |it| it.system));
    }

    #[rstest]
    fn test_no_device(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .returning(|_| Ok(cmd_output(1, "", "adb: no devices/emulators found\n")));
        let registry = AdbPackageRegistry::new(mock_adb);
        assert!(matches!(
            registry.installed_applications(),
            Err(crate::Error::NoAdbDevice)
        ));
    }

    #[rstest]
    fn test_get_package_registry(tmp_context: TestContext) {
        assert!(get_package_registry(&tmp_context).is_ok());

        let mut ctx = crate::testing::MockContext::new();
        ctx.expect_get_config().returning(|| Ok(None));
        ctx.expect_maybe_get_bin().returning(|_| None);
        assert!(matches!(
            get_package_registry(&ctx),
            Err(crate::Error::MissingBin(_))
        ));
    }
}
