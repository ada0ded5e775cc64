use mockall::mock;
use rstest::fixture;

use crate::registry::ApplicationInfo;
use crate::rootshell::FileStat;
use crate::utils::DevicePath;

mock! {
    pub RootShell {

    }

    impl crate::rootshell::RootShell for RootShell {
        fn connected(&self) -> bool;
        fn reconnect(&self) -> bool;
        fn stat(&self, path: &DevicePath) -> crate::Result<Option<FileStat>>;
        fn list_entries(&self, path: &DevicePath) -> crate::Result<Vec<FileStat>>;
        fn read_file(&self, path: &DevicePath) -> crate::Result<String>;
        fn write_file(&self, path: &DevicePath, content: &str) -> crate::Result<()>;
    }
}

mock! {
    pub PackageRegistry {

    }

    impl crate::registry::PackageRegistry for PackageRegistry {
        fn installed_applications(&self) -> crate::Result<Vec<ApplicationInfo>>;
        fn get_application(&self, package: &str) -> crate::Result<Option<ApplicationInfo>>;
    }
}

#[fixture]
pub fn mock_root_shell() -> MockRootShell {
    MockRootShell::new()
}

#[fixture]
pub fn mock_package_registry() -> MockPackageRegistry {
    MockPackageRegistry::new()
}
