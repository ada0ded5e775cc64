use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::favorites::Favorites;
use crate::registry::{ApplicationInfo, PackageRegistry};
use crate::utils::DevicePath;

/// Grouping character of favorite applications
pub const FAVORITE_HEADER: char = '☆';

/// Grouping character of labels that don't start with a letter
pub const OTHER_HEADER: char = '#';

/// An application as shown in the list
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppEntry {
    #[serde(flatten)]
    pub info: ApplicationInfo,
    pub favorite: bool,
}

impl AppEntry {
    pub fn new(info: ApplicationInfo, favorite: bool) -> Self {
        Self { info, favorite }
    }

    pub fn package_name(&self) -> &str {
        &self.info.package_name
    }

    pub fn label(&self) -> &str {
        &self.info.label
    }

    /// Where the launcher icon can be found
    pub fn icon(&self) -> Option<&DevicePath> {
        self.info.source_dir.as_ref()
    }

    /// The sticky header this entry is listed under
    pub fn header_char(&self) -> char {
        if self.favorite {
            return FAVORITE_HEADER;
        }
        match self.info.label.chars().next() {
            Some(c) if c.is_alphabetic() => c.to_uppercase().next().unwrap_or(c),
            _ => OTHER_HEADER,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.info.label.to_lowercase().contains(needle)
            || self.info.package_name.to_lowercase().contains(needle)
    }
}

/// Catalog ordering: favorites first, then by label ignoring case, then by
/// label, then by package name
pub fn compare_entries(a: &AppEntry, b: &AppEntry) -> Ordering {
    b.favorite
        .cmp(&a.favorite)
        .then_with(|| a.info.label.to_lowercase().cmp(&b.info.label.to_lowercase()))
        .then_with(|| a.info.label.cmp(&b.info.label))
        .then_with(|| a.info.package_name.cmp(&b.info.package_name))
}

/// An immutable, sorted snapshot of the applications on the device
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Arc<[AppEntry]>,
}

impl Catalog {
    /// Sort `entries` into a new catalog
    pub fn new(mut entries: Vec<AppEntry>) -> Self {
        entries.sort_by(compare_entries);
        Self {
            entries: entries.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[AppEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Arc<[AppEntry]> {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppEntry> {
        self.entries.iter()
    }

    /// Entries whose label or package name contains `query`, ignoring case
    /// and surrounding whitespace
    pub fn filter(&self, query: Option<&str>) -> Vec<&AppEntry> {
        let needle = query.map(|it| it.trim().to_lowercase()).unwrap_or_default();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries.iter().filter(|it| it.matches(&needle)).collect()
    }

    pub fn find(&self, package: &str) -> Option<&AppEntry> {
        self.entries.iter().find(|it| it.info.package_name == package)
    }

    pub fn find_icon(&self, package: &str) -> Option<&DevicePath> {
        self.find(package)?.icon()
    }

    /// Copy of this catalog with the favorite flag of `package` changed
    pub(crate) fn with_favorite(&self, package: &str, favorite: bool) -> Self {
        let entries = self
            .entries
            .iter()
            .cloned()
            .map(|mut it| {
                if it.info.package_name == package {
                    it.favorite = favorite;
                }
                it
            })
            .collect();
        Self::new(entries)
    }

    /// The catalog with every favorite flag taken from `favorites`
    pub(crate) fn with_favorites(self, favorites: &Favorites) -> Self {
        let current = self
            .entries
            .iter()
            .all(|it| it.favorite == favorites.is_favorite(it.package_name()));
        if current {
            return self;
        }
        let entries = self
            .entries
            .iter()
            .cloned()
            .map(|mut it| {
                it.favorite = favorites.is_favorite(it.package_name());
                it
            })
            .collect();
        Self::new(entries)
    }
}

/// Query the registry and build a sorted catalog
///
/// System applications are only kept when `show_system_apps` is set. A
/// registry that can't be queried results in an empty catalog.
pub fn build_catalog(
    registry: &dyn PackageRegistry,
    favorites: &Favorites,
    show_system_apps: bool,
) -> Catalog {
    let apps = match registry.installed_applications() {
        Ok(v) => v,
        Err(e) => {
            log::warn!("package registry unavailable: {}", e);
            return Catalog::empty();
        }
    };

    let entries = apps
        .into_iter()
        .filter(|it| show_system_apps || !it.system)
        .map(|it| {
            let favorite = favorites.is_favorite(&it.package_name);
            AppEntry::new(it, favorite)
        })
        .collect::<Vec<AppEntry>>();

    Catalog::new(entries)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::JsonPreferenceStore;
    use crate::testing::{mock_package_registry, MockPackageRegistry};
    use rstest::*;

    fn app(package: &str, label: &str, system: bool) -> ApplicationInfo {
        let mut info = ApplicationInfo::new(package);
        info.label = label.into();
        info.system = system;
        info
    }

    fn favorites(packages: &[&str]) -> Favorites {
        let favorites = Favorites::new(Arc::new(JsonPreferenceStore::in_memory()));
        for pkg in packages {
            favorites.set_favorite(pkg, true).expect("set favorite");
        }
        favorites
    }

    fn packages(catalog: &Catalog) -> Vec<&str> {
        catalog.iter().map(|it| it.package_name()).collect()
    }

    #[rstest]
    fn test_ordering(mut mock_package_registry: MockPackageRegistry) {
        mock_package_registry.expect_installed_applications().returning(|| {
            Ok(vec![
                app("com.b", "beta", false),
                app("com.a2", "Alpha", false),
                app("com.a1", "alpha", false),
                app("com.z", "Zulu", false),
                app("com.fav", "yankee", false),
                app("com.sys", "System", true),
            ])
        });

        let catalog = build_catalog(&mock_package_registry, &favorites(&["com.fav"]), false);
        assert_eq!(
            packages(&catalog),
            vec!["com.fav", "com.a2", "com.a1", "com.b", "com.z"]
        );
        assert!(catalog.entries()[0].favorite);
        assert_eq!(catalog.entries()[0].header_char(), FAVORITE_HEADER);
        assert_eq!(catalog.entries()[1].header_char(), 'A');
        assert_eq!(catalog.entries()[2].header_char(), 'A');

        let with_system = build_catalog(&mock_package_registry, &favorites(&[]), true);
        assert_eq!(with_system.len(), 6);
        assert!(with_system.find("com.sys").is_some());
    }

    #[rstest]
    fn test_same_label_by_package(mut mock_package_registry: MockPackageRegistry) {
        mock_package_registry.expect_installed_applications().returning(|| {
            Ok(vec![app("com.y", "Same", false), app("com.x", "Same", false)])
        });
        let catalog = build_catalog(&mock_package_registry, &favorites(&[]), false);
        assert_eq!(packages(&catalog), vec!["com.x", "com.y"]);
    }

    #[rstest]
    fn test_registry_unavailable(mut mock_package_registry: MockPackageRegistry) {
        mock_package_registry
            .expect_installed_applications()
            .returning(|| Err(crate::Error::NoAdbDevice));
        let catalog = build_catalog(&mock_package_registry, &favorites(&[]), true);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_header_char() {
        assert_eq!(AppEntry::new(app("a", "élan", false), false).header_char(), 'É');
        assert_eq!(AppEntry::new(app("a", "9gag", false), false).header_char(), OTHER_HEADER);
        assert_eq!(AppEntry::new(app("a", "", false), false).header_char(), OTHER_HEADER);
        assert_eq!(AppEntry::new(app("a", "9gag", false), true).header_char(), FAVORITE_HEADER);
    }

    #[test]
    fn test_filter() {
        let mut maps = app("com.google.android.apps.maps", "Maps", false);
        maps.source_dir = Some(DevicePath::new("/data/app/maps/base.apk"));
        let catalog = Catalog::new(vec![
            AppEntry::new(maps, false),
            AppEntry::new(app("com.example.mail", "Mail", false), false),
            AppEntry::new(app("org.fdroid", "F-Droid", false), false),
        ]);

        let labels = |q: Option<&str>| {
            catalog
                .filter(q)
                .into_iter()
                .map(|it| it.label().to_string())
                .collect::<Vec<String>>()
        };
        assert_eq!(labels(Some("  MA ")), vec!["Mail", "Maps"]);
        assert_eq!(labels(Some("google")), vec!["Maps"]);
        assert_eq!(labels(Some("nothing")), Vec::<String>::new());
        assert_eq!(labels(None).len(), 3);
        assert_eq!(labels(Some("   ")).len(), 3);

        assert_eq!(
            catalog.find_icon("com.google.android.apps.maps"),
            Some(&DevicePath::new("/data/app/maps/base.apk"))
        );
        assert_eq!(catalog.find_icon("org.fdroid"), None);
        assert_eq!(catalog.find_icon("com.missing"), None);
    }

    #[test]
    fn test_with_favorite_resorts() {
        let catalog = Catalog::new(vec![
            AppEntry::new(app("com.a", "A", false), false),
            AppEntry::new(app("com.z", "Z", false), false),
        ]);
        let updated = catalog.with_favorite("com.z", true);
        assert_eq!(packages(&updated), vec!["com.z", "com.a"]);
        assert_eq!(packages(&catalog), vec!["com.a", "com.z"]);
    }

    #[test]
    fn test_with_favorites_reapplies_flags() {
        let catalog = Catalog::new(vec![
            AppEntry::new(app("com.a", "A", false), true),
            AppEntry::new(app("com.z", "Z", false), false),
        ]);

        let unchanged = catalog.clone().with_favorites(&favorites(&["com.a"]));
        assert!(Arc::ptr_eq(&unchanged.snapshot(), &catalog.snapshot()));

        let updated = catalog.with_favorites(&favorites(&["com.z"]));
        assert_eq!(packages(&updated), vec!["com.z", "com.a"]);
        assert!(updated.entries()[0].favorite);
        assert!(!updated.entries()[1].favorite);
    }
}
