use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{bounded, Receiver, RecvError, TryRecvError};

use crate::catalog::{build_catalog, AppEntry, Catalog};
use crate::favorites::Favorites;
use crate::registry::PackageRegistry;
use crate::store::{self, PreferenceStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
    Done,
    Cancelled,
}

struct RefreshTask {
    id: u64,
    cancelled: Arc<AtomicBool>,
    rx: Receiver<Catalog>,
}

/// Owns the current application catalog and refreshes it in the background
///
/// Only one refresh runs at a time. Results are installed by [poll] or
/// [wait], so readers always see a whole snapshot.
///
/// [poll]: CatalogController::poll
/// [wait]: CatalogController::wait
pub struct CatalogController {
    registry: Arc<dyn PackageRegistry>,
    store: Arc<dyn PreferenceStore>,
    favorites: Arc<Favorites>,
    catalog: Mutex<Catalog>,
    task: Mutex<Option<RefreshTask>>,
    state: AtomicCell<RefreshState>,
    next_id: AtomicCell<u64>,
}

impl CatalogController {
    pub fn new(registry: Arc<dyn PackageRegistry>, store: Arc<dyn PreferenceStore>) -> Self {
        let favorites = Arc::new(Favorites::new(Arc::clone(&store)));
        Self {
            registry,
            store,
            favorites,
            catalog: Mutex::new(Catalog::empty()),
            task: Mutex::new(None),
            state: AtomicCell::new(RefreshState::Idle),
            next_id: AtomicCell::new(0),
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state.load()
    }

    /// The most recently installed catalog
    pub fn catalog(&self) -> Catalog {
        self.catalog.lock().expect("poisoned").clone()
    }

    pub fn apps(&self) -> Arc<[AppEntry]> {
        self.catalog.lock().expect("poisoned").snapshot()
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn show_system_apps(&self) -> bool {
        store::show_system_apps(self.store.as_ref())
    }

    /// Start building a new catalog in the background.
    ///
    /// Returns `false` without doing anything if a refresh that hasn't been
    /// cancelled is still pending.
    pub fn start_refresh(&self) -> bool {
        let mut task = self.task.lock().expect("poisoned");
        if let Some(current) = task.as_ref() {
            if !current.cancelled.load(Ordering::SeqCst) {
                log::debug!("refresh {} already in flight", current.id);
                return false;
            }
        }

        let id = self.next_id.fetch_add(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);

        let show_system = self.show_system_apps();
        let registry = Arc::clone(&self.registry);
        let favorites = Arc::clone(&self.favorites);
        let worker_cancelled = Arc::clone(&cancelled);

        let spawned = thread::Builder::new()
            .name(format!("catalog-refresh-{}", id))
            .spawn(move || {
                let catalog = build_catalog(registry.as_ref(), &favorites, show_system);
                if worker_cancelled.load(Ordering::SeqCst) {
                    log::debug!("refresh {} cancelled, dropping result", id);
                    return;
                }
                // The receiver is gone if the task was replaced
                let _ = tx.send(catalog);
            });

        if let Err(e) = spawned {
            log::error!("failed to spawn refresh worker: {}", e);
            return false;
        }

        log::debug!("started refresh {}", id);
        *task = Some(RefreshTask { id, cancelled, rx });
        self.state.store(RefreshState::Refreshing);
        true
    }

    /// Cancel the pending refresh, its result will be discarded
    pub fn cancel_refresh(&self) {
        let mut task = self.task.lock().expect("poisoned");
        if let Some(current) = task.take() {
            log::debug!("cancelling refresh {}", current.id);
            current.cancelled.store(true, Ordering::SeqCst);
            self.state.store(RefreshState::Cancelled);
        }
    }

    /// Install the result of the pending refresh if it is ready. Returns
    /// whether a new catalog was installed.
    pub fn poll(&self) -> bool {
        let mut task = self.task.lock().expect("poisoned");
        let res = match task.as_ref() {
            Some(current) => current.rx.try_recv(),
            None => return false,
        };
        match res {
            Ok(catalog) => {
                *task = None;
                self.install(catalog);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                log::error!("refresh worker exited without a result");
                *task = None;
                self.state.store(RefreshState::Idle);
                false
            }
        }
    }

    /// Block until the pending refresh finishes and install its result.
    /// Returns whether a new catalog was installed.
    pub fn wait(&self) -> bool {
        let (id, rx) = match self.task.lock().expect("poisoned").as_ref() {
            Some(current) => (current.id, current.rx.clone()),
            None => return false,
        };

        let res = rx.recv();

        let mut task = self.task.lock().expect("poisoned");
        if task.as_ref().map(|it| it.id) != Some(id) {
            // Cancelled or replaced while we were waiting
            return false;
        }
        *task = None;
        match res {
            Ok(catalog) => {
                self.install(catalog);
                true
            }
            Err(RecvError) => {
                log::error!("refresh worker exited without a result");
                self.state.store(RefreshState::Idle);
                false
            }
        }
    }

    fn install(&self, catalog: Catalog) {
        log::debug!("installing catalog with {} entries", catalog.len());
        let mut current = self.catalog.lock().expect("poisoned");
        // Favorites may have changed after the worker read them
        *current = catalog.with_favorites(&self.favorites);
        self.state.store(RefreshState::Done);
    }

    /// Change the favorite flag of `package`, persisting it and updating
    /// the installed catalog
    pub fn set_favorite(&self, package: &str, favorite: bool) -> crate::Result<()> {
        self.favorites.set_favorite(package, favorite)?;
        let mut catalog = self.catalog.lock().expect("poisoned");
        if catalog.find(package).is_some() {
            *catalog = catalog.with_favorite(package, favorite);
        }
        Ok(())
    }

    /// Flip the system applications setting and refresh. The setting is
    /// reverted if the refresh couldn't be started.
    ///
    /// Returns the new value of the setting.
    pub fn toggle_show_system_apps(&self) -> crate::Result<bool> {
        let show = !self.show_system_apps();
        store::set_show_system_apps(self.store.as_ref(), show)?;
        if self.start_refresh() {
            return Ok(show);
        }
        log::info!("refresh already running, keeping previous setting");
        store::set_show_system_apps(self.store.as_ref(), !show)?;
        Ok(!show)
    }
}

impl Drop for CatalogController {
    fn drop(&mut self) {
        self.cancel_refresh();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::ApplicationInfo;
    use crate::store::JsonPreferenceStore;
    use crate::testing::{mock_package_registry, MockPackageRegistry};
    use crossbeam::channel::{Receiver, Sender};
    use rstest::*;
    use std::time::Duration;

    fn app(package: &str, label: &str, system: bool) -> ApplicationInfo {
        let mut info = ApplicationInfo::new(package);
        info.label = label.into();
        info.system = system;
        info
    }

    fn sample_apps() -> Vec<ApplicationInfo> {
        vec![
            app("com.example.b", "Bravo", false),
            app("com.example.a", "Alpha", false),
            app("com.android.settings", "Settings", true),
        ]
    }

    /// Registry that blocks until the test opens the gate
    struct GatedRegistry {
        gate: Receiver<()>,
    }

    impl PackageRegistry for GatedRegistry {
        fn installed_applications(&self) -> crate::Result<Vec<ApplicationInfo>> {
            let _ = self.gate.recv();
            Ok(sample_apps())
        }
    }

    fn gated() -> (Sender<()>, Arc<GatedRegistry>) {
        let (tx, rx) = crossbeam::channel::unbounded();
        (tx, Arc::new(GatedRegistry { gate: rx }))
    }

    fn packages(ctrl: &CatalogController) -> Vec<String> {
        ctrl.apps()
            .iter()
            .map(|it| it.package_name().to_string())
            .collect()
    }

    #[rstest]
    fn test_refresh(mut mock_package_registry: MockPackageRegistry) {
        mock_package_registry
            .expect_installed_applications()
            .returning(|| Ok(sample_apps()));
        let ctrl = CatalogController::new(
            Arc::new(mock_package_registry),
            Arc::new(JsonPreferenceStore::in_memory()),
        );
        assert_eq!(ctrl.state(), RefreshState::Idle);
        assert!(ctrl.apps().is_empty());
        assert!(!ctrl.wait());

        assert!(ctrl.start_refresh());
        assert!(ctrl.wait());
        assert_eq!(ctrl.state(), RefreshState::Done);
        assert_eq!(packages(&ctrl), vec!["com.example.a", "com.example.b"]);
        assert!(!ctrl.poll());
    }

    #[rstest]
    fn test_single_refresh_in_flight() {
        let (open, registry) = gated();
        let ctrl = CatalogController::new(registry, Arc::new(JsonPreferenceStore::in_memory()));

        assert!(ctrl.start_refresh());
        assert!(!ctrl.start_refresh());
        assert_eq!(ctrl.state(), RefreshState::Refreshing);
        assert!(!ctrl.poll());

        open.send(()).expect("open gate");
        assert!(ctrl.wait());
        assert_eq!(ctrl.apps().len(), 2);
        assert!(ctrl.start_refresh());
        open.send(()).expect("open gate");
        assert!(ctrl.wait());
    }

    #[rstest]
    fn test_cancel_discards_result() {
        let (open, registry) = gated();
        let ctrl = CatalogController::new(registry, Arc::new(JsonPreferenceStore::in_memory()));

        assert!(ctrl.start_refresh());
        ctrl.cancel_refresh();
        assert_eq!(ctrl.state(), RefreshState::Cancelled);
        assert!(!ctrl.poll());
        assert!(!ctrl.wait());

        // A cancelled refresh doesn't block a new one
        assert!(ctrl.start_refresh());
        open.send(()).expect("open first gate");
        open.send(()).expect("open second gate");
        assert!(ctrl.wait());
        assert_eq!(ctrl.state(), RefreshState::Done);
        assert_eq!(ctrl.apps().len(), 2);
    }

    #[rstest]
    fn test_toggle_show_system_apps() {
        let (open, registry) = gated();
        let store = Arc::new(JsonPreferenceStore::in_memory());
        let ctrl = CatalogController::new(registry, store.clone());

        assert!(ctrl.toggle_show_system_apps().expect("toggle"));
        assert!(store::show_system_apps(store.as_ref()));

        // A refresh is in flight so the toggle is rolled back
        assert!(ctrl.toggle_show_system_apps().expect("toggle"));
        assert!(ctrl.show_system_apps());

        open.send(()).expect("open gate");
        assert!(ctrl.wait());
        assert_eq!(ctrl.apps().len(), 3);

        assert!(!ctrl.toggle_show_system_apps().expect("toggle"));
        open.send(()).expect("open gate");
        assert!(ctrl.wait());
        assert_eq!(ctrl.apps().len(), 2);
    }

    #[rstest]
    fn test_set_favorite_updates_catalog(mut mock_package_registry: MockPackageRegistry) {
        mock_package_registry
            .expect_installed_applications()
            .returning(|| Ok(sample_apps()));
        let store = Arc::new(JsonPreferenceStore::in_memory());
        let ctrl = CatalogController::new(Arc::new(mock_package_registry), store.clone());
        assert!(ctrl.start_refresh());
        assert!(ctrl.wait());

        ctrl.set_favorite("com.example.b", true).expect("favorite");
        assert_eq!(packages(&ctrl), vec!["com.example.b", "com.example.a"]);
        assert!(ctrl.apps()[0].favorite);
        assert!(ctrl.favorites().is_favorite("com.example.b"));

        // Persisted and picked up by the next refresh
        assert!(ctrl.start_refresh());
        assert!(ctrl.wait());
        assert!(ctrl.apps()[0].favorite);

        ctrl.set_favorite("com.example.b", false).expect("unfavorite");
        assert_eq!(packages(&ctrl), vec!["com.example.a", "com.example.b"]);
        assert!(!store.contains(crate::favorites::FAVORITES_KEY));
    }

    #[rstest]
    fn test_favorite_set_before_install(mut mock_package_registry: MockPackageRegistry) {
        mock_package_registry
            .expect_installed_applications()
            .returning(|| Ok(sample_apps()));
        let ctrl = CatalogController::new(
            Arc::new(mock_package_registry),
            Arc::new(JsonPreferenceStore::in_memory()),
        );
        assert!(ctrl.start_refresh());

        // Let the worker finish building without installing its result
        loop {
            let ready = ctrl
                .task
                .lock()
                .expect("poisoned")
                .as_ref()
                .map_or(false, |it| !it.rx.is_empty());
            if ready {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        ctrl.set_favorite("com.example.b", true).expect("favorite");
        assert!(ctrl.poll());
        assert_eq!(packages(&ctrl), vec!["com.example.b", "com.example.a"]);
        assert!(ctrl.apps()[0].favorite);
        assert!(!ctrl.apps()[1].favorite);
    }
}
