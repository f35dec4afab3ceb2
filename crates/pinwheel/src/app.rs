use crate::appearance::{Appearance, FontSize};
use crate::config::{self, Settings};
use crate::configurations::{
    self, ConfigurationRepository, LoadedConfiguration, Persistence, Snapshot,
};
use crate::error::WheelError;
use crate::events::{AppEvent, NoticeLevel, WheelEvent};
use crate::interruption::{Disruption, InterruptionPolicy};
use crate::layout::{LayoutSettings, WheelLayout};
use crate::presenter::RotationProbe;
use crate::segments::{Segment, SegmentStore};
use crate::spin::{SpinEngine, SpinSource};
use crate::storage::{SharedStore, StorageError};
use async_channel::{Receiver, Sender};
use spinctl::protocol::Command;
use spinctl::types::{ConfigName, ImageRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A failed write still counts as applied: the in-memory state already changed.
fn took_effect<T>(result: &Result<T, WheelError>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => e.is_non_fatal(),
    }
}

/// The wheel controller. Owns every piece of state and is driven by one task.
pub struct Wheel {
    segments: SegmentStore,
    appearance: Appearance,
    configurations: ConfigurationRepository,
    engine: SpinEngine,
    interruption: InterruptionPolicy,
    layout: LayoutSettings,
    probe: Option<Arc<dyn RotationProbe>>,
    events: Sender<WheelEvent>,
}

impl Wheel {
    pub fn new(
        store: SharedStore,
        settings: &Settings,
        source: Box<dyn SpinSource>,
        app_tx: Sender<AppEvent>,
        events: Sender<WheelEvent>,
    ) -> Self {
        Self {
            segments: SegmentStore::load(store.clone()),
            appearance: Appearance::load(store.clone()),
            configurations: ConfigurationRepository::load(store),
            engine: SpinEngine::new(settings.spin_tuning(), source),
            interruption: InterruptionPolicy::new(settings.interruption, app_tx),
            layout: settings.layout,
            probe: None,
            events,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn RotationProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Announces the loaded state so a fresh presenter can draw it.
    pub fn start(&mut self) {
        log::info!(
            "Wheel ready with {} segments and {} saved configurations",
            self.segments.len(),
            self.configurations.list_names().len()
        );
        self.segments_changed();
        self.appearance_changed();
        self.configurations_changed();
    }

    pub fn segments(&self) -> &[Segment] {
        self.segments.segments()
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    pub fn engine(&self) -> &SpinEngine {
        &self.engine
    }

    pub fn configuration_names(&self) -> Vec<ConfigName> {
        self.configurations.list_names()
    }

    pub fn layout(&self) -> WheelLayout {
        WheelLayout::calculate(self.segments.segments(), &self.layout)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            segments: self.segments.segments().to_vec(),
            cap_image: self.appearance.cap_image().cloned(),
            font_size: self.appearance.font_size(),
        }
    }

    pub fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::Command(command) => self.execute(command),
            AppEvent::AnimationFinished { spin } => self.animation_finished(Some(spin)),
            AppEvent::QuietWindowElapsed(generation) => self.quiet_window_elapsed(generation),
            AppEvent::SettingsReload => match config::load_settings() {
                Ok(settings) => {
                    log::info!("Settings reloaded");
                    self.apply_settings(&settings);
                }
                Err(e) => log::error!("Failed to reload settings: {}", e),
            },
        }
    }

    pub fn execute(&mut self, command: Command) {
        log::debug!("Executing {:?}", command.verb());
        let result = match command {
            Command::Spin => {
                self.spin();
                Ok(())
            }
            Command::Add { text, image } => self.add_segment(&text, image),
            Command::Remove(index) => self.remove_segment(index),
            Command::ClearImage(index) => self.clear_segment_image(index),
            Command::Cap(image) => self.set_cap_image(Some(image)),
            Command::CapClear => self.set_cap_image(None),
            Command::FontSize(px) => self.set_font_size(FontSize::or_default(px as f64)),
            Command::Save(name) => self.save_configuration(&name),
            Command::Load(name) => self.load_configuration(&name),
            Command::Delete(name) => self.delete_configuration(&name),
            Command::List => {
                self.configurations_changed();
                Ok(())
            }
            Command::Export(path) => self.export_to(&path).map(|_| ()),
            Command::Import(path) => self.import_file(&path),
            Command::Scroll => {
                self.disrupt(Disruption::Scroll);
                Ok(())
            }
            Command::Resize => {
                self.disrupt(Disruption::Resize);
                Ok(())
            }
            Command::Finished => {
                self.animation_finished(None);
                Ok(())
            }
        };
        self.report(result);
    }

    pub fn add_segment(&mut self, text: &str, image: Option<ImageRef>) -> Result<(), WheelError> {
        let result = self.segments.add(text, image);
        if took_effect(&result) {
            self.segments_changed();
        }
        result
    }

    pub fn remove_segment(&mut self, index: usize) -> Result<(), WheelError> {
        let result = self.segments.remove_at(index);
        if !matches!(result, Ok(false)) && took_effect(&result) {
            self.segments_changed();
        }
        result.map(|_| ())
    }

    pub fn clear_segment_image(&mut self, index: usize) -> Result<(), WheelError> {
        let result = self.segments.clear_image_at(index);
        if !matches!(result, Ok(false)) && took_effect(&result) {
            self.segments_changed();
        }
        result.map(|_| ())
    }

    pub fn set_cap_image(&mut self, image: Option<ImageRef>) -> Result<(), WheelError> {
        let result = self.appearance.set_cap_image(image);
        self.appearance_changed();
        result
    }

    pub fn set_font_size(&mut self, size: FontSize) -> Result<(), WheelError> {
        let result = self.appearance.set_font_size(size);
        self.appearance_changed();
        result
    }

    /// Starts a spin unless one is in flight or there are fewer than two segments.
    pub fn spin(&mut self) {
        // A layout refresh still waiting on its quiet window happens now, not mid-spin.
        if !self.engine.is_spinning() && self.interruption.is_pending() {
            self.interruption.cancel();
            self.segments_changed();
        }

        let Some(request) = self.engine.request_spin(self.segments.len()) else {
            log::debug!(
                "Spin ignored ({} segments, spinning: {})",
                self.segments.len(),
                self.engine.is_spinning()
            );
            return;
        };
        log::info!(
            "Spin {}: {} turns + {:.1}° to {:.1}°",
            request.spin,
            request.cycles,
            request.extra_angle,
            request.target_rotation
        );
        self.emit(WheelEvent::SpinRequested {
            spin: request.spin,
            target_rotation: request.target_rotation,
            duration_ms: u64::try_from(request.duration.as_millis()).unwrap_or(u64::MAX),
        });
    }

    /// `spin` is `None` when the signal cannot name the spin it belongs to.
    pub fn animation_finished(&mut self, spin: Option<u64>) {
        let current = self.engine.current_spin();
        let Some(outcome) = self.engine.complete(spin, self.segments.segments()) else {
            return;
        };
        if let Some(spin) = current {
            log::info!("Spin {} resolved: {:?}", spin, outcome);
            self.emit(WheelEvent::SpinResolved { spin, outcome });
        }
    }

    pub fn disrupt(&mut self, kind: Disruption) {
        let spinning = self.engine.is_spinning();
        if !self.interruption.on_disruption(kind, spinning) || !spinning {
            return;
        }

        let displayed = self.probe.as_ref().and_then(|p| p.displayed_rotation());
        let spin = self.engine.current_spin();
        if let (Some(rotation), Some(spin)) = (self.engine.freeze(displayed), spin) {
            log::info!("Spin {} interrupted by {} at {:.1}°", spin, kind, rotation);
            self.emit(WheelEvent::SpinFrozen { spin, rotation });
        }
    }

    pub fn quiet_window_elapsed(&mut self, generation: u64) {
        let Some(kind) = self.interruption.take_elapsed(generation) else {
            return;
        };
        let spin = self.engine.current_spin();
        if let (Some(outcome), Some(spin)) = (self.engine.force_idle(), spin) {
            self.emit(WheelEvent::SpinResolved { spin, outcome });
        }
        log::debug!("Refreshing layout after {}", kind);
        self.segments_changed();
    }

    pub fn save_configuration(&mut self, name: &str) -> Result<(), WheelError> {
        let snapshot = self.snapshot();
        let result = self.configurations.save(name, &snapshot);
        if took_effect(&result) {
            self.configurations_changed();
        }
        let name = result?;
        self.notify(NoticeLevel::Info, format!("Configuration \"{name}\" saved!"));
        Ok(())
    }

    pub fn load_configuration(&mut self, name: &ConfigName) -> Result<(), WheelError> {
        let loaded = self.configurations.load_config(name, Persistence::Durable)?;
        self.apply(loaded)?;
        self.notify(NoticeLevel::Info, format!("Configuration \"{name}\" loaded!"));
        Ok(())
    }

    pub fn delete_configuration(&mut self, name: &ConfigName) -> Result<(), WheelError> {
        let result = self.configurations.delete(name);
        if took_effect(&result) {
            self.configurations_changed();
        }
        result?;
        self.notify(NoticeLevel::Info, format!("Configuration \"{name}\" deleted."));
        Ok(())
    }

    /// Writes the current state as an export document. A directory (or no path at all) gets
    /// a timestamped file inside it; any other path is used as given.
    pub fn export_to(&mut self, path: &Path) -> Result<PathBuf, WheelError> {
        let file = configurations::export(&self.snapshot())?;
        let target = if path.as_os_str().is_empty() || path.is_dir() {
            path.join(&file.file_name)
        } else {
            path.to_path_buf()
        };
        fs_err::write(&target, &file.contents).map_err(|e| WheelError::StorageQuota {
            what: "export",
            source: StorageError::Io(e),
        })?;
        self.notify(
            NoticeLevel::Info,
            format!("Exported configuration to {}", target.display()),
        );
        Ok(target)
    }

    pub fn import_file(&mut self, path: &Path) -> Result<(), WheelError> {
        if !configurations::is_importable(path) {
            return Err(WheelError::Validation(
                "Please select a .pinwheel or .json file.",
            ));
        }
        let text = fs_err::read_to_string(path)
            .map_err(|e| WheelError::Malformed(format!("could not read file: {e}")))?;
        self.import_text(&text)
    }

    /// Applies an import for this session only; the working state on disk is untouched.
    pub fn import_text(&mut self, text: &str) -> Result<(), WheelError> {
        let report = configurations::import_from_text(text)?;
        for fallback in &report.fallbacks {
            self.notify(
                NoticeLevel::Warning,
                format!("Imported {fallback} was invalid, using the default."),
            );
        }
        self.apply(LoadedConfiguration {
            snapshot: report.snapshot,
            persistence: Persistence::SessionOnly,
        })?;
        self.notify(NoticeLevel::Info, "Configuration imported!".to_string());
        Ok(())
    }

    pub fn apply(&mut self, loaded: LoadedConfiguration) -> Result<(), WheelError> {
        let durable = loaded.persistence.is_durable();
        let Snapshot {
            segments,
            cap_image,
            font_size,
        } = loaded.snapshot;

        let segments = self.segments.replace(segments, durable);
        let appearance = self.appearance.replace(cap_image, font_size, durable);
        self.segments_changed();
        self.appearance_changed();
        segments.and(appearance)
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.engine.set_tuning(settings.spin_tuning());
        self.interruption.set_windows(settings.interruption);
        if self.layout != settings.layout {
            self.layout = settings.layout;
            self.segments_changed();
        }
    }

    fn segments_changed(&mut self) {
        self.engine.reset();
        self.emit(WheelEvent::SegmentsChanged {
            layout: self.layout(),
        });
    }

    fn appearance_changed(&self) {
        self.emit(WheelEvent::AppearanceChanged {
            cap_image: self.appearance.cap_image().cloned(),
            font_size: self.appearance.font_size(),
        });
    }

    fn configurations_changed(&self) {
        self.emit(WheelEvent::ConfigurationListChanged {
            names: self.configurations.list_names(),
        });
    }

    fn report(&self, result: Result<(), WheelError>) {
        if let Err(e) = result {
            let level = if e.is_non_fatal() {
                NoticeLevel::Warning
            } else {
                NoticeLevel::Error
            };
            log::warn!("{}", e);
            self.notify(level, e.to_string());
        }
    }

    fn notify(&self, level: NoticeLevel, message: String) {
        self.emit(WheelEvent::Notice { level, message });
    }

    fn emit(&self, event: WheelEvent) {
        if let Err(e) = self.events.try_send(event) {
            log::warn!("Dropping wheel event: {}", e);
        }
    }
}

pub async fn run(mut wheel: Wheel, rx: Receiver<AppEvent>) {
    wheel.start();
    while let Ok(event) = rx.recv().await {
        wheel.handle(event);
    }
    log::info!("Event channel closed, stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spin::SpinOutcome;
    use crate::spin::engine::tests::Scripted;
    use crate::storage::{KeyValueStore, MemoryStore, keys};

    struct Harness {
        wheel: Wheel,
        memory: Arc<MemoryStore>,
        events: Receiver<WheelEvent>,
    }

    impl Harness {
        fn new(memory: Arc<MemoryStore>, draws: &[f64]) -> Self {
            let (app_tx, _app_rx) = async_channel::unbounded();
            let (events_tx, events) = async_channel::unbounded();
            let wheel = Wheel::new(
                memory.clone(),
                &Settings::default(),
                Box::new(Scripted::new(draws)),
                app_tx,
                events_tx,
            );
            Self {
                wheel,
                memory,
                events,
            }
        }

        fn drain(&self) -> Vec<WheelEvent> {
            std::iter::from_fn(|| self.events.try_recv().ok()).collect()
        }

        fn notices(&self) -> Vec<(NoticeLevel, String)> {
            self.drain()
                .into_iter()
                .filter_map(|event| match event {
                    WheelEvent::Notice { level, message } => Some((level, message)),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_start_announces_state() {
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        h.wheel.start();
        let events = h.drain();
        assert!(matches!(
            &events[0],
            WheelEvent::SegmentsChanged { layout } if layout.segments.len() == 8
        ));
        assert!(matches!(events[1], WheelEvent::AppearanceChanged { .. }));
        assert!(matches!(
            &events[2],
            WheelEvent::ConfigurationListChanged { names } if names.is_empty()
        ));
    }

    #[test]
    fn test_validation_becomes_a_notice() {
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        h.wheel.execute(Command::Add {
            text: "  ".to_string(),
            image: None,
        });
        assert_eq!(
            h.notices(),
            vec![(
                NoticeLevel::Error,
                "Please enter text for the spinner item.".to_string()
            )]
        );
        assert_eq!(h.wheel.segments().len(), 8);
    }

    #[test]
    fn test_quota_failure_is_a_warning_and_still_applies() {
        let mut h = Harness::new(Arc::new(MemoryStore::with_quota(32)), &[0.0]);
        h.wheel.execute(Command::Add {
            text: "Tacos".to_string(),
            image: None,
        });

        let events = h.drain();
        assert!(matches!(
            &events[0],
            WheelEvent::SegmentsChanged { layout } if layout.segments.len() == 9
        ));
        assert!(matches!(
            &events[1],
            WheelEvent::Notice { level: NoticeLevel::Warning, message }
                if message.starts_with("Could not save segments")
        ));
        assert_eq!(h.wheel.segments()[8].text, "Tacos");
    }

    #[test]
    fn test_out_of_bounds_remove_is_silent() {
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        h.wheel.execute(Command::Remove(99));
        assert!(h.drain().is_empty());
        assert!(!h.memory.contains(keys::SEGMENTS));
    }

    #[test]
    fn test_spin_resolves_on_finish() {
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0, 0.0]);
        h.wheel.execute(Command::Spin);
        assert_eq!(
            h.drain(),
            vec![WheelEvent::SpinRequested {
                spin: 1,
                target_rotation: 3600.0,
                duration_ms: 6000,
            }]
        );

        h.wheel.execute(Command::Spin);
        assert!(h.drain().is_empty());

        h.wheel.handle(AppEvent::AnimationFinished { spin: 1 });
        let segment = h.wheel.segments()[0].clone();
        assert_eq!(
            h.drain(),
            vec![WheelEvent::SpinResolved {
                spin: 1,
                outcome: SpinOutcome::Winner { index: 0, segment },
            }]
        );
        assert_eq!(h.wheel.engine().winner(), Some(0));
    }

    #[test]
    fn test_removing_segments_mid_spin_reports_error() {
        let memory = Arc::new(MemoryStore::new());
        memory.set(keys::SEGMENTS, r#"["A","B"]"#).unwrap();
        let mut h = Harness::new(memory, &[0.3, 0.3]);

        h.wheel.spin();
        h.wheel.remove_segment(0).unwrap();
        assert!(h.wheel.engine().is_spinning());
        h.drain();

        h.wheel.animation_finished(None);
        assert_eq!(
            h.drain(),
            vec![WheelEvent::SpinResolved {
                spin: 1,
                outcome: SpinOutcome::Error { segment_count: 1 },
            }]
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        h.wheel.set_cap_image(Some(ImageRef::from("data:cap"))).unwrap();
        h.wheel.set_font_size(FontSize::or_default(26.0)).unwrap();
        h.wheel.save_configuration(" party ").unwrap();
        let saved = h.wheel.snapshot();

        h.wheel.add_segment("Extra", None).unwrap();
        h.wheel.set_cap_image(None).unwrap();
        h.wheel.set_font_size(FontSize::default()).unwrap();
        h.drain();

        h.wheel.load_configuration(&ConfigName::from("party")).unwrap();
        assert_eq!(h.wheel.snapshot(), saved);
        assert_eq!(
            h.memory.get(keys::CAP_IMAGE).unwrap().as_deref(),
            Some("data:cap")
        );
        assert_eq!(h.memory.get(keys::FONT_SIZE).unwrap().as_deref(), Some("26"));
        assert!(h.notices().contains(&(
            NoticeLevel::Info,
            "Configuration \"party\" loaded!".to_string()
        )));
    }

    #[test]
    fn test_missing_configuration_changes_nothing() {
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        let before = h.wheel.snapshot();
        h.wheel.execute(Command::Load(ConfigName::from("nope")));
        h.wheel.execute(Command::Delete(ConfigName::from("nope")));
        assert_eq!(h.wheel.snapshot(), before);
        assert_eq!(
            h.notices(),
            vec![
                (
                    NoticeLevel::Error,
                    "Configuration \"nope\" not found".to_string()
                ),
                (
                    NoticeLevel::Error,
                    "Configuration \"nope\" not found".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_import_is_session_only() {
        let memory = Arc::new(MemoryStore::new());
        let mut h = Harness::new(memory.clone(), &[0.0]);
        h.wheel
            .import_text(r#"{"segments": ["X", "Y"], "capImageDataUrl": "data:i", "fontSize": 9}"#)
            .unwrap();

        assert_eq!(
            h.wheel.segments(),
            &[Segment::new("X", None), Segment::new("Y", None)]
        );
        assert_eq!(h.wheel.appearance().font_size().px(), 9);
        assert_eq!(memory.used_bytes(), 0);
    }

    #[test]
    fn test_import_reports_each_fallback() {
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        h.wheel
            .import_text(r#"{"segments": {}, "fontSize": 22}"#)
            .unwrap();
        assert_eq!(h.wheel.segments().len(), 8);
        assert_eq!(h.wheel.appearance().font_size().px(), 22);

        let notices = h.notices();
        assert_eq!(
            notices[0],
            (
                NoticeLevel::Warning,
                "Imported segments was invalid, using the default.".to_string()
            )
        );
        assert_eq!(
            notices.last().map(|(level, _)| *level),
            Some(NoticeLevel::Info)
        );
    }

    #[test]
    fn test_export_then_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        h.wheel.add_segment("Sushi", None).unwrap();
        let exported = h.wheel.export_to(dir.path()).unwrap();
        assert_eq!(exported.parent(), Some(dir.path()));
        assert!(configurations::is_importable(&exported));
        let expected = h.wheel.snapshot();

        let mut fresh = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        fresh.wheel.import_file(&exported).unwrap();
        assert_eq!(fresh.wheel.snapshot(), expected);

        let text = dir.path().join("notes.txt");
        fs_err::write(&text, "{}").unwrap();
        assert!(matches!(
            fresh.wheel.import_file(&text),
            Err(WheelError::Validation(_))
        ));
    }

    #[test]
    fn test_layout_settings_reload_rebuilds() {
        let mut h = Harness::new(Arc::new(MemoryStore::new()), &[0.0]);
        let mut settings = Settings::default();
        settings.layout.wheel_width = 500.0;
        h.wheel.apply_settings(&settings);
        assert!(matches!(
            &h.drain()[..],
            [WheelEvent::SegmentsChanged { layout }] if layout.radius == 250.0
        ));

        h.wheel.apply_settings(&settings);
        assert!(h.drain().is_empty());
    }
}
