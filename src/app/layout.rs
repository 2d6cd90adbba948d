//! Layout model: five regions of owned widgets.
//!
//! The layout owns every widget added to the shell. A widget key is resident
//! in exactly one region's ordered sequence; moving it between regions is
//! the only sanctioned reparenting path and transfers ownership wholesale.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use super::widget::Widget;

slotmap::new_key_type! {
    pub struct WidgetKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Top,
    Left,
    Right,
    Bottom,
    Main,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Top,
        Region::Left,
        Region::Right,
        Region::Bottom,
        Region::Main,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Region::Top => "top",
            Region::Left => "left",
            Region::Right => "right",
            Region::Bottom => "bottom",
            Region::Main => "main",
        }
    }

    fn slot(self) -> usize {
        match self {
            Region::Top => 0,
            Region::Left => 1,
            Region::Right => 2,
            Region::Bottom => 3,
            Region::Main => 4,
        }
    }
}

/// Mutable arrangement state of a region. `size` is columns for the side
/// regions and rows for top/bottom; the main region ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConfig {
    pub visible: bool,
    pub size: u16,
}

impl RegionConfig {
    fn default_for(region: Region) -> Self {
        let size = match region {
            Region::Left | Region::Right => 32,
            Region::Bottom => 8,
            Region::Top | Region::Main => 1,
        };
        Self {
            visible: true,
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    /// Position within the region's sequence; appended when absent.
    pub index: Option<usize>,
    /// Activate the widget right after insertion.
    pub activate: bool,
}

struct WidgetEntry {
    widget: Box<dyn Widget>,
    region: Region,
}

pub struct LayoutState {
    widgets: SlotMap<WidgetKey, WidgetEntry>,
    regions: [Vec<WidgetKey>; 5],
    configs: [RegionConfig; 5],
    current: Option<WidgetKey>,
    focused: Option<WidgetKey>,
}

impl LayoutState {
    pub fn new() -> Self {
        Self {
            widgets: SlotMap::with_key(),
            regions: Default::default(),
            configs: Region::ALL.map(RegionConfig::default_for),
            current: None,
            focused: None,
        }
    }

    pub fn add_widget(
        &mut self,
        widget: Box<dyn Widget>,
        region: Region,
        options: AddOptions,
    ) -> WidgetKey {
        let key = self.widgets.insert(WidgetEntry { widget, region });
        let slot = &mut self.regions[region.slot()];
        let index = options.index.unwrap_or(slot.len()).min(slot.len());
        slot.insert(index, key);

        if let Some(entry) = self.widgets.get_mut(key) {
            entry.widget.on_attach(region);
            tracing::debug!(widget = entry.widget.id(), region = region.name(), "widget added");
        }
        key
    }

    /// Reparents a widget. The key leaves its old region's sequence before
    /// entering the new one, so it is never resident in two regions. Returns
    /// false for unknown keys.
    pub fn move_widget(&mut self, key: WidgetKey, region: Region, options: AddOptions) -> bool {
        let Some(old_region) = self.widgets.get(key).map(|entry| entry.region) else {
            return false;
        };

        self.regions[old_region.slot()].retain(|k| *k != key);
        let slot = &mut self.regions[region.slot()];
        let index = options.index.unwrap_or(slot.len()).min(slot.len());
        slot.insert(index, key);

        if let Some(entry) = self.widgets.get_mut(key) {
            entry.widget.on_detach();
            entry.region = region;
            entry.widget.on_attach(region);
        }

        if region != Region::Main && self.current == Some(key) {
            self.current = None;
        }
        true
    }

    pub fn remove_widget(&mut self, key: WidgetKey) -> Option<Box<dyn Widget>> {
        let mut entry = self.widgets.remove(key)?;
        self.regions[entry.region.slot()].retain(|k| *k != key);
        if self.current == Some(key) {
            self.current = None;
        }
        if self.focused == Some(key) {
            self.focused = None;
        }
        entry.widget.on_detach();
        Some(entry.widget)
    }

    /// Focuses the widget and, for main-area widgets, makes it the current
    /// one. Returns whether current or focus actually changed.
    pub fn activate_widget(&mut self, key: WidgetKey) -> bool {
        let Some(entry) = self.widgets.get_mut(key) else {
            return false;
        };

        let prev_current = self.current;
        let prev_focused = self.focused;

        if entry.region == Region::Main {
            self.current = Some(key);
        }
        if entry.widget.focusable() {
            self.focused = Some(key);
        }
        entry.widget.on_activate();

        self.current != prev_current || self.focused != prev_focused
    }

    pub fn current(&self) -> Option<WidgetKey> {
        self.current
    }

    pub fn focused(&self) -> Option<WidgetKey> {
        self.focused
    }

    pub fn region_of(&self, key: WidgetKey) -> Option<Region> {
        self.widgets.get(key).map(|entry| entry.region)
    }

    pub fn widgets_in(&self, region: Region) -> &[WidgetKey] {
        &self.regions[region.slot()]
    }

    pub fn widget(&self, key: WidgetKey) -> Option<&dyn Widget> {
        self.widgets.get(key).map(|entry| entry.widget.as_ref())
    }

    pub fn widget_mut(&mut self, key: WidgetKey) -> Option<&mut (dyn Widget + 'static)> {
        self.widgets.get_mut(key).map(move |entry| entry.widget.as_mut())
    }

    pub fn key_of(&self, id: &str) -> Option<WidgetKey> {
        self.widgets
            .iter()
            .find(|(_, entry)| entry.widget.id() == id)
            .map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn config(&self, region: Region) -> RegionConfig {
        self.configs[region.slot()]
    }

    pub fn set_region_size(&mut self, region: Region, size: u16) {
        self.configs[region.slot()].size = size.max(1);
    }

    /// Hiding a region drops focus held by one of its widgets.
    pub fn set_region_visible(&mut self, region: Region, visible: bool) -> bool {
        let config = &mut self.configs[region.slot()];
        if config.visible == visible {
            return false;
        }
        config.visible = visible;

        if !visible {
            if let Some(focused) = self.focused {
                if self.region_of(focused) == Some(region) {
                    self.focused = None;
                }
            }
        }
        true
    }

    pub fn is_region_visible(&self, region: Region) -> bool {
        self.configs[region.slot()].visible
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        let regions = Region::ALL
            .iter()
            .map(|region| RegionSnapshot {
                region: *region,
                widgets: self.regions[region.slot()]
                    .iter()
                    .filter_map(|key| self.widget(*key))
                    .map(|widget| widget.id().to_string())
                    .collect(),
            })
            .collect();

        LayoutSnapshot {
            regions,
            current: self
                .current
                .and_then(|key| self.widget(key))
                .map(|widget| widget.id().to_string()),
        }
    }

    /// Replays a snapshot over the widgets that still exist: membership and
    /// order first, then the saved current widget. Ids with no live widget
    /// are skipped. Returns how many widgets were repositioned.
    pub fn restore(&mut self, snapshot: &LayoutSnapshot) -> usize {
        let mut moved = 0;
        for entry in &snapshot.regions {
            for id in &entry.widgets {
                if let Some(key) = self.key_of(id) {
                    if self.move_widget(key, entry.region, AddOptions::default()) {
                        moved += 1;
                    }
                }
            }
        }
        if let Some(current) = &snapshot.current {
            if let Some(key) = self.key_of(current) {
                self.activate_widget(key);
            }
        }
        moved
    }
}

impl Default for LayoutState {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat persisted form of the layout: ordered widget ids per region plus
/// the current main-area widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub regions: Vec<RegionSnapshot>,
    pub current: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub region: Region,
    pub widgets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct PaneStats {
        attached: Cell<u32>,
        detached: Cell<u32>,
    }

    struct Pane {
        id: String,
        stats: Rc<PaneStats>,
    }

    impl Pane {
        fn boxed(id: &str) -> Box<Pane> {
            Box::new(Pane {
                id: id.to_string(),
                stats: Rc::new(PaneStats::default()),
            })
        }

        fn with_stats(id: &str, stats: Rc<PaneStats>) -> Box<Pane> {
            Box::new(Pane {
                id: id.to_string(),
                stats,
            })
        }
    }

    impl Widget for Pane {
        fn id(&self) -> &str {
            &self.id
        }

        fn on_attach(&mut self, _region: Region) {
            self.stats.attached.set(self.stats.attached.get() + 1);
        }

        fn on_detach(&mut self) {
            self.stats.detached.set(self.stats.detached.get() + 1);
        }
    }

    #[test]
    fn widget_lives_in_exactly_one_region() {
        let mut layout = LayoutState::new();
        let key = layout.add_widget(Pane::boxed("doc"), Region::Main, AddOptions::default());

        assert_eq!(layout.widgets_in(Region::Main), [key]);
        assert!(layout.widgets_in(Region::Left).is_empty());

        assert!(layout.move_widget(key, Region::Left, AddOptions::default()));
        assert!(layout.widgets_in(Region::Main).is_empty());
        assert_eq!(layout.widgets_in(Region::Left), [key]);
    }

    #[test]
    fn moving_current_out_of_main_clears_current() {
        let mut layout = LayoutState::new();
        let key = layout.add_widget(Pane::boxed("doc"), Region::Main, AddOptions::default());
        layout.activate_widget(key);
        assert_eq!(layout.current(), Some(key));

        layout.move_widget(key, Region::Bottom, AddOptions::default());
        assert_eq!(layout.current(), None);
    }

    #[test]
    fn activate_sets_current_only_for_main() {
        let mut layout = LayoutState::new();
        let side = layout.add_widget(Pane::boxed("files"), Region::Left, AddOptions::default());
        let main = layout.add_widget(Pane::boxed("doc"), Region::Main, AddOptions::default());

        assert!(layout.activate_widget(side));
        assert_eq!(layout.current(), None);
        assert_eq!(layout.focused(), Some(side));

        assert!(layout.activate_widget(main));
        assert_eq!(layout.current(), Some(main));
        assert_eq!(layout.focused(), Some(main));
    }

    #[test]
    fn insertion_index_is_respected() {
        let mut layout = LayoutState::new();
        let a = layout.add_widget(Pane::boxed("a"), Region::Main, AddOptions::default());
        let b = layout.add_widget(Pane::boxed("b"), Region::Main, AddOptions::default());
        let c = layout.add_widget(
            Pane::boxed("c"),
            Region::Main,
            AddOptions {
                index: Some(1),
                ..AddOptions::default()
            },
        );

        assert_eq!(layout.widgets_in(Region::Main), [a, c, b]);
    }

    #[test]
    fn lifecycle_hooks_fire_on_reparent() {
        let stats = Rc::new(PaneStats::default());
        let mut layout = LayoutState::new();
        let key = layout.add_widget(
            Pane::with_stats("doc", Rc::clone(&stats)),
            Region::Main,
            AddOptions::default(),
        );
        layout.move_widget(key, Region::Right, AddOptions::default());

        assert!(layout.remove_widget(key).is_some());
        assert_eq!(stats.attached.get(), 2);
        assert_eq!(stats.detached.get(), 2);
    }

    #[test]
    fn hiding_region_drops_focus_inside_it() {
        let mut layout = LayoutState::new();
        let side = layout.add_widget(Pane::boxed("files"), Region::Left, AddOptions::default());
        layout.activate_widget(side);
        assert_eq!(layout.focused(), Some(side));

        assert!(layout.set_region_visible(Region::Left, false));
        assert_eq!(layout.focused(), None);
        assert!(!layout.set_region_visible(Region::Left, false));
    }

    #[test]
    fn snapshot_round_trips_membership_and_current() {
        let mut layout = LayoutState::new();
        let doc = layout.add_widget(Pane::boxed("doc"), Region::Main, AddOptions::default());
        layout.add_widget(Pane::boxed("files"), Region::Left, AddOptions::default());
        layout.add_widget(Pane::boxed("logs"), Region::Bottom, AddOptions::default());
        layout.activate_widget(doc);

        let snapshot = layout.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: LayoutSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.current.as_deref(), Some("doc"));

        // Shuffle, then restore the saved arrangement.
        layout.move_widget(doc, Region::Bottom, AddOptions::default());
        assert_eq!(layout.current(), None);

        layout.restore(&parsed);
        assert_eq!(layout.region_of(doc), Some(Region::Main));
        assert_eq!(layout.current(), Some(doc));
    }
}
