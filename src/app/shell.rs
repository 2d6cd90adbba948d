//! Application shell: the composed runtime.
//!
//! One explicitly constructed `AppShell` owns the service, plugin, and
//! command registries plus the layout, and drives plugin activation. The
//! shell instance is threaded into every activation function; there are no
//! ambient globals. Everything runs on one thread; registries sit behind
//! `RefCell` with borrows that never cross an await point.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::plugin::{PluginDescriptor, PluginError, PluginRegistry, PluginState};
use crate::core::service::{ServiceError, ServiceRegistry};
use crate::core::token::Token;
use crate::core::CommandRegistry;

use super::layout::{AddOptions, LayoutSnapshot, LayoutState, Region, WidgetKey};
use super::widget::Widget;

type CurrentChangedFn = Rc<dyn Fn(Option<&str>)>;

pub struct AppShell {
    services: RefCell<ServiceRegistry>,
    plugins: RefCell<PluginRegistry>,
    commands: CommandRegistry,
    layout: RefCell<LayoutState>,
    current_observers: RefCell<Vec<CurrentChangedFn>>,
    quit: Cell<bool>,
}

impl AppShell {
    pub fn new() -> Self {
        Self {
            services: RefCell::new(ServiceRegistry::new()),
            plugins: RefCell::new(PluginRegistry::new()),
            commands: CommandRegistry::new(),
            layout: RefCell::new(LayoutState::new()),
            current_observers: RefCell::new(Vec::new()),
            quit: Cell::new(false),
        }
    }

    // ---- plugins ----

    pub fn register_plugin(&self, descriptor: PluginDescriptor) -> Result<(), PluginError> {
        self.plugins.borrow_mut().register(descriptor)
    }

    pub fn register_plugins(
        &self,
        descriptors: impl IntoIterator<Item = PluginDescriptor>,
    ) -> Result<(), PluginError> {
        for descriptor in descriptors {
            self.register_plugin(descriptor)?;
        }
        Ok(())
    }

    pub fn plugin_state(&self, id: &str) -> Option<PluginState> {
        self.plugins.borrow().state(id)
    }

    pub fn is_plugin_active(&self, id: &str) -> bool {
        self.plugins.borrow().is_active(id)
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugins.borrow().ids().map(str::to_string).collect()
    }

    /// Activates every auto-start plugin and the dependencies they pull in,
    /// in topological order. Fail-fast: the first failure halts the walk and
    /// is returned; plugins activated before it stay active and their
    /// services stay registered.
    pub async fn start(&self) -> Result<(), PluginError> {
        let order = {
            let plugins = self.plugins.borrow();
            let services = self.services.borrow();
            plugins.startup_order(&services)?
        };
        tracing::info!(count = order.len(), "activating plugins");
        for id in &order {
            self.run_activation(id).await?;
        }
        Ok(())
    }

    /// Activates one plugin plus its not-yet-active dependencies. A no-op
    /// for already-active plugins.
    pub async fn activate_plugin(&self, id: &str) -> Result<(), PluginError> {
        if self.is_plugin_active(id) {
            return Ok(());
        }
        let order = {
            let plugins = self.plugins.borrow();
            let services = self.services.borrow();
            plugins.activation_order(id, &services)?
        };
        for plugin_id in &order {
            self.run_activation(plugin_id).await?;
        }
        Ok(())
    }

    async fn run_activation(&self, id: &str) -> Result<(), PluginError> {
        match self.plugins.borrow().state(id) {
            Some(PluginState::Active) => return Ok(()),
            Some(PluginState::Activating) => {
                return Err(PluginError::ActivationFailed {
                    plugin: id.to_string(),
                    message: "re-entrant activation".to_string(),
                })
            }
            Some(PluginState::Failed) => {
                let message = self
                    .plugins
                    .borrow()
                    .failure(id)
                    .unwrap_or("previous activation failed")
                    .to_string();
                return Err(PluginError::ActivationFailed {
                    plugin: id.to_string(),
                    message,
                });
            }
            Some(PluginState::Registered) => {}
            None => return Err(PluginError::UnknownPlugin(id.to_string())),
        }

        // A provider earlier in the walk may have activated without actually
        // producing its service; catch that before invoking this plugin.
        let missing = {
            let plugins = self.plugins.borrow();
            let services = self.services.borrow();
            plugins.descriptor(id).and_then(|descriptor| {
                descriptor
                    .required_tokens()
                    .iter()
                    .find(|&token| !services.has_raw(token))
                    .map(|token| token.name().to_string())
            })
        };
        if let Some(token) = missing {
            let message = format!("required token {} is unresolved", token);
            self.plugins.borrow_mut().record_failure(id, message);
            return Err(PluginError::MissingDependency {
                plugin: id.to_string(),
                token,
            });
        }

        let Some(activate) = self.plugins.borrow().activate_fn(id) else {
            return Err(PluginError::UnknownPlugin(id.to_string()));
        };

        self.plugins
            .borrow_mut()
            .set_state(id, PluginState::Activating);
        tracing::debug!(plugin = %id, "activating");

        match (*activate)(self).await {
            Ok(service) => {
                if let Some(service) = service {
                    let provided = self
                        .plugins
                        .borrow()
                        .descriptor(id)
                        .and_then(|descriptor| descriptor.provided_token().cloned());
                    match provided {
                        Some(token) => {
                            if let Err(err) =
                                self.services.borrow_mut().register_raw(token, service)
                            {
                                let message = err.to_string();
                                self.plugins
                                    .borrow_mut()
                                    .record_failure(id, message.clone());
                                return Err(PluginError::ActivationFailed {
                                    plugin: id.to_string(),
                                    message,
                                });
                            }
                        }
                        None => {
                            tracing::warn!(
                                plugin = %id,
                                "activation returned a service but the plugin provides no token"
                            );
                        }
                    }
                }
                self.plugins.borrow_mut().set_state(id, PluginState::Active);
                tracing::info!(plugin = %id, "plugin activated");
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.plugins
                    .borrow_mut()
                    .record_failure(id, message.clone());
                tracing::warn!(plugin = %id, error = %message, "plugin activation failed");
                Err(PluginError::ActivationFailed {
                    plugin: id.to_string(),
                    message,
                })
            }
        }
    }

    // ---- services ----

    pub fn register_service<T: 'static>(
        &self,
        token: &Token<T>,
        service: Rc<T>,
    ) -> Result<(), ServiceError> {
        self.services.borrow_mut().register(token, service)
    }

    pub fn service<T: 'static>(&self, token: &Token<T>) -> Result<Rc<T>, ServiceError> {
        self.services.borrow().get(token)
    }

    pub fn try_service<T: 'static>(&self, token: &Token<T>) -> Option<Rc<T>> {
        self.services.borrow().try_get(token)
    }

    pub fn has_service<T: ?Sized>(&self, token: &Token<T>) -> bool {
        self.services.borrow().has(token)
    }

    // ---- commands ----

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    // ---- widgets and layout ----

    pub fn add_widget(
        &self,
        widget: Box<dyn Widget>,
        region: Region,
        options: AddOptions,
    ) -> WidgetKey {
        let key = self
            .layout
            .borrow_mut()
            .add_widget(widget, region, options);
        if options.activate {
            self.activate_widget(key);
        }
        key
    }

    /// The single sanctioned reparenting path; plugins never touch another
    /// plugin's region membership except through this call.
    pub fn move_widget(&self, key: WidgetKey, region: Region) -> bool {
        let (moved, current_changed) = {
            let mut layout = self.layout.borrow_mut();
            let before = layout.current();
            let moved = layout.move_widget(key, region, AddOptions::default());
            (moved, layout.current() != before)
        };
        if current_changed {
            self.notify_current_changed();
        }
        moved
    }

    pub fn remove_widget(&self, key: WidgetKey) -> Option<Box<dyn Widget>> {
        let (widget, current_changed) = {
            let mut layout = self.layout.borrow_mut();
            let before = layout.current();
            let widget = layout.remove_widget(key);
            (widget, layout.current() != before)
        };
        if current_changed {
            self.notify_current_changed();
        }
        widget
    }

    pub fn activate_widget(&self, key: WidgetKey) -> bool {
        let changed = self.layout.borrow_mut().activate_widget(key);
        if changed {
            self.notify_current_changed();
        }
        changed
    }

    /// Id of the current main-area widget, the read-only derived state
    /// menus and the status bar observe.
    pub fn current_widget(&self) -> Option<String> {
        let layout = self.layout.borrow();
        layout
            .current()
            .and_then(|key| layout.widget(key))
            .map(|widget| widget.id().to_string())
    }

    pub fn focused_widget(&self) -> Option<String> {
        let layout = self.layout.borrow();
        layout
            .focused()
            .and_then(|key| layout.widget(key))
            .map(|widget| widget.id().to_string())
    }

    pub fn widget_key(&self, id: &str) -> Option<WidgetKey> {
        self.layout.borrow().key_of(id)
    }

    /// Runs a closure against the layout. Scoped access keeps the borrow
    /// short; holding layout state across an await would panic on reentry.
    pub fn with_layout<R>(&self, f: impl FnOnce(&mut LayoutState) -> R) -> R {
        f(&mut self.layout.borrow_mut())
    }

    /// Focus scopes for keybinding dispatch, innermost first.
    pub fn focus_context(&self) -> Vec<String> {
        let layout = self.layout.borrow();
        let mut context = Vec::with_capacity(3);
        if let Some(key) = layout.focused() {
            if let Some(widget) = layout.widget(key) {
                context.push(format!("widget:{}", widget.id()));
            }
            if let Some(region) = layout.region_of(key) {
                context.push(format!("region:{}", region.name()));
            }
        }
        context.push("shell".to_string());
        context
    }

    pub fn set_region_visible(&self, region: Region, visible: bool) -> bool {
        self.layout.borrow_mut().set_region_visible(region, visible)
    }

    /// Returns the new visibility.
    pub fn toggle_region(&self, region: Region) -> bool {
        let mut layout = self.layout.borrow_mut();
        let visible = !layout.is_region_visible(region);
        layout.set_region_visible(region, visible);
        visible
    }

    pub fn is_region_visible(&self, region: Region) -> bool {
        self.layout.borrow().is_region_visible(region)
    }

    pub fn save_layout(&self) -> LayoutSnapshot {
        self.layout.borrow().snapshot()
    }

    pub fn restore_layout(&self, snapshot: &LayoutSnapshot) -> usize {
        let (moved, current_changed) = {
            let mut layout = self.layout.borrow_mut();
            let before = layout.current();
            let moved = layout.restore(snapshot);
            (moved, layout.current() != before)
        };
        if current_changed {
            self.notify_current_changed();
        }
        moved
    }

    pub fn on_current_changed(&self, f: impl Fn(Option<&str>) + 'static) {
        self.current_observers.borrow_mut().push(Rc::new(f));
    }

    fn notify_current_changed(&self) {
        let current = self.current_widget();
        let observers: Vec<CurrentChangedFn> =
            self.current_observers.borrow().iter().map(Rc::clone).collect();
        for observer in observers {
            (*observer)(current.as_deref());
        }
    }

    // ---- lifetime ----

    pub fn request_quit(&self) {
        tracing::info!("quit requested");
        self.quit.set(true);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.get()
    }
}

impl Default for AppShell {
    fn default() -> Self {
        Self::new()
    }
}
