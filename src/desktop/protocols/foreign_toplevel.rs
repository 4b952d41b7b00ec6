//! `wlr-foreign-toplevel-management-v1` and `ext-foreign-toplevel-list-v1`
//! (§4.9): a pair of client-visible toplevel handles created together for
//! every mapped view and destroyed together on unmap, publishing
//! title/app_id/output/activated/fullscreen and translating the legacy
//! wlr protocol's requests back into view operations. Grounded on the
//! original's `foreign_toplevel.c`/`.h`, which create and tear down both
//! sub-handles as a unit for exactly this reason: taskbars only implement
//! one of the two protocols and the compositor doesn't know which.

use std::cell::RefCell;
use std::rc::Rc;

use smithay::output::Output;
use smithay::reexports::wayland_protocols_wlr::foreign_toplevel::v1::server::{
    zwlr_foreign_toplevel_handle_v1::{self, ZwlrForeignToplevelHandleV1},
    zwlr_foreign_toplevel_manager_v1::ZwlrForeignToplevelManagerV1,
};
use smithay::reexports::wayland_protocols::ext::foreign_toplevel_list::v1::server::{
    ext_foreign_toplevel_handle_v1::ExtForeignToplevelHandleV1,
    ext_foreign_toplevel_list_v1::ExtForeignToplevelListV1,
};
use smithay::reexports::wayland_server::backend::GlobalId;
use smithay::reexports::wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New};

use crate::desktop::view::ViewHandle;

/// What a `wlr-foreign-toplevel-management-v1` request ultimately asks
/// the compositor to do. `ext-foreign-toplevel-list-v1` is read-only and
/// has no requests beyond `stop`/`destroy`.
pub trait ForeignToplevelSink {
    fn request_activate(&mut self, view: &ViewHandle);
    fn request_fullscreen(&mut self, view: &ViewHandle, fullscreen: bool, output: Option<Output>);
    fn request_close(&mut self, view: &ViewHandle);
}

/// A view's last-published fields, kept so `sync` only emits events for
/// what actually changed — mirrors `e_ext_foreign_toplevel_state`.
#[derive(Default, Clone, PartialEq)]
struct PublishedState {
    title: Option<String>,
    app_id: Option<String>,
    activated: bool,
    fullscreen: bool,
}

pub struct WlrResourceData {
    view: ViewHandle,
}

pub struct ExtResourceData {
    view: ViewHandle,
}

struct Entry {
    view: ViewHandle,
    wlr_handles: Vec<ZwlrForeignToplevelHandleV1>,
    ext_handles: Vec<ExtForeignToplevelHandleV1>,
    /// What `set_*` has recorded since the last `sync`.
    pending: PublishedState,
    /// What was last actually sent to bound handles.
    sent: PublishedState,
    outputs: Vec<Output>,
}

/// Owns both managers' globals and the per-view handle pairs. One
/// instance lives in `crate::state::State` for the lifetime of the
/// compositor.
pub struct ForeignToplevelBridge {
    wlr_global: GlobalId,
    ext_global: GlobalId,
    wlr_managers: Vec<ZwlrForeignToplevelManagerV1>,
    ext_managers: Vec<ExtForeignToplevelListV1>,
    entries: Vec<Entry>,
}

impl ForeignToplevelBridge {
    pub fn new<D>(display: &DisplayHandle) -> Self
    where
        D: GlobalDispatch<ZwlrForeignToplevelManagerV1, ()>
            + Dispatch<ZwlrForeignToplevelManagerV1, ()>
            + Dispatch<ZwlrForeignToplevelHandleV1, WlrResourceData>
            + GlobalDispatch<ExtForeignToplevelListV1, ()>
            + Dispatch<ExtForeignToplevelListV1, ()>
            + Dispatch<ExtForeignToplevelHandleV1, ExtResourceData>
            + 'static,
    {
        let wlr_global = display.create_global::<D, ZwlrForeignToplevelManagerV1, _>(3, ());
        let ext_global = display.create_global::<D, ExtForeignToplevelListV1, _>(1, ());
        Self {
            wlr_global,
            ext_global,
            wlr_managers: Vec::new(),
            ext_managers: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn wlr_global_id(&self) -> &GlobalId {
        &self.wlr_global
    }

    pub fn ext_global_id(&self) -> &GlobalId {
        &self.ext_global
    }

    /// `e_foreign_toplevel_create`: called once per view, on map. Creates
    /// a handle of each protocol against every currently-bound manager
    /// resource and announces it (§4.9 "Creation").
    pub fn create<D>(&mut self, dh: &DisplayHandle, view: ViewHandle)
    where
        D: Dispatch<ZwlrForeignToplevelHandleV1, WlrResourceData>
            + Dispatch<ExtForeignToplevelHandleV1, ExtResourceData>
            + 'static,
    {
        let mut entry = Entry {
            view,
            wlr_handles: Vec::new(),
            ext_handles: Vec::new(),
            pending: PublishedState::default(),
            sent: PublishedState::default(),
            outputs: Vec::new(),
        };
        for manager in self.wlr_managers.clone() {
            if let Some(handle) = instantiate_wlr_handle::<D>(dh, &manager, entry.view.clone()) {
                entry.wlr_handles.push(handle);
            }
        }
        for manager in self.ext_managers.clone() {
            if let Some(handle) = instantiate_ext_handle::<D>(dh, &manager, entry.view.clone()) {
                entry.ext_handles.push(handle);
            }
        }
        self.entries.push(entry);
    }

    /// Advertise every already-mapped view to a manager resource that just
    /// bound, so a taskbar started after windows are already open still
    /// sees them (§4.9 "Late binding").
    fn announce_existing_to_wlr<D>(&mut self, dh: &DisplayHandle, manager: &ZwlrForeignToplevelManagerV1)
    where
        D: Dispatch<ZwlrForeignToplevelHandleV1, WlrResourceData> + 'static,
    {
        for entry in &mut self.entries {
            if let Some(handle) = instantiate_wlr_handle::<D>(dh, manager, entry.view.clone()) {
                entry.wlr_handles.push(handle);
            }
        }
    }

    fn announce_existing_to_ext<D>(&mut self, dh: &DisplayHandle, manager: &ExtForeignToplevelListV1)
    where
        D: Dispatch<ExtForeignToplevelHandleV1, ExtResourceData> + 'static,
    {
        for entry in &mut self.entries {
            if let Some(handle) = instantiate_ext_handle::<D>(dh, manager, entry.view.clone()) {
                entry.ext_handles.push(handle);
            }
        }
    }

    /// `e_foreign_toplevel_destroy`: called on unmap. Every handle of
    /// both protocols sends its `closed` event and the entry is dropped.
    pub fn destroy(&mut self, view: &ViewHandle) {
        let Some(pos) = self.entries.iter().position(|e| Rc::ptr_eq(&e.view, view)) else {
            return;
        };
        let entry = self.entries.remove(pos);
        for handle in &entry.wlr_handles {
            handle.closed();
        }
        for handle in &entry.ext_handles {
            handle.closed();
        }
    }

    pub fn set_title(&mut self, view: &ViewHandle, title: Option<String>) {
        if let Some(entry) = self.entry_mut(view) {
            entry.pending.title = title;
        }
    }

    pub fn set_app_id(&mut self, view: &ViewHandle, app_id: Option<String>) {
        if let Some(entry) = self.entry_mut(view) {
            entry.pending.app_id = app_id;
        }
    }

    pub fn set_activated(&mut self, view: &ViewHandle, activated: bool) {
        if let Some(entry) = self.entry_mut(view) {
            entry.pending.activated = activated;
        }
    }

    pub fn set_fullscreen(&mut self, view: &ViewHandle, fullscreen: bool) {
        if let Some(entry) = self.entry_mut(view) {
            entry.pending.fullscreen = fullscreen;
        }
    }

    pub fn output_enter(&mut self, view: &ViewHandle, output: &Output) {
        if let Some(entry) = self.entry_mut(view) {
            if !entry.outputs.iter().any(|o| o == output) {
                entry.outputs.push(output.clone());
                for handle in &entry.wlr_handles {
                    handle.output_enter(output);
                }
            }
        }
    }

    pub fn output_leave(&mut self, view: &ViewHandle, output: &Output) {
        if let Some(entry) = self.entry_mut(view) {
            entry.outputs.retain(|o| o != output);
            for handle in &entry.wlr_handles {
                handle.output_leave(output);
            }
        }
    }

    /// Flush every entry's dirty fields to its bound handles and send
    /// `done`. Called once per event-loop dispatch, after the batch of
    /// `set_*` calls above (§4.9 "Publication").
    pub fn sync(&mut self) {
        for entry in &mut self.entries {
            if entry.pending == entry.sent {
                continue;
            }
            let next = entry.pending.clone();
            for handle in &entry.wlr_handles {
                if next.title != entry.sent.title {
                    handle.title(next.title.clone().unwrap_or_default());
                }
                if next.app_id != entry.sent.app_id {
                    handle.app_id(next.app_id.clone().unwrap_or_default());
                }
                if next.activated != entry.sent.activated || next.fullscreen != entry.sent.fullscreen {
                    handle.state(encode_wlr_state(next.activated, next.fullscreen));
                }
                handle.done();
            }
            for handle in &entry.ext_handles {
                if next.title != entry.sent.title {
                    handle.title(next.title.clone().unwrap_or_default());
                }
                if next.app_id != entry.sent.app_id {
                    handle.app_id(next.app_id.clone().unwrap_or_default());
                }
                handle.done();
            }
            entry.sent = next;
        }
    }

    fn entry_mut(&mut self, view: &ViewHandle) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| Rc::ptr_eq(&e.view, view))
    }
}

/// Create one `zwlr_foreign_toplevel_handle_v1` on `manager`'s client and
/// send the initial `title`/`app_id`/`state`/`done` burst (§4.9
/// "Creation"). Returns `None` if the manager's client has since vanished.
fn instantiate_wlr_handle<D>(
    dh: &DisplayHandle,
    manager: &ZwlrForeignToplevelManagerV1,
    view: ViewHandle,
) -> Option<ZwlrForeignToplevelHandleV1>
where
    D: Dispatch<ZwlrForeignToplevelHandleV1, WlrResourceData> + 'static,
{
    let client = manager.client()?;
    let handle = client
        .create_resource::<ZwlrForeignToplevelHandleV1, WlrResourceData, D>(
            dh,
            manager.version(),
            WlrResourceData { view: view.clone() },
        )
        .ok()?;
    manager.toplevel(&handle);
    let title = view.borrow().title();
    let app_id = view.borrow().app_id();
    handle.title(title);
    handle.app_id(app_id);
    handle.state(encode_wlr_state(false, false));
    handle.done();
    Some(handle)
}

fn instantiate_ext_handle<D>(
    dh: &DisplayHandle,
    manager: &ExtForeignToplevelListV1,
    view: ViewHandle,
) -> Option<ExtForeignToplevelHandleV1>
where
    D: Dispatch<ExtForeignToplevelHandleV1, ExtResourceData> + 'static,
{
    let client = manager.client()?;
    let handle = client
        .create_resource::<ExtForeignToplevelHandleV1, ExtResourceData, D>(
            dh,
            manager.version(),
            ExtResourceData { view: view.clone() },
        )
        .ok()?;
    manager.toplevel(&handle);
    let title = view.borrow().title();
    let app_id = view.borrow().app_id();
    handle.title(title);
    handle.app_id(app_id);
    handle.done();
    Some(handle)
}

fn encode_wlr_state(activated: bool, fullscreen: bool) -> Vec<u8> {
    let mut bytes = Vec::new();
    if activated {
        bytes.extend_from_slice(&(zwlr_foreign_toplevel_handle_v1::State::Activated as u32).to_ne_bytes());
    }
    if fullscreen {
        bytes.extend_from_slice(&(zwlr_foreign_toplevel_handle_v1::State::Fullscreen as u32).to_ne_bytes());
    }
    bytes
}

impl<D> GlobalDispatch<ZwlrForeignToplevelManagerV1, (), D> for ForeignToplevelBridge
where
    D: GlobalDispatch<ZwlrForeignToplevelManagerV1, ()>
        + Dispatch<ZwlrForeignToplevelManagerV1, ()>
        + Dispatch<ZwlrForeignToplevelHandleV1, WlrResourceData>
        + AsForeignToplevelSink
        + 'static,
{
    fn bind(
        state: &mut D,
        handle: &DisplayHandle,
        _client: &Client,
        resource: New<ZwlrForeignToplevelManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        let manager = data_init.init(resource, ());
        let bridge = state.foreign_toplevel_bridge();
        bridge.announce_existing_to_wlr::<D>(handle, &manager);
        bridge.wlr_managers.push(manager);
    }
}

impl<D> Dispatch<ZwlrForeignToplevelManagerV1, (), D> for ForeignToplevelBridge
where
    D: Dispatch<ZwlrForeignToplevelManagerV1, ()> + 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &ZwlrForeignToplevelManagerV1,
        _request: smithay::reexports::wayland_protocols_wlr::foreign_toplevel::v1::server::zwlr_foreign_toplevel_manager_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
    }
}

impl<D> Dispatch<ZwlrForeignToplevelHandleV1, WlrResourceData, D> for ForeignToplevelBridge
where
    D: Dispatch<ZwlrForeignToplevelHandleV1, WlrResourceData> + AsForeignToplevelSink + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &ZwlrForeignToplevelHandleV1,
        request: zwlr_foreign_toplevel_handle_v1::Request,
        data: &WlrResourceData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwlr_foreign_toplevel_handle_v1::Request::SetFullscreen { output } => {
                let output = output.and_then(|o| Output::from_resource(&o));
                state.foreign_toplevel_sink().request_fullscreen(&data.view, true, output);
            }
            zwlr_foreign_toplevel_handle_v1::Request::UnsetFullscreen => {
                state.foreign_toplevel_sink().request_fullscreen(&data.view, false, None);
            }
            zwlr_foreign_toplevel_handle_v1::Request::Activate { .. } => {
                state.foreign_toplevel_sink().request_activate(&data.view);
            }
            zwlr_foreign_toplevel_handle_v1::Request::Close => {
                state.foreign_toplevel_sink().request_close(&data.view);
            }
            _ => {}
        }
    }
}

impl<D> GlobalDispatch<ExtForeignToplevelListV1, (), D> for ForeignToplevelBridge
where
    D: GlobalDispatch<ExtForeignToplevelListV1, ()>
        + Dispatch<ExtForeignToplevelListV1, ()>
        + Dispatch<ExtForeignToplevelHandleV1, ExtResourceData>
        + AsForeignToplevelSink
        + 'static,
{
    fn bind(
        state: &mut D,
        handle: &DisplayHandle,
        _client: &Client,
        resource: New<ExtForeignToplevelListV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        let manager = data_init.init(resource, ());
        let bridge = state.foreign_toplevel_bridge();
        bridge.announce_existing_to_ext::<D>(handle, &manager);
        bridge.ext_managers.push(manager);
    }
}

impl<D> Dispatch<ExtForeignToplevelListV1, (), D> for ForeignToplevelBridge
where
    D: Dispatch<ExtForeignToplevelListV1, ()> + 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &ExtForeignToplevelListV1,
        _request: smithay::reexports::wayland_protocols::ext::foreign_toplevel_list::v1::server::ext_foreign_toplevel_list_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
    }
}

impl<D> Dispatch<ExtForeignToplevelHandleV1, ExtResourceData, D> for ForeignToplevelBridge
where
    D: Dispatch<ExtForeignToplevelHandleV1, ExtResourceData> + 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &ExtForeignToplevelHandleV1,
        _request: smithay::reexports::wayland_protocols::ext::foreign_toplevel_list::v1::server::ext_foreign_toplevel_handle_v1::Request,
        _data: &ExtResourceData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        // ext-foreign-toplevel-list-v1 handles only have `destroy`.
    }
}

/// Implemented by [`crate::state::State`] so the `wlr` `Dispatch` impl
/// above can route requests through whatever translates them into view
/// operations, and the `bind` handlers above can reach the one
/// [`ForeignToplevelBridge`] field it owns.
pub trait AsForeignToplevelSink {
    fn foreign_toplevel_sink(&mut self) -> &mut dyn ForeignToplevelSink;
    fn foreign_toplevel_bridge(&mut self) -> &mut ForeignToplevelBridge;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::view::test_support::StubView;

    #[test]
    fn published_state_defaults_to_no_title_no_app_id_not_activated() {
        let state = PublishedState::default();
        assert_eq!(state.title, None);
        assert_eq!(state.app_id, None);
        assert!(!state.activated);
        assert!(!state.fullscreen);
    }

    fn entry_for(entries: &[Entry], view: &ViewHandle) -> Option<usize> {
        entries.iter().position(|e| Rc::ptr_eq(&e.view, view))
    }

    #[test]
    fn create_then_destroy_round_trips_without_handles_bound() {
        let mut entries: Vec<Entry> = Vec::new();
        let view: ViewHandle = Rc::new(RefCell::new(StubView::default()));

        entries.push(Entry {
            view: view.clone(),
            wlr_handles: Vec::new(),
            ext_handles: Vec::new(),
            pending: PublishedState::default(),
            sent: PublishedState::default(),
            outputs: Vec::new(),
        });
        assert_eq!(entries.len(), 1);

        let pos = entry_for(&entries, &view).expect("entry exists");
        entries.remove(pos);
        assert!(entry_for(&entries, &view).is_none());
    }
}
