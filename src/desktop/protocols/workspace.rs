//! `ext-workspace-v1` and `cosmic-workspace-unstable-v1` (§4.8, §6):
//! wire-level workspace enumeration for taskbars/pagers, built on the
//! [`TransactionSession`]/[`DoneScheduler`] pair from
//! [`crate::desktop::transaction`]. Grounded on the original's
//! `ext-workspace-v1.c`/`cosmic-workspace-v1.c`, which are themselves
//! near-identical wire encodings of the same domain concept — that
//! symmetry is kept here by routing both managers through the same
//! [`WorkspaceProtocolSink`] the real compositor state implements once.
//!
//! Simplification versus the original: a workspace group corresponds
//! 1:1 with an output for the lifetime of this compositor (no
//! multi-output groups, no late output (re)binding races) — §1's
//! single-seat/no-multi-output-group assumption already rules that case
//! out, so group/output association is fixed at group-creation time
//! rather than tracked per client bind.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use smithay::reexports::calloop::LoopHandle;
use smithay::reexports::wayland_server::backend::GlobalId;
use smithay::reexports::wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New};

use crate::desktop::transaction::{DoneScheduler, Opcode, TransactionSession};
use crate::desktop::workspace::{WorkspaceRef, WorkspaceState};
use crate::state::State;

/// What a workspace-protocol `commit` ultimately asks the compositor to
/// do, once a queued operation's destroy/emit pair fires (§4.8 "Workspace-
/// protocol commit"). Implemented once by [`crate::state::State`] and
/// shared by both protocol managers.
pub trait WorkspaceProtocolSink {
    /// A client asked the group bound to `output_name` to create a new
    /// workspace, optionally named.
    fn request_create_workspace(&mut self, output_name: &str, name: Option<String>);
    fn request_activate(&mut self, workspace_id: u32);
    fn request_deactivate(&mut self, workspace_id: u32);
    /// Re-assign `workspace_id` to the group bound to `output_name`.
    /// Workspace migration between outputs is not implemented by the
    /// layout engine (§4.3, §9 Open Questions); the sink logs and ignores
    /// this in practice, but the wire request is still drained in order.
    fn request_assign(&mut self, workspace_id: u32, output_name: &str);
    fn request_remove(&mut self, workspace_id: u32);
}

/// Payload carried by a queued `assign` operation — the only request with
/// a non-trivial argument.
struct AssignPayload {
    output_name: String,
}

struct CreateWorkspacePayload {
    output_name: String,
    name: Option<String>,
}

/// One client-visible `workspace` object bound to a domain [`WorkspaceRef`],
/// shared shape between both protocols' per-resource user data.
pub struct WorkspaceResourceData {
    workspace: WorkspaceRef,
}

/// One client-visible `group` object, bound to an output name at creation.
pub struct GroupResourceData {
    output_name: String,
}

/// Everything both `ext-workspace-v1` and `cosmic-workspace-unstable-v1`
/// need beyond their own wire types: the deferred-operation queue, the
/// coalesced "done" scheduler, and the last-published state per workspace
/// so `publish` only notifies resources whose state actually changed
/// (§4.8 "Done coalescing").
#[derive(Default)]
struct Shared {
    session: TransactionSession,
    done: DoneScheduler,
    last_published: HashMap<u32, WorkspaceState>,
}

impl Shared {
    fn queue_create_workspace(&mut self, output_name: &str, name: Option<String>) {
        self.session.add(
            Opcode::CreateWorkspace,
            0,
            Box::new(CreateWorkspacePayload { output_name: output_name.to_string(), name }),
            |_| {},
        );
    }

    fn queue_activate(&mut self, workspace_id: u32) {
        self.session.add(Opcode::Activate, workspace_id, Box::new(()), |_| {});
    }

    fn queue_deactivate(&mut self, workspace_id: u32) {
        self.session.add(Opcode::Deactivate, workspace_id, Box::new(()), |_| {});
    }

    fn queue_assign(&mut self, workspace_id: u32, output_name: &str) {
        self.session.add(
            Opcode::Assign,
            workspace_id,
            Box::new(AssignPayload { output_name: output_name.to_string() }),
            |_| {},
        );
    }

    fn queue_remove(&mut self, workspace_id: u32) {
        self.session.add(Opcode::Remove, workspace_id, Box::new(()), |_| {});
    }

    /// Drain the queue into `sink`, mirroring §4.8's commit/drain
    /// contract, grouped here so both managers' `commit` requests share
    /// one implementation. Returns whether the caller should schedule a
    /// `run_done` idle callback (`true` only the first time since the
    /// last `run`, per [`DoneScheduler::schedule`]'s coalescing).
    fn commit(&mut self, sink: &mut dyn WorkspaceProtocolSink) -> bool {
        self.session.commit(|opcode, source, payload| match opcode {
            Opcode::CreateWorkspace => {
                if let Some(p) = payload.downcast_ref::<CreateWorkspacePayload>() {
                    sink.request_create_workspace(&p.output_name, p.name.clone());
                }
            }
            Opcode::Activate => sink.request_activate(source),
            Opcode::Deactivate => sink.request_deactivate(source),
            Opcode::Assign => {
                if let Some(p) = payload.downcast_ref::<AssignPayload>() {
                    sink.request_assign(source, &p.output_name);
                }
            }
            Opcode::Remove => sink.request_remove(source),
        });

        self.done.schedule()
    }
}

pub mod ext {
    //! `ext-workspace-v1` (version 1).
    use super::*;
    use smithay::reexports::wayland_protocols::ext::workspace::v1::server::{
        ext_workspace_group_handle_v1::{self, ExtWorkspaceGroupHandleV1},
        ext_workspace_handle_v1::{self, ExtWorkspaceHandleV1},
        ext_workspace_manager_v1::{self, ExtWorkspaceManagerV1},
    };

    struct GroupEntry {
        output_name: String,
        handles: Vec<ExtWorkspaceGroupHandleV1>,
    }

    struct WorkspaceEntry {
        workspace: WorkspaceRef,
        output_name: String,
        handles: Vec<ExtWorkspaceHandleV1>,
    }

    pub struct ExtWorkspaceManagerState {
        global: GlobalId,
        loop_handle: LoopHandle<'static, State>,
        shared: Rc<RefCell<Shared>>,
        managers: Vec<ExtWorkspaceManagerV1>,
        groups: Vec<GroupEntry>,
        workspaces: Vec<WorkspaceEntry>,
    }

    impl ExtWorkspaceManagerState {
        pub fn new<D>(display: &DisplayHandle, loop_handle: LoopHandle<'static, State>) -> Self
        where
            D: GlobalDispatch<ExtWorkspaceManagerV1, ()>
                + Dispatch<ExtWorkspaceManagerV1, ()>
                + Dispatch<ExtWorkspaceGroupHandleV1, GroupResourceData>
                + Dispatch<ExtWorkspaceHandleV1, WorkspaceResourceData>
                + 'static,
        {
            let global = display.create_global::<D, ExtWorkspaceManagerV1, _>(1, ());
            Self {
                global,
                loop_handle,
                shared: Rc::new(RefCell::new(Shared::default())),
                managers: Vec::new(),
                groups: Vec::new(),
                workspaces: Vec::new(),
            }
        }

        pub fn global_id(&self) -> &GlobalId {
            &self.global
        }

        /// Create `output_name`'s `workspace_group` on every already-bound
        /// manager client (§4.8/§4.9-style "Creation"); this compositor
        /// creates exactly one group per output, for the output's lifetime.
        pub fn add_group<D>(&mut self, dh: &DisplayHandle, output_name: String)
        where
            D: Dispatch<ExtWorkspaceGroupHandleV1, GroupResourceData> + 'static,
        {
            let handles = self
                .managers
                .clone()
                .into_iter()
                .filter_map(|manager| instantiate_group::<D>(dh, &manager, &output_name))
                .collect();
            self.groups.push(GroupEntry { output_name, handles });
            self.schedule_done();
        }

        /// Create `workspace`'s handle, entered into `output_name`'s group,
        /// on every already-bound manager client. Called once from
        /// [`State::add_output`](crate::state::State::add_output) for each
        /// output's initial workspace, and again from
        /// `request_create_workspace` for every later `create_workspace`.
        pub fn workspace_created<D>(&mut self, dh: &DisplayHandle, output_name: &str, workspace: WorkspaceRef)
        where
            D: Dispatch<ExtWorkspaceHandleV1, WorkspaceResourceData> + 'static,
        {
            let Some(group) = self.groups.iter().find(|g| g.output_name == output_name) else {
                return;
            };
            let handles = self
                .managers
                .iter()
                .zip(group.handles.iter())
                .filter_map(|(manager, group_handle)| instantiate_workspace::<D>(dh, manager, group_handle, &workspace))
                .collect();
            self.workspaces.push(WorkspaceEntry {
                workspace,
                output_name: output_name.to_string(),
                handles,
            });
            self.schedule_done();
        }

        pub fn workspace_removed(&mut self, workspace_id: u32) {
            if let Some(pos) = self.workspaces.iter().position(|w| w.workspace.borrow().id == workspace_id) {
                let entry = self.workspaces.remove(pos);
                for handle in &entry.handles {
                    handle.removed();
                }
            }
            self.shared.borrow_mut().last_published.remove(&workspace_id);
            self.schedule_done();
        }

        /// Push every workspace's pending state into `current` and notify
        /// resources whose state changed, then send `done` to every bound
        /// manager resource (§4.8 "Done coalescing" step (a)+(b)). Called
        /// from the idle callback [`Self::schedule_done`] inserts.
        pub fn run_done(&mut self) {
            let mut shared = self.shared.borrow_mut();
            shared.done.run();

            for entry in &self.workspaces {
                let id = entry.workspace.borrow().id;
                let state = entry.workspace.borrow().state();
                let changed = shared.last_published.get(&id) != Some(&state);
                if changed {
                    shared.last_published.insert(id, state);
                    for handle in &entry.handles {
                        handle.state(encode_state(state));
                    }
                }
            }
            for manager in &self.managers {
                manager.done();
            }
        }

        pub fn commit(&mut self, sink: &mut dyn super::WorkspaceProtocolSink) {
            let scheduled = self.shared.borrow_mut().commit(sink);
            if scheduled {
                self.loop_handle.insert_idle(|state| state.ext_workspace_state.run_done());
            }
        }

        /// Schedule a `run_done` idle callback if one isn't already
        /// pending (§4.8 "Done coalescing"), per `DoneScheduler::schedule`'s
        /// own contract.
        fn schedule_done(&mut self) {
            if self.shared.borrow_mut().done.schedule() {
                self.loop_handle.insert_idle(|state| state.ext_workspace_state.run_done());
            }
        }
    }

    fn encode_state(state: WorkspaceState) -> ext_workspace_handle_v1::State {
        ext_workspace_handle_v1::State::from_bits_truncate(state.bits())
    }

    /// Create one `workspace_group` resource on `manager`'s client and
    /// announce it (§4.8 "Creation"). Returns `None` if the manager's
    /// client has since vanished.
    fn instantiate_group<D>(
        dh: &DisplayHandle,
        manager: &ExtWorkspaceManagerV1,
        output_name: &str,
    ) -> Option<ExtWorkspaceGroupHandleV1>
    where
        D: Dispatch<ExtWorkspaceGroupHandleV1, GroupResourceData> + 'static,
    {
        let client = manager.client()?;
        let handle = client
            .create_resource::<ExtWorkspaceGroupHandleV1, GroupResourceData, D>(
                dh,
                manager.version(),
                GroupResourceData { output_name: output_name.to_string() },
            )
            .ok()?;
        manager.workspace_group(&handle);
        Some(handle)
    }

    /// Create one `workspace` resource on `manager`'s client, entered into
    /// `group_handle` (the same client's group handle for this workspace's
    /// output), and announce its name/state.
    fn instantiate_workspace<D>(
        dh: &DisplayHandle,
        manager: &ExtWorkspaceManagerV1,
        group_handle: &ExtWorkspaceGroupHandleV1,
        workspace: &WorkspaceRef,
    ) -> Option<ExtWorkspaceHandleV1>
    where
        D: Dispatch<ExtWorkspaceHandleV1, WorkspaceResourceData> + 'static,
    {
        let client = manager.client()?;
        let handle = client
            .create_resource::<ExtWorkspaceHandleV1, WorkspaceResourceData, D>(
                dh,
                manager.version(),
                WorkspaceResourceData { workspace: workspace.clone() },
            )
            .ok()?;
        manager.workspace(&handle);
        group_handle.workspace_enter(&handle);
        handle.name(workspace.borrow().name.clone());
        handle.state(encode_state(workspace.borrow().state()));
        Some(handle)
    }

    impl<D> GlobalDispatch<ExtWorkspaceManagerV1, (), D> for ExtWorkspaceManagerState
    where
        D: GlobalDispatch<ExtWorkspaceManagerV1, ()>
            + Dispatch<ExtWorkspaceManagerV1, ()>
            + Dispatch<ExtWorkspaceGroupHandleV1, GroupResourceData>
            + Dispatch<ExtWorkspaceHandleV1, WorkspaceResourceData>
            + AsWorkspaceProtocols
            + 'static,
    {
        fn bind(
            state: &mut D,
            handle: &DisplayHandle,
            _client: &Client,
            resource: New<ExtWorkspaceManagerV1>,
            _global_data: &(),
            data_init: &mut DataInit<'_, D>,
        ) {
            let manager = data_init.init(resource, ());
            let ws_state = state.ext_workspace_state();

            let mut new_group_handles: Vec<(String, ExtWorkspaceGroupHandleV1)> = Vec::new();
            for group in &mut ws_state.groups {
                if let Some(h) = instantiate_group::<D>(handle, &manager, &group.output_name) {
                    group.handles.push(h.clone());
                    new_group_handles.push((group.output_name.clone(), h));
                }
            }
            for entry in &mut ws_state.workspaces {
                let Some((_, group_handle)) = new_group_handles.iter().find(|(name, _)| name == &entry.output_name)
                else {
                    continue;
                };
                if let Some(h) = instantiate_workspace::<D>(handle, &manager, group_handle, &entry.workspace) {
                    entry.handles.push(h);
                }
            }
            ws_state.managers.push(manager.clone());
            manager.done();
        }
    }

    impl<D> Dispatch<ExtWorkspaceManagerV1, (), D> for ExtWorkspaceManagerState
    where
        D: Dispatch<ExtWorkspaceManagerV1, ()> + AsWorkspaceProtocols + 'static,
    {
        fn request(
            state: &mut D,
            _client: &Client,
            _resource: &ExtWorkspaceManagerV1,
            request: ext_workspace_manager_v1::Request,
            _data: &(),
            _dh: &DisplayHandle,
            _data_init: &mut DataInit<'_, D>,
        ) {
            match request {
                ext_workspace_manager_v1::Request::Commit => {
                    state.ext_workspace_state().do_commit();
                }
                ext_workspace_manager_v1::Request::Stop => {}
                _ => {}
            }
        }
    }

    impl<D> Dispatch<ExtWorkspaceGroupHandleV1, GroupResourceData, D> for ExtWorkspaceManagerState
    where
        D: Dispatch<ExtWorkspaceGroupHandleV1, GroupResourceData> + AsWorkspaceProtocols + 'static,
    {
        fn request(
            state: &mut D,
            _client: &Client,
            _resource: &ExtWorkspaceGroupHandleV1,
            request: ext_workspace_group_handle_v1::Request,
            data: &GroupResourceData,
            _dh: &DisplayHandle,
            _data_init: &mut DataInit<'_, D>,
        ) {
            if let ext_workspace_group_handle_v1::Request::CreateWorkspace { workspace: _ } = request
            {
                state
                    .ext_workspace_state()
                    .shared
                    .borrow_mut()
                    .queue_create_workspace(&data.output_name, None);
            }
        }
    }

    impl<D> Dispatch<ExtWorkspaceHandleV1, WorkspaceResourceData, D> for ExtWorkspaceManagerState
    where
        D: Dispatch<ExtWorkspaceHandleV1, WorkspaceResourceData> + AsWorkspaceProtocols + 'static,
    {
        fn request(
            state: &mut D,
            _client: &Client,
            _resource: &ExtWorkspaceHandleV1,
            request: ext_workspace_handle_v1::Request,
            data: &WorkspaceResourceData,
            _dh: &DisplayHandle,
            _data_init: &mut DataInit<'_, D>,
        ) {
            let id = data.workspace.borrow().id;
            let mut shared = state.ext_workspace_state().shared.borrow_mut();
            match request {
                ext_workspace_handle_v1::Request::Activate => shared.queue_activate(id),
                ext_workspace_handle_v1::Request::Deactivate => shared.queue_deactivate(id),
                ext_workspace_handle_v1::Request::Remove => shared.queue_remove(id),
                ext_workspace_handle_v1::Request::Destroy => {}
                _ => {}
            }
        }
    }

    /// Implemented by [`crate::state::State`] so the `Dispatch` impls
    /// above (which only see the generic `D`) can reach the one
    /// `ExtWorkspaceManagerState` field it owns.
    pub trait AsWorkspaceProtocols {
        fn ext_workspace_state(&mut self) -> &mut ExtWorkspaceManagerState;
        fn do_commit(&mut self);
    }
}

pub mod cosmic {
    //! `cosmic-workspace-unstable-v1` (version 1) — same shape as
    //! [`super::ext`], wired against the `cosmic-protocols`-generated wire
    //! types instead.
    use super::*;
    use cosmic_protocols::workspace::v1::server::{
        zcosmic_workspace_group_handle_v1::{self, ZcosmicWorkspaceGroupHandleV1},
        zcosmic_workspace_handle_v1::{self, ZcosmicWorkspaceHandleV1},
        zcosmic_workspace_manager_v1::{self, ZcosmicWorkspaceManagerV1},
    };

    struct GroupEntry {
        output_name: String,
        handles: Vec<ZcosmicWorkspaceGroupHandleV1>,
    }

    struct WorkspaceEntry {
        workspace: WorkspaceRef,
        output_name: String,
        handles: Vec<ZcosmicWorkspaceHandleV1>,
    }

    pub struct CosmicWorkspaceManagerState {
        global: GlobalId,
        loop_handle: LoopHandle<'static, State>,
        shared: Rc<RefCell<Shared>>,
        managers: Vec<ZcosmicWorkspaceManagerV1>,
        groups: Vec<GroupEntry>,
        workspaces: Vec<WorkspaceEntry>,
    }

    impl CosmicWorkspaceManagerState {
        pub fn new<D>(display: &DisplayHandle, loop_handle: LoopHandle<'static, State>) -> Self
        where
            D: GlobalDispatch<ZcosmicWorkspaceManagerV1, ()>
                + Dispatch<ZcosmicWorkspaceManagerV1, ()>
                + Dispatch<ZcosmicWorkspaceGroupHandleV1, GroupResourceData>
                + Dispatch<ZcosmicWorkspaceHandleV1, WorkspaceResourceData>
                + 'static,
        {
            let global = display.create_global::<D, ZcosmicWorkspaceManagerV1, _>(1, ());
            Self {
                global,
                loop_handle,
                shared: Rc::new(RefCell::new(Shared::default())),
                managers: Vec::new(),
                groups: Vec::new(),
                workspaces: Vec::new(),
            }
        }

        pub fn global_id(&self) -> &GlobalId {
            &self.global
        }

        /// Create `output_name`'s group on every already-bound manager
        /// client; see [`super::ext::ExtWorkspaceManagerState::add_group`].
        pub fn add_group<D>(&mut self, dh: &DisplayHandle, output_name: String)
        where
            D: Dispatch<ZcosmicWorkspaceGroupHandleV1, GroupResourceData> + 'static,
        {
            let handles = self
                .managers
                .clone()
                .into_iter()
                .filter_map(|manager| instantiate_group::<D>(dh, &manager, &output_name))
                .collect();
            self.groups.push(GroupEntry { output_name, handles });
            self.schedule_done();
        }

        pub fn workspace_created<D>(&mut self, dh: &DisplayHandle, output_name: &str, workspace: WorkspaceRef)
        where
            D: Dispatch<ZcosmicWorkspaceHandleV1, WorkspaceResourceData> + 'static,
        {
            let Some(group) = self.groups.iter().find(|g| g.output_name == output_name) else {
                return;
            };
            let handles = self
                .managers
                .iter()
                .zip(group.handles.iter())
                .filter_map(|(manager, group_handle)| instantiate_workspace::<D>(dh, manager, group_handle, &workspace))
                .collect();
            self.workspaces.push(WorkspaceEntry {
                workspace,
                output_name: output_name.to_string(),
                handles,
            });
            self.schedule_done();
        }

        pub fn workspace_removed(&mut self, workspace_id: u32) {
            if let Some(pos) = self.workspaces.iter().position(|w| w.workspace.borrow().id == workspace_id) {
                let entry = self.workspaces.remove(pos);
                for handle in &entry.handles {
                    handle.removed();
                }
            }
            self.shared.borrow_mut().last_published.remove(&workspace_id);
            self.schedule_done();
        }

        pub fn run_done(&mut self) {
            let mut shared = self.shared.borrow_mut();
            shared.done.run();

            for entry in &self.workspaces {
                let id = entry.workspace.borrow().id;
                let state = entry.workspace.borrow().state();
                let changed = shared.last_published.get(&id) != Some(&state);
                if changed {
                    shared.last_published.insert(id, state);
                    for handle in &entry.handles {
                        handle.state(encode_state(state));
                    }
                }
            }
            for manager in &self.managers {
                manager.done();
            }
        }

        pub fn commit(&mut self, sink: &mut dyn super::WorkspaceProtocolSink) {
            let scheduled = self.shared.borrow_mut().commit(sink);
            if scheduled {
                self.loop_handle.insert_idle(|state| state.cosmic_workspace_state.run_done());
            }
        }

        fn schedule_done(&mut self) {
            if self.shared.borrow_mut().done.schedule() {
                self.loop_handle.insert_idle(|state| state.cosmic_workspace_state.run_done());
            }
        }
    }

    fn encode_state(state: WorkspaceState) -> zcosmic_workspace_handle_v1::State {
        zcosmic_workspace_handle_v1::State::from_bits_truncate(state.bits())
    }

    fn instantiate_group<D>(
        dh: &DisplayHandle,
        manager: &ZcosmicWorkspaceManagerV1,
        output_name: &str,
    ) -> Option<ZcosmicWorkspaceGroupHandleV1>
    where
        D: Dispatch<ZcosmicWorkspaceGroupHandleV1, GroupResourceData> + 'static,
    {
        let client = manager.client()?;
        let handle = client
            .create_resource::<ZcosmicWorkspaceGroupHandleV1, GroupResourceData, D>(
                dh,
                manager.version(),
                GroupResourceData { output_name: output_name.to_string() },
            )
            .ok()?;
        manager.workspace_group(&handle);
        Some(handle)
    }

    fn instantiate_workspace<D>(
        dh: &DisplayHandle,
        manager: &ZcosmicWorkspaceManagerV1,
        group_handle: &ZcosmicWorkspaceGroupHandleV1,
        workspace: &WorkspaceRef,
    ) -> Option<ZcosmicWorkspaceHandleV1>
    where
        D: Dispatch<ZcosmicWorkspaceHandleV1, WorkspaceResourceData> + 'static,
    {
        let client = manager.client()?;
        let handle = client
            .create_resource::<ZcosmicWorkspaceHandleV1, WorkspaceResourceData, D>(
                dh,
                manager.version(),
                WorkspaceResourceData { workspace: workspace.clone() },
            )
            .ok()?;
        manager.workspace(&handle);
        group_handle.workspace_enter(&handle);
        handle.name(workspace.borrow().name.clone());
        handle.state(encode_state(workspace.borrow().state()));
        Some(handle)
    }

    impl<D> GlobalDispatch<ZcosmicWorkspaceManagerV1, (), D> for CosmicWorkspaceManagerState
    where
        D: GlobalDispatch<ZcosmicWorkspaceManagerV1, ()>
            + Dispatch<ZcosmicWorkspaceManagerV1, ()>
            + Dispatch<ZcosmicWorkspaceGroupHandleV1, GroupResourceData>
            + Dispatch<ZcosmicWorkspaceHandleV1, WorkspaceResourceData>
            + AsWorkspaceProtocols
            + 'static,
    {
        fn bind(
            state: &mut D,
            handle: &DisplayHandle,
            _client: &Client,
            resource: New<ZcosmicWorkspaceManagerV1>,
            _global_data: &(),
            data_init: &mut DataInit<'_, D>,
        ) {
            let manager = data_init.init(resource, ());
            let ws_state = state.cosmic_workspace_state();

            let mut new_group_handles: Vec<(String, ZcosmicWorkspaceGroupHandleV1)> = Vec::new();
            for group in &mut ws_state.groups {
                if let Some(h) = instantiate_group::<D>(handle, &manager, &group.output_name) {
                    group.handles.push(h.clone());
                    new_group_handles.push((group.output_name.clone(), h));
                }
            }
            for entry in &mut ws_state.workspaces {
                let Some((_, group_handle)) = new_group_handles.iter().find(|(name, _)| name == &entry.output_name)
                else {
                    continue;
                };
                if let Some(h) = instantiate_workspace::<D>(handle, &manager, group_handle, &entry.workspace) {
                    entry.handles.push(h);
                }
            }
            ws_state.managers.push(manager.clone());
            manager.done();
        }
    }

    impl<D> Dispatch<ZcosmicWorkspaceManagerV1, (), D> for CosmicWorkspaceManagerState
    where
        D: Dispatch<ZcosmicWorkspaceManagerV1, ()> + AsWorkspaceProtocols + 'static,
    {
        fn request(
            state: &mut D,
            _client: &Client,
            _resource: &ZcosmicWorkspaceManagerV1,
            request: zcosmic_workspace_manager_v1::Request,
            _data: &(),
            _dh: &DisplayHandle,
            _data_init: &mut DataInit<'_, D>,
        ) {
            if let zcosmic_workspace_manager_v1::Request::Commit = request {
                state.do_cosmic_commit();
            }
        }
    }

    impl<D> Dispatch<ZcosmicWorkspaceGroupHandleV1, GroupResourceData, D> for CosmicWorkspaceManagerState
    where
        D: Dispatch<ZcosmicWorkspaceGroupHandleV1, GroupResourceData> + AsWorkspaceProtocols + 'static,
    {
        fn request(
            state: &mut D,
            _client: &Client,
            _resource: &ZcosmicWorkspaceGroupHandleV1,
            request: zcosmic_workspace_group_handle_v1::Request,
            data: &GroupResourceData,
            _dh: &DisplayHandle,
            _data_init: &mut DataInit<'_, D>,
        ) {
            if let zcosmic_workspace_group_handle_v1::Request::CreateWorkspace { name } = request {
                state
                    .cosmic_workspace_state()
                    .shared
                    .borrow_mut()
                    .queue_create_workspace(&data.output_name, Some(name));
            }
        }
    }

    impl<D> Dispatch<ZcosmicWorkspaceHandleV1, WorkspaceResourceData, D> for CosmicWorkspaceManagerState
    where
        D: Dispatch<ZcosmicWorkspaceHandleV1, WorkspaceResourceData> + AsWorkspaceProtocols + 'static,
    {
        fn request(
            state: &mut D,
            _client: &Client,
            _resource: &ZcosmicWorkspaceHandleV1,
            request: zcosmic_workspace_handle_v1::Request,
            data: &WorkspaceResourceData,
            _dh: &DisplayHandle,
            _data_init: &mut DataInit<'_, D>,
        ) {
            let id = data.workspace.borrow().id;
            let mut shared = state.cosmic_workspace_state().shared.borrow_mut();
            match request {
                zcosmic_workspace_handle_v1::Request::Activate => shared.queue_activate(id),
                zcosmic_workspace_handle_v1::Request::Deactivate => shared.queue_deactivate(id),
                zcosmic_workspace_handle_v1::Request::Remove => shared.queue_remove(id),
                zcosmic_workspace_handle_v1::Request::Destroy => {}
                _ => {}
            }
        }
    }

    pub trait AsWorkspaceProtocols {
        fn cosmic_workspace_state(&mut self) -> &mut CosmicWorkspaceManagerState;
        fn do_cosmic_commit(&mut self);
    }
}

pub use ext::ExtWorkspaceManagerState;
pub use cosmic::CosmicWorkspaceManagerState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::workspace::Workspace;

    #[test]
    fn shared_commit_drains_in_order_and_resolves_output_by_source() {
        let mut shared = Shared::default();
        shared.queue_activate(1);
        shared.queue_deactivate(2);

        struct RecordingSink(Vec<String>);
        impl WorkspaceProtocolSink for RecordingSink {
            fn request_create_workspace(&mut self, output_name: &str, _name: Option<String>) {
                self.0.push(format!("create:{output_name}"));
            }
            fn request_activate(&mut self, workspace_id: u32) {
                self.0.push(format!("activate:{workspace_id}"));
            }
            fn request_deactivate(&mut self, workspace_id: u32) {
                self.0.push(format!("deactivate:{workspace_id}"));
            }
            fn request_assign(&mut self, workspace_id: u32, output_name: &str) {
                self.0.push(format!("assign:{workspace_id}:{output_name}"));
            }
            fn request_remove(&mut self, workspace_id: u32) {
                self.0.push(format!("remove:{workspace_id}"));
            }
        }

        let mut sink = RecordingSink(Vec::new());
        shared.commit(&mut sink);

        assert_eq!(sink.0, vec!["activate:1".to_string(), "deactivate:2".to_string()]);
        assert!(shared.session.is_empty());
    }

    #[test]
    fn workspace_state_bitmask_matches_active_hidden_urgent() {
        let ws = Workspace::new("1");
        assert_eq!(ws.borrow().state(), WorkspaceState::HIDDEN);

        ws.borrow_mut().active = true;
        assert_eq!(ws.borrow().state(), WorkspaceState::ACTIVE);

        ws.borrow_mut().urgent = true;
        assert_eq!(ws.borrow().state(), WorkspaceState::ACTIVE | WorkspaceState::URGENT);
    }
}
