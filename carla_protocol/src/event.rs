use crate::action::ActionCode;
use serde::{Deserialize, Serialize};

/// One engine callback invocation, with the string slot already converted to text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawCallback {
    pub action: i32,
    #[serde(default)]
    pub plugin_id: u32,
    #[serde(default)]
    pub value_1: i32,
    #[serde(default)]
    pub value_2: i32,
    #[serde(default)]
    pub value_3: i32,
    #[serde(default)]
    pub float_val: f32,
    #[serde(default)]
    pub string_val: String,
}

impl RawCallback {
    pub fn new(action: ActionCode) -> Self {
        Self {
            action: action.as_raw(),
            plugin_id: 0,
            value_1: 0,
            value_2: 0,
            value_3: 0,
            float_val: 0.0,
            string_val: String::new(),
        }
    }

    pub fn plugin(mut self, plugin_id: u32) -> Self {
        self.plugin_id = plugin_id;
        self
    }

    pub fn values(mut self, value_1: i32, value_2: i32, value_3: i32) -> Self {
        self.value_1 = value_1;
        self.value_2 = value_2;
        self.value_3 = value_3;
        self
    }

    pub fn float(mut self, float_val: f32) -> Self {
        self.float_val = float_val;
        self
    }

    pub fn text(mut self, string_val: impl Into<String>) -> Self {
        self.string_val = string_val.into();
        self
    }

    pub fn decode(&self) -> EngineEvent {
        crate::decode::decode_raw(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum UnknownReason {
    UnrecognizedCode,
    Malformed(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EngineEvent {
    Debug {
        plugin_id: u32,
        value_1: i32,
        value_2: i32,
        value_3: i32,
        float_val: f32,
        message: String,
    },
    PluginAdded {
        plugin_id: u32,
        plugin_type: i32,
        name: String,
    },
    PluginRemoved {
        plugin_id: u32,
    },
    PluginRenamed {
        plugin_id: u32,
        new_name: String,
    },
    PluginUnavailable {
        plugin_id: u32,
        reason: String,
    },
    ParameterValueChanged {
        plugin_id: u32,
        parameter_index: i32,
        value: f32,
    },
    ParameterDefaultChanged {
        plugin_id: u32,
        parameter_index: i32,
        value: f32,
    },
    ParameterMappedControlIndexChanged {
        plugin_id: u32,
        parameter_index: i32,
        control_index: i32,
    },
    ParameterMappedRangeChanged {
        plugin_id: u32,
        parameter_index: i32,
        minimum: f32,
        maximum: f32,
    },
    ParameterMidiChannelChanged {
        plugin_id: u32,
        parameter_index: i32,
        channel: i32,
    },
    OptionChanged {
        plugin_id: u32,
        option: i32,
        enabled: bool,
    },
    ProgramChanged {
        plugin_id: u32,
        program_index: i32,
    },
    MidiProgramChanged {
        plugin_id: u32,
        program_index: i32,
    },
    UiStateChanged {
        plugin_id: u32,
        state: i32,
    },
    NoteOn {
        plugin_id: u32,
        channel: i32,
        note: i32,
        velocity: i32,
    },
    NoteOff {
        plugin_id: u32,
        channel: i32,
        note: i32,
    },
    Update {
        plugin_id: u32,
    },
    ReloadInfo {
        plugin_id: u32,
    },
    ReloadParameters {
        plugin_id: u32,
    },
    ReloadPrograms {
        plugin_id: u32,
    },
    ReloadAll {
        plugin_id: u32,
    },
    PatchbayClientAdded {
        client_id: u32,
        icon: i32,
        plugin_id: i32,
        name: String,
    },
    PatchbayClientRemoved {
        client_id: u32,
    },
    PatchbayClientRenamed {
        client_id: u32,
        new_name: String,
    },
    PatchbayClientDataChanged {
        client_id: u32,
        icon: i32,
        plugin_id: i32,
    },
    PatchbayClientPositionChanged {
        client_id: u32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    },
    PatchbayPortAdded {
        client_id: u32,
        port_id: i32,
        hints: i32,
        group_id: i32,
        name: String,
    },
    PatchbayPortRemoved {
        client_id: u32,
        port_id: i32,
    },
    PatchbayPortChanged {
        client_id: u32,
        port_id: i32,
        hints: i32,
        group_id: i32,
        name: String,
    },
    PatchbayPortGroupAdded {
        client_id: u32,
        group_id: i32,
        hints: i32,
        name: String,
    },
    PatchbayPortGroupRemoved {
        client_id: u32,
        group_id: i32,
    },
    PatchbayPortGroupChanged {
        client_id: u32,
        group_id: i32,
        hints: i32,
        name: String,
    },
    PatchbayConnectionAdded {
        connection_id: u32,
        out_client: i32,
        out_port: i32,
        in_client: i32,
        in_port: i32,
    },
    PatchbayConnectionRemoved {
        connection_id: u32,
    },
    EngineStarted {
        plugin_count: u32,
        process_mode: i32,
        transport_mode: i32,
        buffer_size: i32,
        sample_rate: f32,
        driver_name: String,
    },
    EngineStopped,
    ProcessModeChanged {
        process_mode: i32,
    },
    TransportModeChanged {
        transport_mode: i32,
        transport_extra: String,
    },
    BufferSizeChanged {
        buffer_size: i32,
    },
    SampleRateChanged {
        sample_rate: f32,
    },
    CancelableAction {
        plugin_id: u32,
        started: bool,
        action_name: String,
    },
    Info {
        message: String,
    },
    Error {
        message: String,
    },
    Quit,
    InlineDisplayRedraw {
        plugin_id: u32,
    },
    /// Published by the host after the last live plugin has been removed.
    LastPluginRemoved,
    NoOp {
        action: ActionCode,
    },
    Unknown {
        action_code: i32,
        raw: RawCallback,
        reason: UnknownReason,
    },
}

impl EngineEvent {
    /// The callback code this event was decoded from. `None` for host-synthesized events.
    pub fn action_code(&self) -> Option<ActionCode> {
        use EngineEvent as E;
        let code = match self {
            E::Debug { .. } => ActionCode::Debug,
            E::PluginAdded { .. } => ActionCode::PluginAdded,
            E::PluginRemoved { .. } => ActionCode::PluginRemoved,
            E::PluginRenamed { .. } => ActionCode::PluginRenamed,
            E::PluginUnavailable { .. } => ActionCode::PluginUnavailable,
            E::ParameterValueChanged { .. } => ActionCode::ParameterValueChanged,
            E::ParameterDefaultChanged { .. } => ActionCode::ParameterDefaultChanged,
            E::ParameterMappedControlIndexChanged { .. } => {
                ActionCode::ParameterMappedControlIndexChanged
            }
            E::ParameterMappedRangeChanged { .. } => ActionCode::ParameterMappedRangeChanged,
            E::ParameterMidiChannelChanged { .. } => ActionCode::ParameterMidiChannelChanged,
            E::OptionChanged { .. } => ActionCode::OptionChanged,
            E::ProgramChanged { .. } => ActionCode::ProgramChanged,
            E::MidiProgramChanged { .. } => ActionCode::MidiProgramChanged,
            E::UiStateChanged { .. } => ActionCode::UiStateChanged,
            E::NoteOn { .. } => ActionCode::NoteOn,
            E::NoteOff { .. } => ActionCode::NoteOff,
            E::Update { .. } => ActionCode::Update,
            E::ReloadInfo { .. } => ActionCode::ReloadInfo,
            E::ReloadParameters { .. } => ActionCode::ReloadParameters,
            E::ReloadPrograms { .. } => ActionCode::ReloadPrograms,
            E::ReloadAll { .. } => ActionCode::ReloadAll,
            E::PatchbayClientAdded { .. } => ActionCode::PatchbayClientAdded,
            E::PatchbayClientRemoved { .. } => ActionCode::PatchbayClientRemoved,
            E::PatchbayClientRenamed { .. } => ActionCode::PatchbayClientRenamed,
            E::PatchbayClientDataChanged { .. } => ActionCode::PatchbayClientDataChanged,
            E::PatchbayClientPositionChanged { .. } => ActionCode::PatchbayClientPositionChanged,
            E::PatchbayPortAdded { .. } => ActionCode::PatchbayPortAdded,
            E::PatchbayPortRemoved { .. } => ActionCode::PatchbayPortRemoved,
            E::PatchbayPortChanged { .. } => ActionCode::PatchbayPortChanged,
            E::PatchbayPortGroupAdded { .. } => ActionCode::PatchbayPortGroupAdded,
            E::PatchbayPortGroupRemoved { .. } => ActionCode::PatchbayPortGroupRemoved,
            E::PatchbayPortGroupChanged { .. } => ActionCode::PatchbayPortGroupChanged,
            E::PatchbayConnectionAdded { .. } => ActionCode::PatchbayConnectionAdded,
            E::PatchbayConnectionRemoved { .. } => ActionCode::PatchbayConnectionRemoved,
            E::EngineStarted { .. } => ActionCode::EngineStarted,
            E::EngineStopped => ActionCode::EngineStopped,
            E::ProcessModeChanged { .. } => ActionCode::ProcessModeChanged,
            E::TransportModeChanged { .. } => ActionCode::TransportModeChanged,
            E::BufferSizeChanged { .. } => ActionCode::BufferSizeChanged,
            E::SampleRateChanged { .. } => ActionCode::SampleRateChanged,
            E::CancelableAction { .. } => ActionCode::CancelableAction,
            E::Info { .. } => ActionCode::Info,
            E::Error { .. } => ActionCode::Error,
            E::Quit => ActionCode::Quit,
            E::InlineDisplayRedraw { .. } => ActionCode::InlineDisplayRedraw,
            E::NoOp { action } => *action,
            E::LastPluginRemoved | E::Unknown { .. } => return None,
        };
        Some(code)
    }

    /// The plugin this event is about, for plugin-scoped events.
    pub fn plugin_id(&self) -> Option<u32> {
        use EngineEvent as E;
        match self {
            E::Debug { plugin_id, .. }
            | E::PluginAdded { plugin_id, .. }
            | E::PluginRemoved { plugin_id }
            | E::PluginRenamed { plugin_id, .. }
            | E::PluginUnavailable { plugin_id, .. }
            | E::ParameterValueChanged { plugin_id, .. }
            | E::ParameterDefaultChanged { plugin_id, .. }
            | E::ParameterMappedControlIndexChanged { plugin_id, .. }
            | E::ParameterMappedRangeChanged { plugin_id, .. }
            | E::ParameterMidiChannelChanged { plugin_id, .. }
            | E::OptionChanged { plugin_id, .. }
            | E::ProgramChanged { plugin_id, .. }
            | E::MidiProgramChanged { plugin_id, .. }
            | E::UiStateChanged { plugin_id, .. }
            | E::NoteOn { plugin_id, .. }
            | E::NoteOff { plugin_id, .. }
            | E::Update { plugin_id }
            | E::ReloadInfo { plugin_id }
            | E::ReloadParameters { plugin_id }
            | E::ReloadPrograms { plugin_id }
            | E::ReloadAll { plugin_id }
            | E::CancelableAction { plugin_id, .. }
            | E::InlineDisplayRedraw { plugin_id } => Some(*plugin_id),
            _ => None,
        }
    }
}
