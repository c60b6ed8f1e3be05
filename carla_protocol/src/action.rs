use serde::{Deserialize, Serialize};

/// Carla's `EngineCallbackOpcode`, the first argument of every engine callback.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ActionCode {
    Debug = 0,
    PluginAdded = 1,
    PluginRemoved = 2,
    PluginRenamed = 3,
    PluginUnavailable = 4,
    ParameterValueChanged = 5,
    ParameterDefaultChanged = 6,
    ParameterMappedControlIndexChanged = 7,
    ParameterMidiChannelChanged = 8,
    OptionChanged = 9,
    ProgramChanged = 10,
    MidiProgramChanged = 11,
    UiStateChanged = 12,
    NoteOn = 13,
    NoteOff = 14,
    Update = 15,
    ReloadInfo = 16,
    ReloadParameters = 17,
    ReloadPrograms = 18,
    ReloadAll = 19,
    PatchbayClientAdded = 20,
    PatchbayClientRemoved = 21,
    PatchbayClientRenamed = 22,
    PatchbayClientDataChanged = 23,
    PatchbayPortAdded = 24,
    PatchbayPortRemoved = 25,
    PatchbayPortChanged = 26,
    PatchbayConnectionAdded = 27,
    PatchbayConnectionRemoved = 28,
    EngineStarted = 29,
    EngineStopped = 30,
    ProcessModeChanged = 31,
    TransportModeChanged = 32,
    BufferSizeChanged = 33,
    SampleRateChanged = 34,
    CancelableAction = 35,
    ProjectLoadFinished = 36,
    Nsm = 37,
    Idle = 38,
    Info = 39,
    Error = 40,
    Quit = 41,
    InlineDisplayRedraw = 42,
    PatchbayPortGroupAdded = 43,
    PatchbayPortGroupRemoved = 44,
    PatchbayPortGroupChanged = 45,
    ParameterMappedRangeChanged = 46,
    PatchbayClientPositionChanged = 47,
}

impl ActionCode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        use ActionCode::*;
        let code = match raw {
            0 => Debug,
            1 => PluginAdded,
            2 => PluginRemoved,
            3 => PluginRenamed,
            4 => PluginUnavailable,
            5 => ParameterValueChanged,
            6 => ParameterDefaultChanged,
            7 => ParameterMappedControlIndexChanged,
            8 => ParameterMidiChannelChanged,
            9 => OptionChanged,
            10 => ProgramChanged,
            11 => MidiProgramChanged,
            12 => UiStateChanged,
            13 => NoteOn,
            14 => NoteOff,
            15 => Update,
            16 => ReloadInfo,
            17 => ReloadParameters,
            18 => ReloadPrograms,
            19 => ReloadAll,
            20 => PatchbayClientAdded,
            21 => PatchbayClientRemoved,
            22 => PatchbayClientRenamed,
            23 => PatchbayClientDataChanged,
            24 => PatchbayPortAdded,
            25 => PatchbayPortRemoved,
            26 => PatchbayPortChanged,
            27 => PatchbayConnectionAdded,
            28 => PatchbayConnectionRemoved,
            29 => EngineStarted,
            30 => EngineStopped,
            31 => ProcessModeChanged,
            32 => TransportModeChanged,
            33 => BufferSizeChanged,
            34 => SampleRateChanged,
            35 => CancelableAction,
            36 => ProjectLoadFinished,
            37 => Nsm,
            38 => Idle,
            39 => Info,
            40 => Error,
            41 => Quit,
            42 => InlineDisplayRedraw,
            43 => PatchbayPortGroupAdded,
            44 => PatchbayPortGroupRemoved,
            45 => PatchbayPortGroupChanged,
            46 => ParameterMappedRangeChanged,
            47 => PatchbayClientPositionChanged,
            _ => return None,
        };
        Some(code)
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Codes that are part of the callback table but carry nothing the host acts on.
    pub fn is_inert(self) -> bool {
        matches!(
            self,
            ActionCode::ProjectLoadFinished | ActionCode::Nsm | ActionCode::Idle
        )
    }
}

impl TryFrom<i32> for ActionCode {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, i32> {
        ActionCode::from_raw(raw).ok_or(raw)
    }
}
