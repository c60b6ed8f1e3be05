use crate::action::ActionCode;
use crate::event::{EngineEvent, RawCallback, UnknownReason};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("expected {expected} ':'-separated fields, got {got} in {payload:?}")]
    FieldCount {
        expected: usize,
        got: usize,
        payload: String,
    },
    #[error("non-numeric field {field:?} in {payload:?}")]
    NotNumeric { field: String, payload: String },
    #[error("position value {0} cannot be rounded to an integer")]
    BadPosition(f32),
}

/// Decodes one engine callback into a typed event.
///
/// Never fails: unrecognized codes and malformed packed strings come back as
/// [`EngineEvent::Unknown`] carrying the raw slots.
pub fn decode(
    action_code: i32,
    plugin_id: u32,
    value_1: i32,
    value_2: i32,
    value_3: i32,
    float_val: f32,
    string_val: &str,
) -> EngineEvent {
    decode_raw(&RawCallback {
        action: action_code,
        plugin_id,
        value_1,
        value_2,
        value_3,
        float_val,
        string_val: string_val.to_string(),
    })
}

pub fn decode_raw(raw: &RawCallback) -> EngineEvent {
    let Some(action) = ActionCode::from_raw(raw.action) else {
        return unknown(raw, UnknownReason::UnrecognizedCode);
    };
    match decode_action(action, raw) {
        Ok(event) => event,
        Err(e) => unknown(raw, UnknownReason::Malformed(e.to_string())),
    }
}

fn unknown(raw: &RawCallback, reason: UnknownReason) -> EngineEvent {
    EngineEvent::Unknown {
        action_code: raw.action,
        raw: raw.clone(),
        reason,
    }
}

fn decode_action(action: ActionCode, raw: &RawCallback) -> Result<EngineEvent, DecodeError> {
    use ActionCode as A;
    use EngineEvent as E;

    let plugin_id = raw.plugin_id;
    let text = || raw.string_val.clone();

    let event = match action {
        A::Debug => E::Debug {
            plugin_id,
            value_1: raw.value_1,
            value_2: raw.value_2,
            value_3: raw.value_3,
            float_val: raw.float_val,
            message: text(),
        },
        A::PluginAdded => E::PluginAdded {
            plugin_id,
            plugin_type: raw.value_1,
            name: text(),
        },
        A::PluginRemoved => E::PluginRemoved { plugin_id },
        A::PluginRenamed => E::PluginRenamed {
            plugin_id,
            new_name: text(),
        },
        A::PluginUnavailable => E::PluginUnavailable {
            plugin_id,
            reason: text(),
        },
        A::ParameterValueChanged => E::ParameterValueChanged {
            plugin_id,
            parameter_index: raw.value_1,
            value: raw.float_val,
        },
        A::ParameterDefaultChanged => E::ParameterDefaultChanged {
            plugin_id,
            parameter_index: raw.value_1,
            value: raw.float_val,
        },
        A::ParameterMappedControlIndexChanged => E::ParameterMappedControlIndexChanged {
            plugin_id,
            parameter_index: raw.value_1,
            control_index: raw.value_2,
        },
        A::ParameterMappedRangeChanged => {
            let (minimum, maximum) = parse_mapped_range(&raw.string_val)?;
            E::ParameterMappedRangeChanged {
                plugin_id,
                parameter_index: raw.value_1,
                minimum,
                maximum,
            }
        }
        A::ParameterMidiChannelChanged => E::ParameterMidiChannelChanged {
            plugin_id,
            parameter_index: raw.value_1,
            channel: raw.value_2,
        },
        A::OptionChanged => E::OptionChanged {
            plugin_id,
            option: raw.value_1,
            enabled: raw.value_2 != 0,
        },
        A::ProgramChanged => E::ProgramChanged {
            plugin_id,
            program_index: raw.value_1,
        },
        A::MidiProgramChanged => E::MidiProgramChanged {
            plugin_id,
            program_index: raw.value_1,
        },
        A::UiStateChanged => E::UiStateChanged {
            plugin_id,
            state: raw.value_1,
        },
        A::NoteOn => E::NoteOn {
            plugin_id,
            channel: raw.value_1,
            note: raw.value_2,
            velocity: raw.value_3,
        },
        A::NoteOff => E::NoteOff {
            plugin_id,
            channel: raw.value_1,
            note: raw.value_2,
        },
        A::Update => E::Update { plugin_id },
        A::ReloadInfo => E::ReloadInfo { plugin_id },
        A::ReloadParameters => E::ReloadParameters { plugin_id },
        A::ReloadPrograms => E::ReloadPrograms { plugin_id },
        A::ReloadAll => E::ReloadAll { plugin_id },
        A::PatchbayClientAdded => E::PatchbayClientAdded {
            client_id: plugin_id,
            icon: raw.value_1,
            plugin_id: raw.value_2,
            name: text(),
        },
        A::PatchbayClientRemoved => E::PatchbayClientRemoved {
            client_id: plugin_id,
        },
        A::PatchbayClientRenamed => E::PatchbayClientRenamed {
            client_id: plugin_id,
            new_name: text(),
        },
        A::PatchbayClientDataChanged => E::PatchbayClientDataChanged {
            client_id: plugin_id,
            icon: raw.value_1,
            plugin_id: raw.value_2,
        },
        A::PatchbayClientPositionChanged => E::PatchbayClientPositionChanged {
            client_id: plugin_id,
            x1: raw.value_1,
            y1: raw.value_2,
            x2: raw.value_3,
            y2: round_position(raw.float_val)?,
        },
        A::PatchbayPortAdded => E::PatchbayPortAdded {
            client_id: plugin_id,
            port_id: raw.value_1,
            hints: raw.value_2,
            group_id: raw.value_3,
            name: text(),
        },
        A::PatchbayPortRemoved => E::PatchbayPortRemoved {
            client_id: plugin_id,
            port_id: raw.value_1,
        },
        A::PatchbayPortChanged => E::PatchbayPortChanged {
            client_id: plugin_id,
            port_id: raw.value_1,
            hints: raw.value_2,
            group_id: raw.value_3,
            name: text(),
        },
        A::PatchbayPortGroupAdded => E::PatchbayPortGroupAdded {
            client_id: plugin_id,
            group_id: raw.value_1,
            hints: raw.value_2,
            name: text(),
        },
        A::PatchbayPortGroupRemoved => E::PatchbayPortGroupRemoved {
            client_id: plugin_id,
            group_id: raw.value_1,
        },
        A::PatchbayPortGroupChanged => E::PatchbayPortGroupChanged {
            client_id: plugin_id,
            group_id: raw.value_1,
            hints: raw.value_2,
            name: text(),
        },
        A::PatchbayConnectionAdded => {
            let [out_client, out_port, in_client, in_port] =
                parse_connection(&raw.string_val)?;
            E::PatchbayConnectionAdded {
                connection_id: plugin_id,
                out_client,
                out_port,
                in_client,
                in_port,
            }
        }
        A::PatchbayConnectionRemoved => E::PatchbayConnectionRemoved {
            connection_id: plugin_id,
        },
        A::EngineStarted => E::EngineStarted {
            plugin_count: plugin_id,
            process_mode: raw.value_1,
            transport_mode: raw.value_2,
            buffer_size: raw.value_3,
            sample_rate: raw.float_val,
            driver_name: text(),
        },
        A::EngineStopped => E::EngineStopped,
        A::ProcessModeChanged => E::ProcessModeChanged {
            process_mode: raw.value_1,
        },
        A::TransportModeChanged => E::TransportModeChanged {
            transport_mode: raw.value_1,
            transport_extra: text(),
        },
        A::BufferSizeChanged => E::BufferSizeChanged {
            buffer_size: raw.value_1,
        },
        A::SampleRateChanged => E::SampleRateChanged {
            sample_rate: raw.float_val,
        },
        A::CancelableAction => E::CancelableAction {
            plugin_id,
            started: raw.value_1 != 0,
            action_name: text(),
        },
        A::ProjectLoadFinished | A::Nsm | A::Idle => E::NoOp { action },
        A::Info => E::Info { message: text() },
        A::Error => E::Error { message: text() },
        A::Quit => E::Quit,
        A::InlineDisplayRedraw => E::InlineDisplayRedraw { plugin_id },
    };
    Ok(event)
}

/// `"<min>:<max>"`, split once.
pub fn parse_mapped_range(payload: &str) -> Result<(f32, f32), DecodeError> {
    let Some((min, max)) = payload.split_once(':') else {
        return Err(DecodeError::FieldCount {
            expected: 2,
            got: 1,
            payload: payload.to_string(),
        });
    };
    Ok((parse_field(min, payload)?, parse_field(max, payload)?))
}

/// `"<out_client>:<out_port>:<in_client>:<in_port>"`.
pub fn parse_connection(payload: &str) -> Result<[i32; 4], DecodeError> {
    let fields: Vec<&str> = payload.split(':').collect();
    if fields.len() != 4 {
        return Err(DecodeError::FieldCount {
            expected: 4,
            got: fields.len(),
            payload: payload.to_string(),
        });
    }
    let mut out = [0; 4];
    for (slot, field) in out.iter_mut().zip(fields) {
        *slot = parse_field(field, payload)?;
    }
    Ok(out)
}

/// Rounds half to even, so 2.5 becomes 2 and 3.5 becomes 4.
pub fn round_position(value: f32) -> Result<i32, DecodeError> {
    let rounded = value.round_ties_even();
    if !rounded.is_finite() || rounded < i32::MIN as f32 || rounded >= i32::MAX as f32 {
        return Err(DecodeError::BadPosition(value));
    }
    Ok(rounded as i32)
}

fn parse_field<T: std::str::FromStr>(field: &str, payload: &str) -> Result<T, DecodeError> {
    field.trim().parse().map_err(|_| DecodeError::NotNumeric {
        field: field.to_string(),
        payload: payload.to_string(),
    })
}
