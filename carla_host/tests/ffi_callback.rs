use carla_host::{engine_callback, ActionCode, Dispatcher, EngineEvent};
use std::ffi::CString;
use std::ptr;

fn fire(d: &Dispatcher, action: ActionCode, plugin_id: u32, v1: i32, f: f32, s: Option<&CString>) {
    let s = s.map_or(ptr::null(), |s| s.as_ptr());
    unsafe {
        engine_callback(
            d.as_callback_context(),
            action.as_raw(),
            plugin_id,
            v1,
            0,
            0,
            f,
            s,
        )
    };
}

#[test]
fn callback_reaches_the_dispatcher() {
    let d = Dispatcher::new();
    let (_id, rx) = d.event_channel(8);
    let name = CString::new("Synth").unwrap();

    fire(&d, ActionCode::PluginAdded, 7, 2, 0.0, Some(&name));

    assert!(d.is_plugin_live(7));
    assert_eq!(
        rx.try_recv().unwrap(),
        EngineEvent::PluginAdded {
            plugin_id: 7,
            plugin_type: 2,
            name: "Synth".to_string(),
        }
    );
}

#[test]
fn null_string_reads_as_empty() {
    let d = Dispatcher::new();
    let (_id, rx) = d.event_channel(8);

    fire(&d, ActionCode::PluginAdded, 1, 0, 0.0, None);
    fire(&d, ActionCode::ParameterValueChanged, 1, 3, 0.75, None);

    let got: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        got,
        vec![
            EngineEvent::PluginAdded {
                plugin_id: 1,
                plugin_type: 0,
                name: String::new(),
            },
            EngineEvent::ParameterValueChanged {
                plugin_id: 1,
                parameter_index: 3,
                value: 0.75,
            },
        ]
    );
}

#[test]
fn invalid_utf8_is_replaced() {
    let d = Dispatcher::new();
    let (_id, rx) = d.event_channel(8);
    let bytes = CString::new(vec![b'F', b'x', 0xff]).unwrap();

    fire(&d, ActionCode::Info, 0, 0, 0.0, Some(&bytes));

    assert_eq!(
        rx.try_recv().unwrap(),
        EngineEvent::Info {
            message: "Fx\u{fffd}".to_string(),
        }
    );
}

#[test]
fn null_context_is_ignored() {
    let text = CString::new("ignored").unwrap();
    unsafe {
        engine_callback(
            ptr::null_mut(),
            ActionCode::PluginAdded.as_raw(),
            1,
            0,
            0,
            0,
            0.0,
            text.as_ptr(),
        )
    };
}

#[test]
fn unknown_codes_through_the_callback_are_dropped() {
    let d = Dispatcher::new();
    let (_id, rx) = d.event_channel(8);
    unsafe { engine_callback(d.as_callback_context(), 4096, 0, 0, 0, 0, 0.0, ptr::null()) };
    assert!(rx.try_recv().is_err());
}
