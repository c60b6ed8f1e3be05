use carla_host::{
    ActionCode, Dispatcher, EngineEvent, ErrorReport, FaultKind, ListenerError, PluginListener,
    PluginRecord, RawCallback,
};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

fn added(plugin_id: u32, name: &str) -> RawCallback {
    RawCallback::new(ActionCode::PluginAdded)
        .plugin(plugin_id)
        .values(4, 0, 0)
        .text(name)
}

fn removed(plugin_id: u32) -> RawCallback {
    RawCallback::new(ActionCode::PluginRemoved).plugin(plugin_id)
}

fn param(plugin_id: u32, index: i32, value: f32) -> RawCallback {
    RawCallback::new(ActionCode::ParameterValueChanged)
        .plugin(plugin_id)
        .values(index, 0, 0)
        .float(value)
}

fn events(rx: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
    rx.try_iter().collect()
}

fn reports(rx: &Receiver<ErrorReport>) -> Vec<ErrorReport> {
    rx.try_iter().collect()
}

struct Watcher {
    log: Arc<Mutex<Vec<String>>>,
}

impl PluginListener for Watcher {
    fn on_added(&self, plugin: &PluginRecord) -> Result<(), ListenerError> {
        self.log.lock().unwrap().push(format!("added {}", plugin.moniker));
        Ok(())
    }

    fn on_ready(&self, plugin: &PluginRecord) -> Result<(), ListenerError> {
        self.log.lock().unwrap().push(format!("ready {}", plugin.plugin_id));
        Ok(())
    }

    fn on_removed(&self, plugin: &PluginRecord) -> Result<(), ListenerError> {
        assert!(plugin.removed);
        self.log.lock().unwrap().push(format!("removed {}", plugin.plugin_id));
        Ok(())
    }
}

#[test]
fn plugin_round_trip_updates_monikers_and_announces_last_removal() {
    let d = Dispatcher::new();
    let (_id, rx) = d.event_channel(16);

    d.handle(&added(7, "Synth"));
    assert!(d.is_plugin_live(7));
    assert_eq!(d.moniker_count("Synth"), Some(1));
    d.with_registry(|r| {
        let record = r.get(7).unwrap();
        assert_eq!(record.moniker, "Synth");
        assert_eq!(record.plugin_type, 4);
    });

    d.handle(&removed(7));
    assert!(!d.is_plugin_live(7));
    assert_eq!(d.moniker_count("Synth"), Some(0));

    let got = events(&rx);
    assert_eq!(got.len(), 3);
    assert!(matches!(got[0], EngineEvent::PluginAdded { plugin_id: 7, .. }));
    assert_eq!(got[1], EngineEvent::PluginRemoved { plugin_id: 7 });
    assert_eq!(got[2], EngineEvent::LastPluginRemoved);
}

#[test]
fn second_instance_of_a_name_gets_a_suffix() {
    let d = Dispatcher::new();
    d.handle(&added(1, "Reverb"));
    d.handle(&added(2, "Reverb"));
    d.with_registry(|r| {
        assert_eq!(r.get(1).unwrap().moniker, "Reverb");
        assert_eq!(r.get(2).unwrap().moniker, "Reverb 2");
    });

    let (_id, rx) = d.event_channel(16);
    d.handle(&removed(1));
    assert_eq!(d.moniker_count("Reverb"), Some(1));
    assert!(!events(&rx).contains(&EngineEvent::LastPluginRemoved));
}

#[test]
fn custom_moniker_function_is_used() {
    let d = Dispatcher::with_monikers(|name, n| format!("{name} #{n}"));
    d.handle(&added(1, "Comp"));
    d.handle(&added(2, "Comp"));
    d.with_registry(|r| {
        assert_eq!(r.get(1).unwrap().moniker, "Comp #1");
        assert_eq!(r.get(2).unwrap().moniker, "Comp #2");
    });
}

#[test]
fn listeners_see_the_registry_already_updated() {
    let d = Dispatcher::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    d.subscribe_fn("order", move |event, view| {
        let live = view.registry.is_live(3);
        match event {
            EngineEvent::PluginAdded { .. } => log.lock().unwrap().push(("added", live)),
            EngineEvent::ParameterValueChanged { .. } => {
                log.lock().unwrap().push(("param", live))
            }
            EngineEvent::PluginRemoved { .. } => log.lock().unwrap().push(("removed", live)),
            _ => {}
        }
        Ok(())
    });

    d.handle(&added(3, "EQ"));
    d.handle(&param(3, 0, 0.5));
    d.handle(&removed(3));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("added", true), ("param", true), ("removed", false)]
    );
}

#[test]
fn double_remove_is_reported_once_without_double_decrement() {
    let d = Dispatcher::new();
    let (_eid, events_rx) = d.event_channel(16);
    let (_rid, errors_rx) = d.error_channel(16);

    d.handle(&added(1, "Gate"));
    d.handle(&removed(1));
    d.handle(&removed(1));

    assert_eq!(d.moniker_count("Gate"), Some(0));
    let errs = reports(&errors_rx);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind, FaultKind::RegistryInconsistency);
    assert!(errs[0].message.contains("not registered"));

    let got = events(&events_rx);
    let removals = got
        .iter()
        .filter(|e| matches!(e, EngineEvent::PluginRemoved { .. }))
        .count();
    let lasts = got
        .iter()
        .filter(|e| **e == EngineEvent::LastPluginRemoved)
        .count();
    assert_eq!(removals, 2);
    assert_eq!(lasts, 1);
}

#[test]
fn duplicate_add_keeps_first_record_and_is_reported() {
    let d = Dispatcher::new();
    let (_rid, errors_rx) = d.error_channel(16);
    d.handle(&added(2, "Delay"));
    d.handle(&added(2, "Chorus"));

    d.with_registry(|r| assert_eq!(r.get(2).unwrap().original_name, "Delay"));
    assert_eq!(d.moniker_count("Chorus"), None);
    let errs = reports(&errors_rx);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind, FaultKind::RegistryInconsistency);
}

#[test]
fn failing_listeners_do_not_stop_delivery() {
    let d = Dispatcher::new();
    let (_rid, errors_rx) = d.error_channel(16);
    d.subscribe_fn("panicky", |event, _| {
        if matches!(event, EngineEvent::PluginAdded { .. }) {
            panic!("listener blew up");
        }
        Ok(())
    });
    d.subscribe_fn("failing", |_, _| Err("nope".into()));
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    d.subscribe_fn("healthy", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    d.handle(&added(1, "Synth"));
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert!(d.is_plugin_live(1));

    let errs = reports(&errors_rx);
    assert_eq!(errs.len(), 2);
    assert_eq!(errs[0].kind, FaultKind::Panic);
    assert_eq!(errs[0].message, "listener blew up");
    assert!(errs[0].origin.starts_with("listener `panicky`"));
    assert_eq!(errs[1].kind, FaultKind::ListenerFailed);
    assert_eq!(errs[1].message, "nope");
    assert_eq!(errs[1].origin, "listener `failing`");

    // the dispatcher keeps working afterwards
    d.handle(&param(1, 2, 0.1));
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
}

#[test]
fn panicking_error_listener_is_contained() {
    let d = Dispatcher::new();
    d.subscribe_errors(Arc::new(|_: &ErrorReport| panic!("error sink broke")));
    let (_rid, errors_rx) = d.error_channel(4);

    d.handle(&removed(99));
    assert_eq!(reports(&errors_rx).len(), 1);
}

#[test]
fn engine_started_is_mirrored() {
    let d = Dispatcher::new();
    let mode_in_view = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&mode_in_view);
    d.subscribe_fn("state", move |event, view| {
        if matches!(event, EngineEvent::EngineStarted { .. }) {
            *slot.lock().unwrap() = view.state.process_mode();
        }
        Ok(())
    });

    d.handle(
        &RawCallback::new(ActionCode::EngineStarted)
            .values(2, 1, 0)
            .float(48000.0)
            .text("JACK"),
    );

    let state = d.engine_state().expect("engine running");
    assert_eq!(state.process_mode, 2);
    assert_eq!(state.transport_mode, 1);
    assert_eq!(state.buffer_size, 0);
    assert_eq!(state.sample_rate, 48000.0);
    assert_eq!(state.driver_name, "JACK");
    assert_eq!(*mode_in_view.lock().unwrap(), Some(2));

    d.handle(
        &RawCallback::new(ActionCode::TransportModeChanged)
            .values(3, 0, 0)
            .text("link"),
    );
    assert_eq!(d.state().transport_mode(), Some(3));
    assert_eq!(d.state().transport_extra().as_deref(), Some("link"));

    d.handle(&RawCallback::new(ActionCode::EngineStopped));
    assert!(d.engine_state().is_none());
}

#[test]
fn patchbay_connection_is_mirrored() {
    let d = Dispatcher::new();
    let (_id, rx) = d.event_channel(16);
    d.handle(
        &RawCallback::new(ActionCode::PatchbayConnectionAdded)
            .plugin(9)
            .text("1:2:3:4"),
    );

    assert_eq!(
        events(&rx),
        vec![EngineEvent::PatchbayConnectionAdded {
            connection_id: 9,
            out_client: 1,
            out_port: 2,
            in_client: 3,
            in_port: 4,
        }]
    );
    d.with_patchbay(|pb| {
        let conn = pb.connection(9).expect("connection mirrored");
        assert_eq!((conn.out_client, conn.out_port), (1, 2));
        assert_eq!((conn.in_client, conn.in_port), (3, 4));
    });

    d.handle(&RawCallback::new(ActionCode::PatchbayConnectionRemoved).plugin(9));
    d.with_patchbay(|pb| assert!(pb.connection(9).is_none()));
}

#[test]
fn unknown_malformed_and_inert_callbacks_are_not_published() {
    let d = Dispatcher::new();
    let (_eid, events_rx) = d.event_channel(16);
    let (_rid, errors_rx) = d.error_channel(16);

    d.handle(&RawCallback {
        action: 999,
        ..RawCallback::new(ActionCode::Debug)
    });
    d.handle(
        &RawCallback::new(ActionCode::PatchbayConnectionAdded)
            .plugin(1)
            .text("1:2:x"),
    );
    d.handle(&RawCallback::new(ActionCode::Idle));
    d.handle(&RawCallback::new(ActionCode::ProjectLoadFinished));

    assert!(events(&events_rx).is_empty());
    assert!(reports(&errors_rx).is_empty());
    d.with_patchbay(|pb| assert_eq!(pb.connections().count(), 0));
}

#[test]
fn plugin_watchers_fire_in_order() {
    let d = Dispatcher::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let general = Arc::clone(&log);
    d.subscribe_fn("general", move |event, _| {
        if let Some(id) = event.plugin_id() {
            general.lock().unwrap().push(format!("event {id}"));
        }
        Ok(())
    });
    d.watch_plugin(
        5,
        Arc::new(Watcher {
            log: Arc::clone(&log),
        }),
    );

    d.handle(&added(5, "Amp"));
    d.plugin_ready(5);
    d.plugin_ready(5);
    d.handle(&removed(5));
    // watchers are dropped with the plugin
    d.handle(&added(5, "Amp"));

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "event 5",
            "added Amp",
            "ready 5",
            "event 5",
            "removed 5",
            "event 5",
        ]
    );
}

#[test]
fn ready_for_unknown_plugin_is_an_inconsistency() {
    let d = Dispatcher::new();
    let (_rid, errors_rx) = d.error_channel(4);
    d.plugin_ready(42);
    let errs = reports(&errors_rx);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind, FaultKind::RegistryInconsistency);
}

#[test]
fn subscriptions_made_during_delivery_apply_from_the_next_event() {
    let d = Arc::new(Dispatcher::new());
    let inner_hits = Arc::new(AtomicUsize::new(0));
    let subscribed = Arc::new(AtomicBool::new(false));

    let weak = Arc::downgrade(&d);
    let hits = Arc::clone(&inner_hits);
    let once = Arc::clone(&subscribed);
    d.subscribe_fn("outer", move |_, _| {
        if once.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(d) = weak.upgrade() {
            let hits = Arc::clone(&hits);
            d.subscribe_fn("inner", move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        Ok(())
    });

    d.handle(&added(1, "A"));
    assert_eq!(inner_hits.load(Ordering::SeqCst), 0);
    d.handle(&param(1, 0, 1.0));
    assert_eq!(inner_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn unsubscribed_listeners_stop_receiving() {
    let d = Dispatcher::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let id = d.subscribe_fn("counter", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    d.handle(&added(1, "A"));
    assert!(d.unsubscribe(id));
    assert!(!d.unsubscribe(id));
    d.handle(&removed(1));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_callbacks_keep_the_registry_consistent() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 50;

    let d = Arc::new(Dispatcher::new());
    let (_eid, events_rx) = d.event_channel(8192);
    let (_rid, errors_rx) = d.error_channel(64);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let d = Arc::clone(&d);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let id = t * 1000 + i;
                    d.handle(&added(id, "Fx"));
                    d.handle(&param(id, 0, 0.5));
                    d.handle(&removed(id));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(d.with_registry(|r| r.is_empty()));
    assert_eq!(d.moniker_count("Fx"), Some(0));
    assert!(reports(&errors_rx).is_empty());

    let got = events(&events_rx);
    let count = |pred: fn(&EngineEvent) -> bool| got.iter().filter(|e| pred(e)).count();
    let total = (THREADS * PER_THREAD) as usize;
    assert_eq!(count(|e| matches!(e, EngineEvent::PluginAdded { .. })), total);
    assert_eq!(count(|e| matches!(e, EngineEvent::PluginRemoved { .. })), total);
    assert!(count(|e| *e == EngineEvent::LastPluginRemoved) >= 1);
}

#[test]
fn duplicate_add_does_not_re_announce_the_plugin() {
    let d = Dispatcher::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    d.watch_plugin(
        2,
        Arc::new(Watcher {
            log: Arc::clone(&log),
        }),
    );

    d.handle(&added(2, "Delay"));
    d.handle(&added(2, "Chorus"));

    assert_eq!(*log.lock().unwrap(), vec!["added Delay"]);
}

#[test]
fn monikers_stay_unique_after_a_removal() {
    let d = Dispatcher::new();
    d.handle(&added(1, "Synth"));
    d.handle(&added(2, "Synth"));
    d.handle(&removed(1));
    d.handle(&added(3, "Synth"));

    d.with_registry(|r| {
        assert_eq!(r.get(2).unwrap().moniker, "Synth 2");
        assert_eq!(r.get(3).unwrap().moniker, "Synth 3");
    });
}

#[test]
fn engine_stop_drops_watchers_for_plugins_that_never_arrived() {
    let d = Dispatcher::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    d.watch_plugin(
        9,
        Arc::new(Watcher {
            log: Arc::clone(&log),
        }),
    );

    d.handle(&RawCallback::new(ActionCode::EngineStopped));
    d.handle(&added(9, "Late"));

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(d.unwatch_plugin(9), 0);
}

#[test]
fn unwatch_plugin_detaches_listeners() {
    let d = Dispatcher::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        d.watch_plugin(
            4,
            Arc::new(Watcher {
                log: Arc::clone(&log),
            }),
        );
    }

    assert_eq!(d.unwatch_plugin(4), 2);
    d.handle(&added(4, "Amp"));
    assert!(log.lock().unwrap().is_empty());
}
