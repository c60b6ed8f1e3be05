use crate::protocol::EngineEvent;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PatchbayPort {
    pub port_id: i32,
    pub hints: i32,
    pub group_id: i32,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PortGroup {
    pub group_id: i32,
    pub hints: i32,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PatchbayClient {
    pub client_id: u32,
    pub name: String,
    pub icon: i32,
    /// Set when the client is one of our plugins rather than an outside JACK client.
    pub plugin_id: Option<u32>,
    pub position: Option<[i32; 4]>,
    pub ports: BTreeMap<i32, PatchbayPort>,
    pub groups: BTreeMap<i32, PortGroup>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub connection_id: u32,
    pub out_client: i32,
    pub out_port: i32,
    pub in_client: i32,
    pub in_port: i32,
}

/// Mirror of the engine's routing graph: clients, their ports and groups, and connections.
#[derive(Debug, Default)]
pub struct PatchbayMirror {
    clients: HashMap<u32, PatchbayClient>,
    connections: HashMap<u32, Connection>,
}

fn owning_plugin(plugin_id: i32) -> Option<u32> {
    u32::try_from(plugin_id).ok()
}

impl PatchbayMirror {
    pub fn client(&self, client_id: u32) -> Option<&PatchbayClient> {
        self.clients.get(&client_id)
    }

    pub fn clients(&self) -> impl Iterator<Item = &PatchbayClient> {
        self.clients.values()
    }

    pub fn client_for_plugin(&self, plugin_id: u32) -> Option<&PatchbayClient> {
        self.clients.values().find(|c| c.plugin_id == Some(plugin_id))
    }

    pub fn port(&self, client_id: u32, port_id: i32) -> Option<&PatchbayPort> {
        self.clients.get(&client_id)?.ports.get(&port_id)
    }

    pub fn connection(&self, connection_id: u32) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn clear(&mut self) {
        self.clients.clear();
        self.connections.clear();
    }

    /// Applies a patchbay event. Returns false when the event referenced
    /// something the mirror never saw, which is logged and otherwise ignored.
    pub fn apply(&mut self, event: &EngineEvent) -> bool {
        use EngineEvent as E;
        match event {
            E::PatchbayClientAdded {
                client_id,
                icon,
                plugin_id,
                name,
            } => {
                self.clients.insert(
                    *client_id,
                    PatchbayClient {
                        client_id: *client_id,
                        name: name.clone(),
                        icon: *icon,
                        plugin_id: owning_plugin(*plugin_id),
                        position: None,
                        ports: BTreeMap::new(),
                        groups: BTreeMap::new(),
                    },
                );
                true
            }
            E::PatchbayClientRemoved { client_id } => {
                let known = self.clients.remove(client_id).is_some();
                // connections name clients as i32; an id past that range has none
                if let Ok(id) = i32::try_from(*client_id) {
                    self.connections
                        .retain(|_, c| c.out_client != id && c.in_client != id);
                }
                known
            }
            E::PatchbayClientRenamed {
                client_id,
                new_name,
            } => self.with_client(*client_id, |c| c.name = new_name.clone()),
            E::PatchbayClientDataChanged {
                client_id,
                icon,
                plugin_id,
            } => self.with_client(*client_id, |c| {
                c.icon = *icon;
                c.plugin_id = owning_plugin(*plugin_id);
            }),
            E::PatchbayClientPositionChanged {
                client_id,
                x1,
                y1,
                x2,
                y2,
            } => self.with_client(*client_id, |c| c.position = Some([*x1, *y1, *x2, *y2])),
            E::PatchbayPortAdded {
                client_id,
                port_id,
                hints,
                group_id,
                name,
            }
            | E::PatchbayPortChanged {
                client_id,
                port_id,
                hints,
                group_id,
                name,
            } => self.with_client(*client_id, |c| {
                c.ports.insert(
                    *port_id,
                    PatchbayPort {
                        port_id: *port_id,
                        hints: *hints,
                        group_id: *group_id,
                        name: name.clone(),
                    },
                );
            }),
            E::PatchbayPortRemoved { client_id, port_id } => {
                let removed = self
                    .clients
                    .get_mut(client_id)
                    .and_then(|c| c.ports.remove(port_id))
                    .is_some();
                if !removed {
                    debug!(client_id, port_id, "unknown patchbay port removed");
                }
                if let Ok(client) = i32::try_from(*client_id) {
                    self.connections.retain(|_, c| {
                        !(c.out_client == client && c.out_port == *port_id)
                            && !(c.in_client == client && c.in_port == *port_id)
                    });
                }
                removed
            }
            E::PatchbayPortGroupAdded {
                client_id,
                group_id,
                hints,
                name,
            }
            | E::PatchbayPortGroupChanged {
                client_id,
                group_id,
                hints,
                name,
            } => self.with_client(*client_id, |c| {
                c.groups.insert(
                    *group_id,
                    PortGroup {
                        group_id: *group_id,
                        hints: *hints,
                        name: name.clone(),
                    },
                );
            }),
            E::PatchbayPortGroupRemoved {
                client_id,
                group_id,
            } => self.with_client(*client_id, |c| {
                c.groups.remove(group_id);
            }),
            E::PatchbayConnectionAdded {
                connection_id,
                out_client,
                out_port,
                in_client,
                in_port,
            } => {
                self.connections.insert(
                    *connection_id,
                    Connection {
                        connection_id: *connection_id,
                        out_client: *out_client,
                        out_port: *out_port,
                        in_client: *in_client,
                        in_port: *in_port,
                    },
                );
                true
            }
            E::PatchbayConnectionRemoved { connection_id } => {
                let known = self.connections.remove(connection_id).is_some();
                if !known {
                    debug!(connection_id, "unknown patchbay connection removed");
                }
                known
            }
            E::EngineStopped => {
                self.clear();
                true
            }
            _ => true,
        }
    }

    fn with_client(&mut self, client_id: u32, f: impl FnOnce(&mut PatchbayClient)) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                f(client);
                true
            }
            None => {
                debug!(client_id, "patchbay event for unknown client");
                false
            }
        }
    }
}
