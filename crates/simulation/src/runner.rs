//! Simulation runner: wires the scheduler, delivery substrate, traffic
//! generators, and flow monitor together.
//!
//! Execution is single-threaded, cooperative, virtual-time: one event
//! action runs to completion before the next is considered, and events
//! with equal fire times execute in scheduling order. The flow-stats map
//! is owned by the monitor and mutated only through its `on_sent` /
//! `on_received` calls from inside event actions, so no locking is ever
//! needed.

use crate::classifier::classify;
use crate::monitor::{FlowMonitor, FlowStats};
use crate::network::{NetworkConfig, NetworkError, SimulatedNetwork};
use crate::scheduler::{Scheduler, SchedulerError};
use crate::traffic::{
    Application, ApplicationError, ConfigError, PassiveReceiver, PeriodicSender,
    PeriodicSenderConfig,
};
use crate::AppId;
use flowsim_types::{FlowKey, NodeId, Packet, Protocol, VirtualTime};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::{debug, info, trace};

/// First source port handed out to senders. Each installed sender gets
/// the next port up, so several senders on one node stay distinguishable
/// as flows.
const EPHEMERAL_PORT_START: u16 = 49152;

/// Errors surfaced by the [`Simulation`] facade.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Events driving the simulation.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// An application begins its work.
    StartApplication { app: AppId },
    /// An application goes quiet.
    StopApplication { app: AppId },
    /// A periodic sender emits its next packet.
    SendPacket { app: AppId },
    /// The substrate delivers a packet to a node.
    DeliverPacket { to: NodeId, packet: Packet },
}

/// Counters collected while the simulation runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Packets handed to the substrate.
    pub packets_sent: u64,
    /// Packets that reached a bound receiver.
    pub packets_delivered: u64,
    /// Packets dropped by the loss draw.
    pub packets_dropped_loss: u64,
    /// Packets whose destination address had no owner.
    pub packets_unroutable: u64,
    /// Packets that arrived on a port with no bound receiver.
    pub packets_unbound: u64,
}

impl SimulationStats {
    /// Fraction of sent packets that reached a receiver.
    pub fn delivery_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            1.0
        } else {
            self.packets_delivered as f64 / self.packets_sent as f64
        }
    }
}

/// A packet-switched topology under synthetic traffic.
///
/// Owns every component explicitly; there is no process-wide simulator
/// state. Construct one, install nodes and applications, schedule their
/// start/stop times, then [`run_until`](Self::run_until) the stop time
/// and read the monitor.
pub struct Simulation {
    scheduler: Scheduler<SimEvent>,
    network: SimulatedNetwork,
    /// Interface address per node, indexed by `NodeId`.
    nodes: Vec<Ipv4Addr>,
    apps: Vec<Application>,
    monitor: FlowMonitor,
    /// (node, port) -> receiver application bound there.
    bindings: HashMap<(NodeId, u16), AppId>,
    next_ephemeral: u16,
    /// RNG for substrate conditions, seeded for determinism.
    rng: ChaCha8Rng,
    stats: SimulationStats,
}

impl Simulation {
    /// Create a simulation with the given substrate configuration and
    /// RNG seed. The same seed over the same topology and traffic
    /// produces identical results.
    pub fn new(config: NetworkConfig, seed: u64) -> Self {
        info!(
            latency = ?config.latency,
            jitter_fraction = config.jitter_fraction,
            loss_rate = config.loss_rate,
            seed,
            "Created simulation"
        );
        Self {
            scheduler: Scheduler::new(),
            network: SimulatedNetwork::new(config),
            nodes: Vec::new(),
            apps: Vec::new(),
            monitor: FlowMonitor::new(),
            bindings: HashMap::new(),
            next_ephemeral: EPHEMERAL_PORT_START,
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: SimulationStats::default(),
        }
    }

    /// Add a node with one interface address.
    pub fn add_node(&mut self, address: Ipv4Addr) -> Result<NodeId, SimulationError> {
        let id = NodeId(self.nodes.len() as u32);
        self.network.add_interface(address, id)?;
        self.nodes.push(address);
        Ok(id)
    }

    /// Interface address of a node.
    pub fn node_address(&self, node: NodeId) -> Option<Ipv4Addr> {
        self.nodes.get(node.0 as usize).copied()
    }

    /// Install a periodic sender on `node`. The config is validated
    /// here; the sender gets a fresh ephemeral source port.
    pub fn install_sender(
        &mut self,
        node: NodeId,
        config: PeriodicSenderConfig,
    ) -> Result<AppId, SimulationError> {
        config.validate()?;
        let source = self.nodes[node.0 as usize];
        let source_port = self.next_ephemeral;
        self.next_ephemeral = self
            .next_ephemeral
            .checked_add(1)
            .expect("ephemeral port range exhausted");

        let app = self.apps.len();
        self.apps
            .push(Application::Sender(PeriodicSender::new(
                config,
                source,
                source_port,
            )));
        debug!(app, node = node.0, source_port, "Installed periodic sender");
        Ok(app)
    }

    /// Install a passive receiver for `port` on `node`. It starts
    /// consuming packets once its start event fires.
    pub fn install_receiver(&mut self, node: NodeId, port: u16) -> AppId {
        let app = self.apps.len();
        self.apps
            .push(Application::Receiver(PassiveReceiver::new(node, port)));
        debug!(app, node = node.0, port, "Installed passive receiver");
        app
    }

    /// Schedule `app` to start at absolute time `at`.
    ///
    /// Starting an application twice fails with
    /// [`ApplicationError::AlreadyStarted`]; a start time in the past
    /// fails with [`SchedulerError::InvalidDelay`]. Both are rejected
    /// here, synchronously.
    pub fn start_app(&mut self, app: AppId, at: VirtualTime) -> Result<(), SimulationError> {
        let delay = at - self.scheduler.now();
        if delay.is_negative() {
            return Err(SchedulerError::InvalidDelay(delay).into());
        }
        self.apps[app].mark_started(app)?;
        self.scheduler
            .schedule(delay, SimEvent::StartApplication { app })?;
        Ok(())
    }

    /// Schedule `app` to stop at absolute time `at`.
    ///
    /// Stopping an application that was never started fails with
    /// [`ApplicationError::NotStarted`].
    pub fn stop_app(&mut self, app: AppId, at: VirtualTime) -> Result<(), SimulationError> {
        let delay = at - self.scheduler.now();
        if delay.is_negative() {
            return Err(SchedulerError::InvalidDelay(delay).into());
        }
        self.apps[app].mark_stopped(app)?;
        self.scheduler
            .schedule(delay, SimEvent::StopApplication { app })?;
        Ok(())
    }

    /// Current simulation time.
    pub fn now(&self) -> VirtualTime {
        self.scheduler.now()
    }

    /// The flow monitor.
    pub fn monitor(&self) -> &FlowMonitor {
        &self.monitor
    }

    /// Read-only copy of every flow's counters.
    pub fn snapshot(&self) -> BTreeMap<FlowKey, FlowStats> {
        self.monitor.snapshot()
    }

    /// Run-level counters.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// The delivery substrate.
    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Mutable access to the substrate, for loss configuration.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    /// Run the simulation until `stop_time`.
    ///
    /// Events scheduled past the stop time are discarded, and the clock
    /// comes to rest at `stop_time`; a snapshot taken afterwards is the
    /// final one.
    pub fn run_until(&mut self, stop_time: VirtualTime) {
        trace!(stop_time = stop_time.as_secs_f64(), "Running simulation");

        let Simulation {
            scheduler,
            network,
            apps,
            monitor,
            bindings,
            rng,
            stats,
            ..
        } = self;

        scheduler.run_until(stop_time, |sched, event| {
            stats.events_processed += 1;
            match event {
                SimEvent::StartApplication { app } => match &mut apps[app] {
                    Application::Sender(sender) => {
                        // The first send goes out at the start instant.
                        let handle = sched
                            .schedule(VirtualTime::ZERO, SimEvent::SendPacket { app })
                            .expect("zero delay is never negative");
                        sender.pending_send = Some(handle);
                    }
                    Application::Receiver(receiver) => {
                        bindings.insert((receiver.node, receiver.port), app);
                        trace!(
                            app,
                            node = receiver.node.0,
                            port = receiver.port,
                            "Receiver bound"
                        );
                    }
                },

                SimEvent::StopApplication { app } => match &mut apps[app] {
                    Application::Sender(sender) => {
                        // Stop beats any send still in flight.
                        if let Some(handle) = sender.pending_send.take() {
                            sched.cancel(handle);
                            trace!(app, "Cancelled pending send");
                        }
                    }
                    Application::Receiver(receiver) => {
                        bindings.remove(&(receiver.node, receiver.port));
                        trace!(
                            app,
                            node = receiver.node.0,
                            port = receiver.port,
                            "Receiver unbound"
                        );
                    }
                },

                SimEvent::SendPacket { app } => {
                    let Application::Sender(sender) = &mut apps[app] else {
                        return;
                    };
                    let now = sched.now();
                    let packet = Packet::new(
                        sender.source,
                        sender.config.destination,
                        Protocol::UDP,
                        sender.source_port,
                        sender.config.port,
                        sender.config.packet_size,
                        now,
                    );
                    sender.sent += 1;

                    // Report the send and hand the packet to the
                    // substrate in the same action, so tx counters and
                    // delivery decisions can never diverge.
                    monitor.on_sent(classify(&packet), packet.size_bytes() as u64, now);
                    stats.packets_sent += 1;
                    trace!(app, seq = sender.sent, time = now.as_secs_f64(), "Packet sent");

                    match network.resolve(packet.destination()) {
                        None => {
                            stats.packets_unroutable += 1;
                            trace!(destination = %packet.destination(), "Packet unroutable");
                        }
                        Some(to) => {
                            if network.should_drop(rng) {
                                stats.packets_dropped_loss += 1;
                                trace!(app, "Packet dropped by loss");
                            } else {
                                let latency = network.sample_latency(rng);
                                sched
                                    .schedule(latency, SimEvent::DeliverPacket { to, packet })
                                    .expect("sampled latency is never negative");
                            }
                        }
                    }

                    // Re-arm until the packet budget is spent; a stop
                    // event cancels the pending handle.
                    if sender.sent < sender.config.max_packets {
                        let handle = sched
                            .schedule(sender.config.interval, SimEvent::SendPacket { app })
                            .expect("interval validated positive");
                        sender.pending_send = Some(handle);
                    } else {
                        sender.pending_send = None;
                    }
                }

                SimEvent::DeliverPacket { to, packet } => {
                    let now = sched.now();
                    match bindings.get(&(to, packet.destination_port())) {
                        Some(_receiver) => {
                            monitor
                                .on_received(
                                    classify(&packet),
                                    packet.size_bytes() as u64,
                                    packet.send_time(),
                                    now,
                                )
                                .expect("substrate delivered a packet before it was sent");
                            stats.packets_delivered += 1;
                            trace!(
                                node = to.0,
                                port = packet.destination_port(),
                                time = now.as_secs_f64(),
                                "Packet delivered"
                            );
                        }
                        None => {
                            stats.packets_unbound += 1;
                            trace!(
                                node = to.0,
                                port = packet.destination_port(),
                                "No receiver bound, packet discarded"
                            );
                        }
                    }
                }
            }
        });

        debug!(
            events_processed = self.stats.events_processed,
            packets_sent = self.stats.packets_sent,
            packets_delivered = self.stats.packets_delivered,
            final_time = self.scheduler.now().as_secs_f64(),
            "Simulation step complete"
        );
    }
}
