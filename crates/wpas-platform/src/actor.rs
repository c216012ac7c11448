//! Interface actor.
//!
//! One tokio task per wireless interface owns the [`Supplicant`] and is the
//! only code that touches it. Driver events and operator commands arrive on
//! a single channel, so every event is processed to completion before the
//! next one starts. Engine timers and delayed scans are kept as deadlines
//! and awaited alongside the channel.

use crate::error::{Error, Result};
use crate::traits::{CredentialStore, HandshakeEngine, RadioDriver};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use wpas_core::{
    connection::Status, Action, DriverEvent, MacAddr, NetworkProfile, ProfileId, Supplicant,
    SupplicantConfig, TimerId,
};

const COMMAND_QUEUE: usize = 64;

/// Messages accepted by the actor.
#[derive(Debug)]
pub enum Command {
    /// Driver or handshake engine event.
    Event(DriverEvent),
    /// Operator selects a network.
    SelectNetwork(ProfileId, oneshot::Sender<Result<()>>),
    /// Operator disconnect.
    Disconnect,
    /// Add or replace a profile.
    AddProfile(Box<NetworkProfile>),
    /// Remove a profile.
    RemoveProfile(ProfileId, oneshot::Sender<Result<()>>),
    /// Replace every profile.
    Reconfigure(Vec<NetworkProfile>),
    /// Status snapshot.
    Status(oneshot::Sender<Status>),
    /// Stop the actor.
    Shutdown,
}

/// Cloneable handle to a running [`InterfaceActor`].
#[derive(Debug, Clone)]
pub struct InterfaceHandle {
    tx: mpsc::Sender<Command>,
}

impl InterfaceHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| Error::Closed)
    }

    /// Deliver a driver event.
    pub async fn event(&self, event: DriverEvent) -> Result<()> {
        self.send(Command::Event(event)).await
    }

    /// Select a network.
    ///
    /// # Errors
    ///
    /// `Error::Core(UnknownProfile)` if there is no such profile.
    pub async fn select_network(&self, id: ProfileId) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SelectNetwork(id, tx)).await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Disconnect without recording a failure.
    pub async fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect).await
    }

    /// Add or replace a profile.
    pub async fn add_profile(&self, profile: NetworkProfile) -> Result<()> {
        self.send(Command::AddProfile(Box::new(profile))).await
    }

    /// Remove a profile.
    pub async fn remove_profile(&self, id: ProfileId) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RemoveProfile(id, tx)).await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Replace every profile.
    pub async fn reconfigure(&self, profiles: Vec<NetworkProfile>) -> Result<()> {
        self.send(Command::Reconfigure(profiles)).await
    }

    /// Current interface status.
    pub async fn status(&self) -> Result<Status> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx)).await?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Stop the actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

/// Owns one interface's engine and its collaborators.
pub struct InterfaceActor {
    supplicant: Supplicant,
    radio: Arc<dyn RadioDriver>,
    store: Arc<dyn CredentialStore>,
    handshake: Arc<dyn HandshakeEngine>,
    timers: HashMap<TimerId, Instant>,
    scan_at: Option<Instant>,
    rx: mpsc::Receiver<Command>,
}

impl InterfaceActor {
    /// Load profiles from `store` and start the actor on the current runtime.
    ///
    /// # Errors
    ///
    /// Propagates `CredentialStore::load` failures.
    pub fn spawn(
        own_addr: MacAddr,
        config: SupplicantConfig,
        radio: Arc<dyn RadioDriver>,
        store: Arc<dyn CredentialStore>,
        handshake: Arc<dyn HandshakeEngine>,
    ) -> Result<(InterfaceHandle, JoinHandle<()>)> {
        let profiles = store.load()?;
        info!("Interface {} starting with {} network(s)", own_addr, profiles.len());
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let actor = Self {
            supplicant: Supplicant::new(own_addr, config, profiles),
            radio,
            store,
            handshake,
            timers: HashMap::new(),
            scan_at: None,
            rx,
        };
        let task = tokio::spawn(actor.run());
        Ok((InterfaceHandle { tx }, task))
    }

    async fn run(mut self) {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                command = self.rx.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                _ = wait(deadline) => self.fire_due(),
            }
        }
        let actions = self.supplicant.disconnect();
        self.execute(actions);
        debug!("Interface actor stopped");
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().copied().chain(self.scan_at).min()
    }

    fn engine_now() -> std::time::Instant {
        Instant::now().into_std()
    }

    fn handle_command(&mut self, command: Command) {
        let now = Self::engine_now();
        match command {
            Command::Event(event) => {
                let actions = self.supplicant.handle_event(now, event);
                self.execute(actions);
            }
            Command::SelectNetwork(id, reply) => {
                let result = self.supplicant.select_network(id).map(|actions| self.execute(actions));
                let _ = reply.send(result.map_err(Error::from));
            }
            Command::Disconnect => {
                let actions = self.supplicant.disconnect();
                self.scan_at = None;
                self.execute(actions);
            }
            Command::AddProfile(profile) => {
                let actions = self.supplicant.add_profile(*profile);
                self.execute(actions);
            }
            Command::RemoveProfile(id, reply) => {
                let result = self.supplicant.remove_profile(id).map(|actions| self.execute(actions));
                let _ = reply.send(result.map_err(Error::from));
            }
            Command::Reconfigure(profiles) => {
                let actions = self.supplicant.reconfigure(profiles);
                self.execute(actions);
            }
            Command::Status(reply) => {
                let _ = reply.send(self.supplicant.status(now));
            }
            Command::Shutdown => {}
        }
    }

    fn fire_due(&mut self) {
        let now = Instant::now();
        let mut due: Vec<(TimerId, Instant)> = self
            .timers
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, at)| (*id, *at))
            .collect();
        due.sort_by_key(|(_, at)| *at);
        for (id, _) in due {
            // An earlier timer in this batch may have cancelled it.
            if self.timers.remove(&id).is_none() {
                continue;
            }
            debug!("Timer {:?} fired", id);
            let actions = self.supplicant.handle_event(Self::engine_now(), DriverEvent::Timeout(id));
            self.execute(actions);
        }
        if self.scan_at.is_some_and(|at| at <= now) {
            self.scan_at = None;
            if let Err(e) = self.radio.request_scan() {
                warn!("Scan request failed: {}", e);
            }
        }
    }

    fn execute(&mut self, actions: Vec<Action>) {
        let now = Instant::now();
        for action in actions {
            let result = match action {
                Action::SendAuthFrame {
                    bssid,
                    transaction,
                    status,
                    payload,
                    external,
                } => self
                    .radio
                    .send_auth_frame(bssid, transaction, status, &payload, external),
                Action::ExternalAuthStatus { bssid, status, pmkid } => {
                    self.radio.external_auth_status(bssid, status, pmkid.as_ref())
                }
                Action::Associate(params) => self.radio.associate(&params),
                Action::Deauthenticate { bssid, reason } => self.radio.deauthenticate(bssid, reason),
                Action::InstallPmk { pmk, pmkid, bssid } => {
                    self.handshake.install_pmk(bssid, &pmk, pmkid.as_ref())
                }
                Action::DeliverEapol { src, frame } => self.handshake.deliver_eapol(src, &frame),
                Action::ConfigChanged { profile } => self.store.active_changed(profile),
                Action::StoreProfile(profile) => self.store.store(&profile),
                Action::RequestScan { delay } => {
                    self.scan_at = Some(now + delay);
                    Ok(())
                }
                Action::SetTimer { timer, after } => {
                    self.timers.insert(timer, now + after);
                    Ok(())
                }
                Action::CancelTimer(timer) => {
                    self.timers.remove(&timer);
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!("Action failed: {}", e);
            }
        }
    }
}

async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
